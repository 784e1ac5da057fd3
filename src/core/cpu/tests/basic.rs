// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::helpers::{Harness, BASE};
use crate::core::cpu::asm::*;
use crate::core::cpu::RegisterFile;

#[test]
fn test_register_r0_is_hardwired() {
    let mut regs = RegisterFile::new();
    regs.set_reg(0, 0xDEADBEEF);
    assert_eq!(regs.reg(0), 0);
}

#[test]
fn test_register_read_write() {
    let mut regs = RegisterFile::new();
    regs.set_reg(5, 0x12345678);
    regs.set_hi(1);
    regs.set_lo(2);
    regs.set_pc(0x08804000);

    assert_eq!(regs.reg(5), 0x12345678);
    assert_eq!(regs.hi(), 1);
    assert_eq!(regs.lo(), 2);
    assert_eq!(regs.pc(), 0x08804000);
}

#[test]
fn test_register_file_display() {
    let mut regs = RegisterFile::new();
    regs.set_reg(31, 0x08000000);
    let dump = regs.to_string();
    assert!(dump.contains("r31: 0x08000000"));
}

#[test]
fn test_lui_ori_builds_constant() {
    let mut h = Harness::new();
    h.load(&[lui(1, 0x1234), ori(1, 1, 0x5678), brk(0)]);

    h.run_until_break(4);

    assert_eq!(h.regs.reg(1), 0x12345678);
}

#[test]
fn test_addiu_wraps_and_sign_extends() {
    let mut h = Harness::new();
    h.load(&[addiu(1, 0, -1), addiu(2, 1, 2), brk(0)]);

    h.run_until_break(4);

    assert_eq!(h.regs.reg(1), 0xFFFF_FFFF);
    assert_eq!(h.regs.reg(2), 1);
}

#[test]
fn test_slt_is_signed() {
    let mut h = Harness::new();
    h.load(&[addiu(1, 0, -5), addiu(2, 0, 3), slt(3, 1, 2), slt(4, 2, 1), brk(0)]);

    h.run_until_break(4);

    assert_eq!(h.regs.reg(3), 1);
    assert_eq!(h.regs.reg(4), 0);
}

#[test]
fn test_mult_fills_hi_lo() {
    let mut h = Harness::new();
    h.load(&[
        addiu(1, 0, -2),
        lui(2, 0x4000), // 0x40000000
        mult(1, 2),
        mfhi(3),
        mflo(4),
        brk(0),
    ]);

    h.run_until_break(4);

    // -2 * 2^30 = -2^31
    assert_eq!(h.regs.reg(3), 0xFFFF_FFFF);
    assert_eq!(h.regs.reg(4), 0x8000_0000);
}

#[test]
fn test_store_then_load() {
    let mut h = Harness::new();
    h.load(&[
        lui(1, 0x0890),
        addiu(2, 0, 0x7AB),
        sw(2, 8, 1),
        lw(3, 8, 1),
        brk(0),
    ]);

    h.run_until_break(4);

    assert_eq!(h.mem.read32(0x08900008).unwrap(), 0x7AB);
    assert_eq!(h.regs.reg(3), 0x7AB);
}

#[test]
fn test_signed_byte_load() {
    let mut h = Harness::new();
    h.mem.write8(0x08900000, 0x80).unwrap();
    // LB r2, 0(r1) / LBU r3, 0(r1)
    h.load(&[lui(1, 0x0890), 0x80220000, 0x90230000, brk(0)]);

    h.run_until_break(4);

    assert_eq!(h.regs.reg(2), 0xFFFF_FF80);
    assert_eq!(h.regs.reg(3), 0x80);
}

#[test]
fn test_memory_fault_reports_instruction_pc() {
    let mut h = Harness::new();
    // r1 = 0, LW from address 0 is unmapped
    h.load(&[nop(), lw(2, 0, 1), brk(0)]);

    let unit = h.cache.resolve(BASE, &h.mem).unwrap();
    let result = unit.run(&mut h.regs, &mut h.mem);

    assert!(result.is_err());
    assert_eq!(h.regs.pc(), BASE + 4);
}
