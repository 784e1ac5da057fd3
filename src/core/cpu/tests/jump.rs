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

//! Jump translation, unit formation and translation error tests

use super::helpers::{Harness, BASE};
use crate::core::config::CpuConfig;
use crate::core::cpu::asm::*;
use crate::core::cpu::{Exit, Target};
use crate::core::error::EmulatorError;

#[test]
fn test_j_runs_delay_slot() {
    let mut h = Harness::new();
    h.load(&[j(BASE + 0x100), addiu(1, 0, 9)]);

    let result = h.step();

    assert!(matches!(result.exit, Exit::Branch(Target::Static(0))));
    assert_eq!(result.retired, 2);
    assert_eq!(h.regs.pc(), BASE + 0x100);
    assert_eq!(h.regs.reg(1), 9);
}

#[test]
fn test_jal_links_after_delay_slot() {
    let mut h = Harness::new();
    h.load(&[jal(BASE + 0x40), addu(4, 31, 0)]);

    let result = h.step();

    assert!(matches!(result.exit, Exit::Call(Target::Static(_))));
    assert_eq!(h.regs.pc(), BASE + 0x40);
    assert_eq!(h.regs.reg(31), BASE + 8);
    // The delay slot ran before the link write
    assert_eq!(h.regs.reg(4), 0);
}

#[test]
fn test_jr_captures_register_before_delay_slot() {
    let mut h = Harness::new();
    h.load(&[jr(8), addiu(8, 0, 0)]);
    h.regs.set_reg(8, BASE + 0x20);

    let result = h.step();

    assert_eq!(result.exit, Exit::Branch(Target::Dynamic(BASE + 0x20)));
    assert_eq!(h.regs.pc(), BASE + 0x20);
    assert_eq!(h.regs.reg(8), 0);
}

#[test]
fn test_jr_ra_is_return() {
    let mut h = Harness::new();
    h.load(&[jr(31), nop()]);
    h.regs.set_reg(31, 0x08812340);

    let result = h.step();

    assert_eq!(result.exit, Exit::Return(0x08812340));
    assert_eq!(h.regs.pc(), 0x08812340);
}

#[test]
fn test_jalr_default_link() {
    let mut h = Harness::new();
    h.load(&[jalr(31, 9), nop()]);
    h.regs.set_reg(9, BASE + 0x80);

    let result = h.step();

    assert_eq!(result.exit, Exit::Call(Target::Dynamic(BASE + 0x80)));
    assert_eq!(h.regs.reg(31), BASE + 8);
}

#[test]
fn test_jalr_custom_link_register() {
    let mut h = Harness::new();
    h.load(&[jalr(10, 9), nop()]);
    h.regs.set_reg(9, BASE + 0x80);
    h.regs.set_reg(31, 0x5555);

    h.step();

    assert_eq!(h.regs.reg(10), BASE + 8);
    assert_eq!(h.regs.reg(31), 0x5555);
}

#[test]
fn test_call_and_return_round_trip() {
    let mut h = Harness::new();
    h.load(&[jal(BASE + 0x40), nop(), brk(3)]);
    h.load_at(BASE + 0x40, &[addiu(2, 0, 11), jr(31), nop()]);

    assert!(matches!(h.step().exit, Exit::Call(_)));
    assert_eq!(h.step().exit, Exit::Return(BASE + 8));
    assert_eq!(h.run_until_break(1), 3);
    assert_eq!(h.regs.reg(2), 11);
}

#[test]
fn test_syscall_ends_unit() {
    let mut h = Harness::new();
    h.load(&[addiu(4, 0, 1), syscall(0x2071), brk(0)]);

    let result = h.step();

    assert_eq!(
        result.exit,
        Exit::Syscall {
            code: 0x2071,
            resume: BASE + 8
        }
    );
    assert_eq!(result.retired, 2);
    assert_eq!(h.regs.pc(), BASE + 8);
}

#[test]
fn test_branch_in_delay_slot_is_rejected() {
    let mut h = Harness::new();
    h.load(&[j(BASE + 0x40), beq(0, 0, 4)]);

    let err = h.cache.resolve(BASE, &h.mem).unwrap_err();

    assert!(matches!(
        err,
        EmulatorError::UndefinedInstruction {
            address,
            reason: "control transfer in delay slot",
            ..
        } if address == BASE + 4
    ));
    assert!(h.cache.is_empty());
}

#[test]
fn test_syscall_in_delay_slot_is_rejected() {
    let mut h = Harness::new();
    h.load(&[jr(31), syscall(0)]);

    assert!(matches!(
        h.cache.resolve(BASE, &h.mem),
        Err(EmulatorError::UndefinedInstruction { .. })
    ));
}

#[test]
fn test_undecodable_first_word() {
    let mut h = Harness::new();
    h.load(&[0xFFFF_FFFF]);

    assert!(matches!(
        h.cache.resolve(BASE, &h.mem),
        Err(EmulatorError::UndefinedInstruction {
            word: 0xFFFF_FFFF,
            ..
        })
    ));
}

#[test]
fn test_undecodable_delay_slot() {
    let mut h = Harness::new();
    h.load(&[jr(31), 0x4400_0000]);

    assert!(matches!(
        h.cache.resolve(BASE, &h.mem),
        Err(EmulatorError::UndefinedInstruction {
            reason: "undecodable delay slot",
            ..
        })
    ));
}

#[test]
fn test_undecodable_later_word_ends_unit() {
    let mut h = Harness::new();
    h.load(&[addiu(1, 0, 1), 0xFFFF_FFFF]);

    let unit = h.cache.resolve(BASE, &h.mem).unwrap();
    assert_eq!(unit.instruction_count(), 1);

    // Executing up to the bad word is fine; reaching it is not
    let result = h.step();
    assert!(matches!(result.exit, Exit::Branch(Target::Static(_))));
    assert_eq!(h.regs.pc(), BASE + 4);
    assert!(h.cache.resolve(BASE + 4, &h.mem).is_err());
}

#[test]
fn test_unit_length_limit() {
    let config = CpuConfig {
        max_unit_instructions: 4,
        ..CpuConfig::default()
    };
    let mut h = Harness::with_config(config);
    h.load(&[nop(); 10]);

    let unit = h.cache.resolve(BASE, &h.mem).unwrap();
    assert_eq!(unit.instruction_count(), 4);

    let result = h.step();
    assert_eq!(result.retired, 4);
    assert_eq!(h.regs.pc(), BASE + 0x10);
}

#[test]
fn test_branch_pair_not_split_by_limit() {
    let config = CpuConfig {
        max_unit_instructions: 4,
        ..CpuConfig::default()
    };
    let mut h = Harness::with_config(config);
    h.load(&[nop(), nop(), nop(), j(BASE), nop()]);

    let unit = h.cache.resolve(BASE, &h.mem).unwrap();

    // The jump and its delay slot start the next unit
    assert_eq!(unit.instruction_count(), 3);
}

#[test]
fn test_unmapped_fetch() {
    let h = Harness::new();

    assert!(matches!(
        h.cache.resolve(0x0000_0000, &h.mem),
        Err(EmulatorError::InvalidMemoryAccess { .. })
    ));
}
