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

//! Instruction encoders for building guest programs
//!
//! Branch offsets are in instructions relative to the delay slot, as in
//! assembler output. Jump targets are absolute addresses.
//!
//! # Example
//!
//! ```
//! use pspx::core::cpu::asm;
//!
//! assert_eq!(asm::addiu(2, 1, 66), 0x24220042);
//! assert_eq!(asm::jr(31), 0x03E00008);
//! ```

#[inline]
fn r_type(rs: u8, rt: u8, rd: u8, shamt: u8, funct: u32) -> u32 {
    (u32::from(rs & 0x1F) << 21)
        | (u32::from(rt & 0x1F) << 16)
        | (u32::from(rd & 0x1F) << 11)
        | (u32::from(shamt & 0x1F) << 6)
        | (funct & 0x3F)
}

#[inline]
fn i_type(op: u32, rs: u8, rt: u8, imm: u16) -> u32 {
    (op << 26) | (u32::from(rs & 0x1F) << 21) | (u32::from(rt & 0x1F) << 16) | u32::from(imm)
}

#[inline]
fn regimm(rs: u8, code: u8, offset: i16) -> u32 {
    i_type(0x01, rs, code, offset as u16)
}

pub fn nop() -> u32 {
    0
}

pub fn sll(rd: u8, rt: u8, shamt: u8) -> u32 {
    r_type(0, rt, rd, shamt, 0x00)
}

pub fn addu(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x21)
}

pub fn subu(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x23)
}

pub fn or(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x25)
}

pub fn slt(rd: u8, rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, rd, 0, 0x2A)
}

pub fn mult(rs: u8, rt: u8) -> u32 {
    r_type(rs, rt, 0, 0, 0x18)
}

pub fn mfhi(rd: u8) -> u32 {
    r_type(0, 0, rd, 0, 0x10)
}

pub fn mflo(rd: u8) -> u32 {
    r_type(0, 0, rd, 0, 0x12)
}

pub fn addiu(rt: u8, rs: u8, imm: i16) -> u32 {
    i_type(0x09, rs, rt, imm as u16)
}

pub fn ori(rt: u8, rs: u8, imm: u16) -> u32 {
    i_type(0x0D, rs, rt, imm)
}

pub fn lui(rt: u8, imm: u16) -> u32 {
    i_type(0x0F, 0, rt, imm)
}

pub fn lw(rt: u8, offset: i16, base: u8) -> u32 {
    i_type(0x23, base, rt, offset as u16)
}

pub fn sw(rt: u8, offset: i16, base: u8) -> u32 {
    i_type(0x2B, base, rt, offset as u16)
}

pub fn beq(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x04, rs, rt, offset as u16)
}

pub fn bne(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x05, rs, rt, offset as u16)
}

pub fn blez(rs: u8, offset: i16) -> u32 {
    i_type(0x06, rs, 0, offset as u16)
}

pub fn bgtz(rs: u8, offset: i16) -> u32 {
    i_type(0x07, rs, 0, offset as u16)
}

pub fn beql(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x14, rs, rt, offset as u16)
}

pub fn bnel(rs: u8, rt: u8, offset: i16) -> u32 {
    i_type(0x15, rs, rt, offset as u16)
}

pub fn blezl(rs: u8, offset: i16) -> u32 {
    i_type(0x16, rs, 0, offset as u16)
}

pub fn bgtzl(rs: u8, offset: i16) -> u32 {
    i_type(0x17, rs, 0, offset as u16)
}

pub fn bltz(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x00, offset)
}

pub fn bgez(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x01, offset)
}

pub fn bltzl(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x02, offset)
}

pub fn bgezl(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x03, offset)
}

pub fn bltzal(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x10, offset)
}

pub fn bgezal(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x11, offset)
}

pub fn bltzall(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x12, offset)
}

pub fn bgezall(rs: u8, offset: i16) -> u32 {
    regimm(rs, 0x13, offset)
}

pub fn j(target: u32) -> u32 {
    (0x02 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub fn jr(rs: u8) -> u32 {
    r_type(rs, 0, 0, 0, 0x08)
}

pub fn jalr(rd: u8, rs: u8) -> u32 {
    r_type(rs, 0, rd, 0, 0x09)
}

pub fn syscall(code: u32) -> u32 {
    ((code & 0x000F_FFFF) << 6) | 0x0C
}

pub fn brk(code: u32) -> u32 {
    ((code & 0x000F_FFFF) << 6) | 0x0D
}
