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

//! Integer ALU, multiply and load/store subset
//!
//! These instructions translate one-to-one into an `Exec` micro-op carrying
//! the pre-decoded instruction. ADD/ADDI/SUB do not raise overflow traps.

use super::UnitBuilder;
use crate::core::cpu::decode::{AluOp, ImmOp, Instruction, ShiftOp, Width};
use crate::core::cpu::unit::Op;
use crate::core::cpu::RegisterFile;
use crate::core::error::{EmulatorError, Result};
use crate::core::memory::GuestMemory;

/// Append a computational instruction; always emits exactly one op
pub(super) fn translate(builder: &mut UnitBuilder, pc: u32, word: u32, instruction: Instruction) {
    builder.retire(pc);
    builder.push(Op::Exec {
        pc,
        word,
        instruction,
    });
}

#[inline(always)]
fn shift(op: ShiftOp, value: u32, amount: u32) -> u32 {
    match op {
        ShiftOp::Sll => value << amount,
        ShiftOp::Srl => value >> amount,
        ShiftOp::Sra => ((value as i32) >> amount) as u32,
    }
}

#[inline(always)]
fn register_op(op: AluOp, rs: u32, rt: u32) -> u32 {
    match op {
        AluOp::Add | AluOp::Addu => rs.wrapping_add(rt),
        AluOp::Sub | AluOp::Subu => rs.wrapping_sub(rt),
        AluOp::And => rs & rt,
        AluOp::Or => rs | rt,
        AluOp::Xor => rs ^ rt,
        AluOp::Nor => !(rs | rt),
        AluOp::Slt => ((rs as i32) < (rt as i32)) as u32,
        AluOp::Sltu => (rs < rt) as u32,
    }
}

#[inline(always)]
fn immediate_op(op: ImmOp, rs: u32, imm: u16) -> u32 {
    let signed = imm as i16 as i32 as u32;
    let zero_extended = imm as u32;
    match op {
        ImmOp::Addi | ImmOp::Addiu => rs.wrapping_add(signed),
        ImmOp::Slti => ((rs as i32) < (signed as i32)) as u32,
        // Compares against the sign-extended immediate as unsigned
        ImmOp::Sltiu => (rs < signed) as u32,
        ImmOp::Andi => rs & zero_extended,
        ImmOp::Ori => rs | zero_extended,
        ImmOp::Xori => rs ^ zero_extended,
    }
}

/// Execute one computational instruction
pub(in crate::core::cpu) fn execute(
    pc: u32,
    word: u32,
    instruction: &Instruction,
    regs: &mut RegisterFile,
    memory: &mut GuestMemory,
) -> Result<()> {
    match *instruction {
        Instruction::Shift { op, rd, rt, shamt } => {
            regs.set_reg(rd, shift(op, regs.reg(rt), u32::from(shamt)));
        }
        Instruction::ShiftVariable { op, rd, rt, rs } => {
            regs.set_reg(rd, shift(op, regs.reg(rt), regs.reg(rs) & 0x1F));
        }
        Instruction::Register { op, rd, rs, rt } => {
            regs.set_reg(rd, register_op(op, regs.reg(rs), regs.reg(rt)));
        }
        Instruction::Immediate { op, rt, rs, imm } => {
            regs.set_reg(rt, immediate_op(op, regs.reg(rs), imm));
        }
        Instruction::Lui { rt, imm } => regs.set_reg(rt, u32::from(imm) << 16),
        Instruction::MoveFromHi { rd } => regs.set_reg(rd, regs.hi()),
        Instruction::MoveFromLo { rd } => regs.set_reg(rd, regs.lo()),
        Instruction::MoveToHi { rs } => regs.set_hi(regs.reg(rs)),
        Instruction::MoveToLo { rs } => regs.set_lo(regs.reg(rs)),
        Instruction::Multiply { rs, rt, signed } => {
            let product = if signed {
                (i64::from(regs.reg(rs) as i32) * i64::from(regs.reg(rt) as i32)) as u64
            } else {
                u64::from(regs.reg(rs)) * u64::from(regs.reg(rt))
            };
            regs.set_hi((product >> 32) as u32);
            regs.set_lo(product as u32);
        }
        Instruction::Load {
            width,
            signed,
            rt,
            base,
            offset,
        } => {
            let address = regs.reg(base).wrapping_add(offset as i32 as u32);
            let value = match (width, signed) {
                (Width::Byte, true) => memory.read8(address)? as i8 as i32 as u32,
                (Width::Byte, false) => u32::from(memory.read8(address)?),
                (Width::Half, true) => memory.read16(address)? as i16 as i32 as u32,
                (Width::Half, false) => u32::from(memory.read16(address)?),
                (Width::Word, _) => memory.read32(address)?,
            };
            regs.set_reg(rt, value);
        }
        Instruction::Store {
            width,
            rt,
            base,
            offset,
        } => {
            let address = regs.reg(base).wrapping_add(offset as i32 as u32);
            let value = regs.reg(rt);
            match width {
                Width::Byte => memory.write8(address, value as u8)?,
                Width::Half => memory.write16(address, value as u16)?,
                Width::Word => memory.write32(address, value)?,
            }
        }
        Instruction::Branch { .. }
        | Instruction::Jump { .. }
        | Instruction::JumpRegister { .. }
        | Instruction::Syscall { .. }
        | Instruction::Break { .. } => {
            return Err(EmulatorError::UndefinedInstruction {
                address: pc,
                word,
                reason: "control instruction in computational slot",
            });
        }
    }
    Ok(())
}
