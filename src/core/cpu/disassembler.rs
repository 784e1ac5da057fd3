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

//! Allegrex instruction disassembler for translation tracing
//!
//! Converts instruction words to assembly mnemonics. Branch and jump targets
//! are printed as absolute addresses.

use super::decode::{decode, AluOp, Condition, ImmOp, Instruction, ShiftOp, Width};

/// Instruction disassembler
///
/// # Example
/// ```
/// use pspx::core::cpu::Disassembler;
///
/// let disasm = Disassembler::disassemble(0x00000000, 0x08804000); // NOP
/// assert_eq!(disasm, "nop");
/// ```
pub struct Disassembler;

impl Disassembler {
    /// Disassemble a single instruction word located at `pc`
    ///
    /// # Example
    /// ```
    /// use pspx::core::cpu::Disassembler;
    ///
    /// // BEQL r1, r2, +4
    /// let disasm = Disassembler::disassemble(0x50220004, 0x08804000);
    /// assert_eq!(disasm, "beql r1, r2, 0x08804014");
    /// ```
    pub fn disassemble(word: u32, pc: u32) -> String {
        match decode(word) {
            Some(Instruction::Shift {
                op: ShiftOp::Sll,
                rd: 0,
                rt: 0,
                shamt: 0,
            }) => "nop".to_string(),
            Some(instruction) => Self::format(&instruction, pc),
            None => format!("??? 0x{:08X}", word),
        }
    }

    fn format(instruction: &Instruction, pc: u32) -> String {
        match *instruction {
            Instruction::Branch {
                cond,
                rs,
                rt,
                offset,
                likely,
                link,
            } => {
                let target = pc
                    .wrapping_add(4)
                    .wrapping_add(((offset as i32) << 2) as u32);
                let mnemonic = format!(
                    "{}{}{}",
                    cond.mnemonic(),
                    if link { "al" } else { "" },
                    if likely { "l" } else { "" }
                );
                match cond {
                    Condition::Equal | Condition::NotEqual => {
                        format!("{} r{}, r{}, 0x{:08X}", mnemonic, rs, rt, target)
                    }
                    _ => format!("{} r{}, 0x{:08X}", mnemonic, rs, target),
                }
            }
            Instruction::Jump { target, link } => {
                let addr = (pc.wrapping_add(4) & 0xF000_0000) | (target << 2);
                format!("{} 0x{:08X}", if link { "jal" } else { "j" }, addr)
            }
            Instruction::JumpRegister { rs, link: None } => format!("jr r{}", rs),
            Instruction::JumpRegister {
                rs,
                link: Some(31),
            } => format!("jalr r{}", rs),
            Instruction::JumpRegister { rs, link: Some(rd) } => format!("jalr r{}, r{}", rd, rs),
            Instruction::Shift { op, rd, rt, shamt } => {
                format!("{} r{}, r{}, {}", Self::shift_name(op), rd, rt, shamt)
            }
            Instruction::ShiftVariable { op, rd, rt, rs } => {
                format!("{}v r{}, r{}, r{}", Self::shift_name(op), rd, rt, rs)
            }
            Instruction::Register { op, rd, rs, rt } => {
                format!("{} r{}, r{}, r{}", Self::alu_name(op), rd, rs, rt)
            }
            Instruction::Immediate { op, rt, rs, imm } => match op {
                ImmOp::Andi | ImmOp::Ori | ImmOp::Xori => {
                    format!("{} r{}, r{}, 0x{:04X}", Self::imm_name(op), rt, rs, imm)
                }
                _ => format!("{} r{}, r{}, {}", Self::imm_name(op), rt, rs, imm as i16),
            },
            Instruction::Lui { rt, imm } => format!("lui r{}, 0x{:04X}", rt, imm),
            Instruction::MoveFromHi { rd } => format!("mfhi r{}", rd),
            Instruction::MoveFromLo { rd } => format!("mflo r{}", rd),
            Instruction::MoveToHi { rs } => format!("mthi r{}", rs),
            Instruction::MoveToLo { rs } => format!("mtlo r{}", rs),
            Instruction::Multiply { rs, rt, signed } => {
                format!("{} r{}, r{}", if signed { "mult" } else { "multu" }, rs, rt)
            }
            Instruction::Load {
                width,
                signed,
                rt,
                base,
                offset,
            } => {
                let name = match (width, signed) {
                    (Width::Byte, true) => "lb",
                    (Width::Byte, false) => "lbu",
                    (Width::Half, true) => "lh",
                    (Width::Half, false) => "lhu",
                    (Width::Word, _) => "lw",
                };
                format!("{} r{}, {}(r{})", name, rt, offset, base)
            }
            Instruction::Store {
                width,
                rt,
                base,
                offset,
            } => {
                let name = match width {
                    Width::Byte => "sb",
                    Width::Half => "sh",
                    Width::Word => "sw",
                };
                format!("{} r{}, {}(r{})", name, rt, offset, base)
            }
            Instruction::Syscall { code } => format!("syscall 0x{:05X}", code),
            Instruction::Break { code } => format!("break 0x{:05X}", code),
        }
    }

    fn shift_name(op: ShiftOp) -> &'static str {
        match op {
            ShiftOp::Sll => "sll",
            ShiftOp::Srl => "srl",
            ShiftOp::Sra => "sra",
        }
    }

    fn alu_name(op: AluOp) -> &'static str {
        match op {
            AluOp::Add => "add",
            AluOp::Addu => "addu",
            AluOp::Sub => "sub",
            AluOp::Subu => "subu",
            AluOp::And => "and",
            AluOp::Or => "or",
            AluOp::Xor => "xor",
            AluOp::Nor => "nor",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
        }
    }

    fn imm_name(op: ImmOp) -> &'static str {
        match op {
            ImmOp::Addi => "addi",
            ImmOp::Addiu => "addiu",
            ImmOp::Slti => "slti",
            ImmOp::Sltiu => "sltiu",
            ImmOp::Andi => "andi",
            ImmOp::Ori => "ori",
            ImmOp::Xori => "xori",
        }
    }
}
