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

/// Decode R-type instruction
///
/// Format: | op (6) | rs (5) | rt (5) | rd (5) | shamt (5) | funct (6) |
///
/// # Returns
///
/// Tuple of (rs, rt, rd, shamt, funct)
#[inline(always)]
pub(super) fn decode_r_type(instr: u32) -> (u8, u8, u8, u8, u8) {
    let rs = ((instr >> 21) & 0x1F) as u8;
    let rt = ((instr >> 16) & 0x1F) as u8;
    let rd = ((instr >> 11) & 0x1F) as u8;
    let shamt = ((instr >> 6) & 0x1F) as u8;
    let funct = (instr & 0x3F) as u8;
    (rs, rt, rd, shamt, funct)
}

/// Decode I-type instruction
///
/// I-type instructions are used for immediate operations, loads, stores, and branches.
///
/// Format: | op (6) | rs (5) | rt (5) | immediate (16) |
///
/// # Returns
///
/// Tuple of (op, rs, rt, imm)
#[inline(always)]
pub(super) fn decode_i_type(instr: u32) -> (u8, u8, u8, u16) {
    let op = ((instr >> 26) & 0x3F) as u8;
    let rs = ((instr >> 21) & 0x1F) as u8;
    let rt = ((instr >> 16) & 0x1F) as u8;
    let imm = (instr & 0xFFFF) as u16;
    (op, rs, rt, imm)
}

/// Decode J-type instruction
///
/// Format: | op (6) | target (26) |
///
/// # Returns
///
/// Tuple of (op, target)
#[inline(always)]
pub(super) fn decode_j_type(instr: u32) -> (u8, u32) {
    let op = ((instr >> 26) & 0x3F) as u8;
    let target = instr & 0x03FFFFFF;
    (op, target)
}

/// Comparison evaluated by a conditional branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// rs == rt
    Equal,
    /// rs != rt
    NotEqual,
    /// rs <= 0 (signed)
    LessEqualZero,
    /// rs > 0 (signed)
    GreaterThanZero,
    /// rs < 0 (signed)
    LessThanZero,
    /// rs >= 0 (signed)
    GreaterEqualZero,
}

impl Condition {
    /// Evaluate the branch decision for register values `rs` and `rt`
    ///
    /// Single-operand conditions ignore `rt`.
    ///
    /// # Example
    /// ```
    /// use pspx::core::cpu::Condition;
    ///
    /// assert!(Condition::LessThanZero.evaluate(0xFFFF_FFFF, 0));
    /// assert!(!Condition::GreaterThanZero.evaluate(0, 0));
    /// assert!(Condition::Equal.evaluate(7, 7));
    /// ```
    #[inline(always)]
    pub fn evaluate(self, rs: u32, rt: u32) -> bool {
        let signed = rs as i32;
        match self {
            Condition::Equal => rs == rt,
            Condition::NotEqual => rs != rt,
            Condition::LessEqualZero => signed <= 0,
            Condition::GreaterThanZero => signed > 0,
            Condition::LessThanZero => signed < 0,
            Condition::GreaterEqualZero => signed >= 0,
        }
    }

    /// Whether the comparison holds for every register value
    ///
    /// `beq r0, r0` and `bgez r0` are the assembler's unconditional `b`/`bal`.
    pub fn always_taken(self, rs: u8, rt: u8) -> bool {
        match self {
            Condition::Equal => rs == rt,
            Condition::GreaterEqualZero | Condition::LessEqualZero => rs == 0,
            _ => false,
        }
    }

    /// Assembler mnemonic stem
    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Equal => "beq",
            Condition::NotEqual => "bne",
            Condition::LessEqualZero => "blez",
            Condition::GreaterThanZero => "bgtz",
            Condition::LessThanZero => "bltz",
            Condition::GreaterEqualZero => "bgez",
        }
    }
}

/// Register-register ALU operation (SPECIAL funct)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
}

/// Register-immediate ALU operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp {
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Sll,
    Srl,
    Sra,
}

/// Memory access width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
}

/// A decoded guest instruction
///
/// Covers the control-transfer instructions plus the integer subset the
/// translator supports. Anything else decodes to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Conditional branch, including likely and and-link forms
    Branch {
        cond: Condition,
        rs: u8,
        rt: u8,
        offset: i16,
        likely: bool,
        link: bool,
    },
    /// J / JAL with the raw 26-bit target index
    Jump { target: u32, link: bool },
    /// JR (`link == None`) / JALR (`link == Some(rd)`)
    JumpRegister { rs: u8, link: Option<u8> },
    Shift {
        op: ShiftOp,
        rd: u8,
        rt: u8,
        shamt: u8,
    },
    ShiftVariable { op: ShiftOp, rd: u8, rt: u8, rs: u8 },
    Register { op: AluOp, rd: u8, rs: u8, rt: u8 },
    Immediate { op: ImmOp, rt: u8, rs: u8, imm: u16 },
    Lui { rt: u8, imm: u16 },
    MoveFromHi { rd: u8 },
    MoveFromLo { rd: u8 },
    MoveToHi { rs: u8 },
    MoveToLo { rs: u8 },
    Multiply { rs: u8, rt: u8, signed: bool },
    Load {
        width: Width,
        signed: bool,
        rt: u8,
        base: u8,
        offset: i16,
    },
    Store {
        width: Width,
        rt: u8,
        base: u8,
        offset: i16,
    },
    Syscall { code: u32 },
    Break { code: u32 },
}

impl Instruction {
    /// Whether this instruction transfers control after a delay slot
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. } | Instruction::Jump { .. } | Instruction::JumpRegister { .. }
        )
    }

    /// Whether this instruction leaves translated code for the kernel or debugger
    pub fn is_trap(&self) -> bool {
        matches!(self, Instruction::Syscall { .. } | Instruction::Break { .. })
    }
}

/// Decode one instruction word
///
/// # Example
/// ```
/// use pspx::core::cpu::{decode, Instruction};
///
/// // jr $ra
/// assert_eq!(
///     decode(0x03E00008),
///     Some(Instruction::JumpRegister { rs: 31, link: None })
/// );
/// // COP1 is outside the supported subset
/// assert_eq!(decode(0x44000000), None);
/// ```
pub fn decode(word: u32) -> Option<Instruction> {
    let (op, rs, rt, imm) = decode_i_type(word);
    let offset = imm as i16;

    let branch = |cond, likely, link| Instruction::Branch {
        cond,
        rs,
        rt,
        offset,
        likely,
        link,
    };
    let load = |width, signed| Instruction::Load {
        width,
        signed,
        rt,
        base: rs,
        offset,
    };
    let store = |width| Instruction::Store {
        width,
        rt,
        base: rs,
        offset,
    };
    let immediate = |op| Instruction::Immediate { op, rt, rs, imm };

    let instruction = match op {
        0x00 => return decode_special(word),
        0x01 => return decode_regimm(word),
        0x02 | 0x03 => {
            let (_, target) = decode_j_type(word);
            Instruction::Jump {
                target,
                link: op == 0x03,
            }
        }
        0x04 => branch(Condition::Equal, false, false),
        0x05 => branch(Condition::NotEqual, false, false),
        0x06 => branch(Condition::LessEqualZero, false, false),
        0x07 => branch(Condition::GreaterThanZero, false, false),
        0x08 => immediate(ImmOp::Addi),
        0x09 => immediate(ImmOp::Addiu),
        0x0A => immediate(ImmOp::Slti),
        0x0B => immediate(ImmOp::Sltiu),
        0x0C => immediate(ImmOp::Andi),
        0x0D => immediate(ImmOp::Ori),
        0x0E => immediate(ImmOp::Xori),
        0x0F => Instruction::Lui { rt, imm },
        0x14 => branch(Condition::Equal, true, false),
        0x15 => branch(Condition::NotEqual, true, false),
        0x16 => branch(Condition::LessEqualZero, true, false),
        0x17 => branch(Condition::GreaterThanZero, true, false),
        0x20 => load(Width::Byte, true),
        0x21 => load(Width::Half, true),
        0x23 => load(Width::Word, false),
        0x24 => load(Width::Byte, false),
        0x25 => load(Width::Half, false),
        0x28 => store(Width::Byte),
        0x29 => store(Width::Half),
        0x2B => store(Width::Word),
        _ => return None,
    };
    Some(instruction)
}

/// SPECIAL (opcode 0x00) group
fn decode_special(word: u32) -> Option<Instruction> {
    let (rs, rt, rd, shamt, funct) = decode_r_type(word);
    let register = |op| Instruction::Register { op, rd, rs, rt };
    // SYSCALL/BREAK carry a 20-bit code in bits 6-25
    let code = (word >> 6) & 0x000F_FFFF;

    let instruction = match funct {
        0x00 => Instruction::Shift {
            op: ShiftOp::Sll,
            rd,
            rt,
            shamt,
        },
        0x02 => Instruction::Shift {
            op: ShiftOp::Srl,
            rd,
            rt,
            shamt,
        },
        0x03 => Instruction::Shift {
            op: ShiftOp::Sra,
            rd,
            rt,
            shamt,
        },
        0x04 => Instruction::ShiftVariable {
            op: ShiftOp::Sll,
            rd,
            rt,
            rs,
        },
        0x06 => Instruction::ShiftVariable {
            op: ShiftOp::Srl,
            rd,
            rt,
            rs,
        },
        0x07 => Instruction::ShiftVariable {
            op: ShiftOp::Sra,
            rd,
            rt,
            rs,
        },
        0x08 => Instruction::JumpRegister { rs, link: None },
        0x09 => Instruction::JumpRegister { rs, link: Some(rd) },
        0x0C => Instruction::Syscall { code },
        0x0D => Instruction::Break { code },
        0x10 => Instruction::MoveFromHi { rd },
        0x11 => Instruction::MoveToHi { rs },
        0x12 => Instruction::MoveFromLo { rd },
        0x13 => Instruction::MoveToLo { rs },
        0x18 => Instruction::Multiply {
            rs,
            rt,
            signed: true,
        },
        0x19 => Instruction::Multiply {
            rs,
            rt,
            signed: false,
        },
        0x20 => register(AluOp::Add),
        0x21 => register(AluOp::Addu),
        0x22 => register(AluOp::Sub),
        0x23 => register(AluOp::Subu),
        0x24 => register(AluOp::And),
        0x25 => register(AluOp::Or),
        0x26 => register(AluOp::Xor),
        0x27 => register(AluOp::Nor),
        0x2A => register(AluOp::Slt),
        0x2B => register(AluOp::Sltu),
        _ => return None,
    };
    Some(instruction)
}

/// REGIMM (opcode 0x01) group
///
/// rt bit 0 selects BGEZ over BLTZ, bit 1 the likely form, bit 4 and-link.
fn decode_regimm(word: u32) -> Option<Instruction> {
    let (_, rs, rt, imm) = decode_i_type(word);

    match rt {
        0x00..=0x03 | 0x10..=0x13 => Some(Instruction::Branch {
            cond: if rt & 0x01 != 0 {
                Condition::GreaterEqualZero
            } else {
                Condition::LessThanZero
            },
            rs,
            rt: 0,
            offset: imm as i16,
            likely: rt & 0x02 != 0,
            link: rt & 0x10 != 0,
        }),
        _ => None,
    }
}
