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

//! Guest code to compiled unit translation
//!
//! # Unit formation
//!
//! A unit starts at the requested address and extends through straight-line
//! code and not-taken conditional branches. It ends at:
//!
//! - an unconditional transfer (J, JAL, JR, JALR, `b`, `bal`)
//! - SYSCALL or BREAK
//! - the configured instruction limit (fallthrough exit)
//! - a word that cannot be fetched or decoded, unless it is the first one
//!
//! # Delay slots
//!
//! A branch decision (or a jump register) is evaluated before the delay slot.
//! After the delay slot the link register is written for and-link forms, then
//! the unit transfers or falls through to `branch + 8`.

pub(super) mod alu;
mod branch;
mod jump;

use super::decode::{decode, Instruction};
use super::disassembler::Disassembler;
use super::unit::{CompiledUnit, Dest, Flow, Op, PlannedExit, StaticLink};
use crate::core::config::CpuConfig;
use crate::core::error::{EmulatorError, Result};
use crate::core::memory::GuestMemory;

/// Per-branch translation state
///
/// Lives for exactly one branch + delay-slot pair.
#[derive(Debug, Clone, Copy)]
pub(super) struct BranchDecision {
    /// Address of the branch instruction
    pub branch_pc: u32,
    /// Register receiving `branch_pc + 8`, for and-link forms
    pub and_link: Option<u8>,
    /// Whether the transfer depends on a run-time decision
    pub conditional: bool,
    pub flow: Flow,
}

/// What the translation loop does after an instruction
pub(super) enum Continuation {
    Next,
    End(PlannedExit),
}

/// Mutable state while building one unit
pub(super) struct UnitBuilder {
    start: u32,
    /// Address of the next instruction to translate
    pc: u32,
    /// One past the last byte read
    end: u32,
    ops: Vec<Op>,
    links: Vec<StaticLink>,
    retired: u32,
    decision: Option<BranchDecision>,
}

impl UnitBuilder {
    fn new(start: u32) -> Self {
        Self {
            start,
            pc: start,
            end: start,
            ops: Vec::new(),
            links: Vec::new(),
            retired: 0,
            decision: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.retired == 0
    }

    /// Account for one consumed guest word at `pc`
    pub(super) fn retire(&mut self, pc: u32) {
        self.retired += 1;
        self.end = self.end.max(pc.wrapping_add(4));
    }

    pub(super) fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Static link slot for `address`, shared by every exit to it
    pub(super) fn link_slot(&mut self, address: u32) -> usize {
        match self.links.iter().position(|l| l.address() == address) {
            Some(slot) => slot,
            None => {
                self.links.push(StaticLink::new(address));
                self.links.len() - 1
            }
        }
    }

    pub(super) fn begin_branch(&mut self, decision: BranchDecision) {
        self.decision = Some(decision);
    }

    /// Emit the link write and exit for the pending branch
    ///
    /// Conditional branches fall through to `branch + 8`; everything else
    /// ends the unit.
    pub(super) fn close_branch(&mut self) -> Continuation {
        let Some(decision) = self.decision.take() else {
            return Continuation::Next;
        };

        if let Some(rd) = decision.and_link {
            self.ops.push(Op::Link {
                rd,
                value: decision.branch_pc.wrapping_add(8),
            });
        }

        let exit = PlannedExit {
            flow: decision.flow,
            retired: self.retired,
        };
        self.pc = decision.branch_pc.wrapping_add(8);

        if decision.conditional {
            self.ops.push(Op::ExitIfTaken(exit));
            Continuation::Next
        } else {
            Continuation::End(exit)
        }
    }

    fn fallthrough(&mut self, address: u32) -> PlannedExit {
        let slot = self.link_slot(address);
        PlannedExit {
            flow: Flow::Branch(Dest::Static(slot)),
            retired: self.retired,
        }
    }

    fn finish(self, terminal: PlannedExit) -> CompiledUnit {
        CompiledUnit::new(
            self.start,
            self.end,
            self.ops,
            terminal,
            self.links,
            self.retired,
        )
    }
}

/// Translates guest code into compiled units
#[derive(Debug, Clone)]
pub struct Translator {
    squash_likely: bool,
    max_instructions: u32,
    trace: bool,
}

impl Translator {
    pub fn new(config: &CpuConfig) -> Self {
        Self {
            squash_likely: config.squash_likely_delay_slot,
            max_instructions: config.max_unit_instructions.max(2),
            trace: config.trace_translation,
        }
    }

    /// Translate the unit starting at `address`
    ///
    /// Fails with [`EmulatorError::UndefinedInstruction`] when the first word or
    /// a delay slot cannot be translated, or with a memory error when the first
    /// word cannot be fetched.
    pub fn translate(&self, address: u32, memory: &GuestMemory) -> Result<CompiledUnit> {
        let mut builder = UnitBuilder::new(address);

        let terminal = loop {
            let pc = builder.pc;

            let word = match memory.read32(pc) {
                Ok(word) => word,
                Err(e) if builder.is_empty() => return Err(e),
                Err(_) => break builder.fallthrough(pc),
            };

            let Some(instruction) = decode(word) else {
                if builder.is_empty() {
                    return Err(EmulatorError::UndefinedInstruction {
                        address: pc,
                        word,
                        reason: "unrecognized encoding",
                    });
                }
                break builder.fallthrough(pc);
            };

            let needed = if instruction.is_transfer() { 2 } else { 1 };
            if !builder.is_empty() && builder.retired + needed > self.max_instructions {
                break builder.fallthrough(pc);
            }

            if self.trace {
                log::trace!("JIT 0x{:08X}: {}", pc, Disassembler::disassemble(word, pc));
            }

            let continuation = match instruction {
                Instruction::Branch {
                    cond,
                    rs,
                    rt,
                    offset,
                    likely,
                    link,
                } => {
                    let branch = branch::Branch {
                        cond,
                        rs,
                        rt,
                        offset,
                        likely: likely && self.squash_likely,
                        link,
                    };
                    branch::translate(self, &mut builder, memory, pc, branch)?
                }
                Instruction::Jump { target, link } => {
                    jump::translate_jump(self, &mut builder, memory, pc, target, link)?
                }
                Instruction::JumpRegister { rs, link } => {
                    jump::translate_jump_register(self, &mut builder, memory, pc, rs, link)?
                }
                Instruction::Syscall { code } => {
                    builder.retire(pc);
                    Continuation::End(PlannedExit {
                        flow: Flow::Syscall {
                            code,
                            resume: pc.wrapping_add(4),
                        },
                        retired: builder.retired,
                    })
                }
                Instruction::Break { code } => {
                    builder.retire(pc);
                    Continuation::End(PlannedExit {
                        flow: Flow::Break { code, address: pc },
                        retired: builder.retired,
                    })
                }
                other => {
                    alu::translate(&mut builder, pc, word, other);
                    builder.pc = pc.wrapping_add(4);
                    Continuation::Next
                }
            };

            if let Continuation::End(exit) = continuation {
                break exit;
            }
        };

        log::trace!(
            "Translated unit 0x{:08X}-0x{:08X} ({} instructions)",
            builder.start,
            builder.end,
            builder.retired
        );

        Ok(builder.finish(terminal))
    }

    /// Translate the delay slot of the branch at `branch_pc`
    ///
    /// The slot must hold a computational instruction. Transfers, traps and
    /// undecodable words are rejected at translation time.
    pub(super) fn translate_delay_slot(
        &self,
        builder: &mut UnitBuilder,
        memory: &GuestMemory,
        branch_pc: u32,
    ) -> Result<()> {
        let pc = branch_pc.wrapping_add(4);
        let word = memory.read32(pc)?;

        let reason = match decode(word) {
            None => "undecodable delay slot",
            Some(instruction) if instruction.is_transfer() => "control transfer in delay slot",
            Some(instruction) if instruction.is_trap() => "trap in delay slot",
            Some(instruction) => {
                if self.trace {
                    log::trace!("JIT 0x{:08X}:  {}", pc, Disassembler::disassemble(word, pc));
                }
                alu::translate(builder, pc, word, instruction);
                return Ok(());
            }
        };

        Err(EmulatorError::UndefinedInstruction {
            address: pc,
            word,
            reason,
        })
    }
}
