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

//! Compiled units and their exits
//!
//! A [`CompiledUnit`] is an immutable micro-op program for the guest code
//! starting at one address. Running it mutates the register file and guest
//! memory and ends with a [`UnitExit`] telling the dispatch loop where control
//! goes next. The branch-taken flag and the captured jump register are locals
//! of a single [`CompiledUnit::run`] call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use super::decode::{Condition, Instruction};
use super::translate::alu;
use super::RegisterFile;
use crate::core::error::Result;
use crate::core::memory::GuestMemory;

/// Where a transfer lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Address known at translation time; index into the unit's static links
    Static(usize),
    /// Address taken from a register at run time
    Dynamic(u32),
}

/// How control left a compiled unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Plain transfer (taken branch, J, JR, unit fallthrough)
    Branch(Target),
    /// And-link transfer (JAL, JALR, BLTZAL/BGEZAL and their likely forms)
    Call(Target),
    /// `jr $ra` to the captured return address
    Return(u32),
    /// SYSCALL; execution continues at `resume` once the kernel call completes
    Syscall { code: u32, resume: u32 },
    /// BREAK at `address`
    Break { code: u32, address: u32 },
}

/// Result of one unit invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitExit {
    pub exit: Exit,
    /// Guest instructions issued before leaving the unit
    pub retired: u32,
}

/// Micro-op of a compiled unit
#[derive(Debug, Clone)]
pub(super) enum Op {
    /// Computational instruction `word` located at `pc`
    Exec {
        pc: u32,
        word: u32,
        instruction: Instruction,
    },
    /// Evaluate a branch decision before the delay slot runs
    Decide { cond: Condition, rs: u8, rt: u8 },
    /// Latch a jump register before the delay slot runs
    Capture { rs: u8 },
    /// Skip the next op (a likely branch's delay slot) when not taken
    SquashUnlessTaken,
    /// Write a return address
    Link { rd: u8, value: u32 },
    /// Leave the unit if the last decision was taken
    ExitIfTaken(PlannedExit),
}

/// Exit destination as known at translation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Dest {
    Static(usize),
    Captured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Branch(Dest),
    Call(Dest),
    Return,
    Syscall { code: u32, resume: u32 },
    Break { code: u32, address: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PlannedExit {
    pub flow: Flow,
    pub retired: u32,
}

impl PlannedExit {
    fn resolve(&self, captured: u32) -> UnitExit {
        let target = |dest| match dest {
            Dest::Static(slot) => Target::Static(slot),
            Dest::Captured => Target::Dynamic(captured),
        };
        let exit = match self.flow {
            Flow::Branch(dest) => Exit::Branch(target(dest)),
            Flow::Call(dest) => Exit::Call(target(dest)),
            Flow::Return => Exit::Return(captured),
            Flow::Syscall { code, resume } => Exit::Syscall { code, resume },
            Flow::Break { code, address } => Exit::Break { code, address },
        };
        UnitExit {
            exit,
            retired: self.retired,
        }
    }
}

/// Direct link from one unit to the unit at a static target
///
/// Filled on first use. Holds a weak reference so the method cache stays the
/// only owner and invalidation can drop the target.
#[derive(Debug)]
pub(super) struct StaticLink {
    address: u32,
    unit: OnceLock<Weak<CompiledUnit>>,
}

impl StaticLink {
    pub(super) fn new(address: u32) -> Self {
        Self {
            address,
            unit: OnceLock::new(),
        }
    }

    pub(super) fn address(&self) -> u32 {
        self.address
    }
}

/// Translated guest code starting at one address
#[derive(Debug)]
pub struct CompiledUnit {
    start: u32,
    /// One past the last guest byte read during translation
    end: u32,
    ops: Vec<Op>,
    /// Exit taken when the ops run to completion
    terminal: PlannedExit,
    links: Vec<StaticLink>,
    instruction_count: u32,
    invalidated: AtomicBool,
}

impl CompiledUnit {
    pub(super) fn new(
        start: u32,
        end: u32,
        ops: Vec<Op>,
        terminal: PlannedExit,
        links: Vec<StaticLink>,
        instruction_count: u32,
    ) -> Self {
        Self {
            start,
            end,
            ops,
            terminal,
            links,
            instruction_count,
            invalidated: AtomicBool::new(false),
        }
    }

    /// Guest address of the first instruction
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the last guest byte covered
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of guest instructions translated, delay slots included
    pub fn instruction_count(&self) -> u32 {
        self.instruction_count
    }

    /// Number of micro-ops
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Whether the unit reads any byte of `[start, start + len)`
    pub fn overlaps(&self, start: u32, len: u32) -> bool {
        let range_end = u64::from(start) + u64::from(len);
        u64::from(self.start) < range_end && u64::from(start) < u64::from(self.end)
    }

    /// Static targets reachable from this unit, by link slot
    pub fn static_targets(&self) -> Vec<u32> {
        self.links.iter().map(StaticLink::address).collect()
    }

    /// Resolve an exit target to a guest address
    pub fn target_address(&self, target: Target) -> u32 {
        match target {
            Target::Static(slot) => self.links.get(slot).map_or(0, StaticLink::address),
            Target::Dynamic(address) => address,
        }
    }

    /// Unit previously linked at `slot`, if it is still live
    pub fn linked(&self, slot: usize) -> Option<Arc<CompiledUnit>> {
        self.links
            .get(slot)?
            .unit
            .get()?
            .upgrade()
            .filter(|unit| !unit.is_invalidated())
    }

    /// Remember `unit` as the target of `slot`
    ///
    /// A slot is linked at most once; later calls are ignored.
    pub fn link(&self, slot: usize, unit: &Arc<CompiledUnit>) {
        if let Some(link) = self.links.get(slot) {
            if link.address == unit.start {
                let _ = link.unit.set(Arc::downgrade(unit));
            }
        }
    }

    /// Mark the unit stale; direct links to it stop being followed
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Execute the unit against a register file
    ///
    /// On a memory fault the register file's pc is set to the faulting
    /// instruction.
    pub fn run(&self, regs: &mut RegisterFile, memory: &mut GuestMemory) -> Result<UnitExit> {
        let mut taken = false;
        let mut captured = 0u32;
        let mut ops = self.ops.iter();

        while let Some(op) = ops.next() {
            match op {
                Op::Exec {
                    pc,
                    word,
                    instruction,
                } => {
                    if let Err(e) = alu::execute(*pc, *word, instruction, regs, memory) {
                        regs.set_pc(*pc);
                        return Err(e);
                    }
                }
                Op::Decide { cond, rs, rt } => {
                    taken = cond.evaluate(regs.reg(*rs), regs.reg(*rt));
                }
                Op::Capture { rs } => captured = regs.reg(*rs),
                Op::SquashUnlessTaken => {
                    if !taken {
                        ops.next();
                    }
                }
                Op::Link { rd, value } => regs.set_reg(*rd, *value),
                Op::ExitIfTaken(exit) => {
                    if taken {
                        return Ok(exit.resolve(captured));
                    }
                }
            }
        }

        Ok(self.terminal.resolve(captured))
    }
}
