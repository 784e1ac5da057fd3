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

use super::{BranchDecision, Continuation, Translator, UnitBuilder};
use crate::core::cpu::decode::Condition;
use crate::core::cpu::reg;
use crate::core::cpu::unit::{Dest, Flow, Op};
use crate::core::error::Result;
use crate::core::memory::GuestMemory;

/// Operands of one conditional branch
#[derive(Debug, Clone, Copy)]
pub(super) struct Branch {
    pub cond: Condition,
    pub rs: u8,
    pub rt: u8,
    pub offset: i16,
    /// Squash the delay slot when not taken
    pub likely: bool,
    /// Write `r31 = branch + 8` after the delay slot
    pub link: bool,
}

/// Branch target: the delay slot address plus the shifted offset
#[inline(always)]
pub(super) fn branch_target(pc: u32, offset: i16) -> u32 {
    pc.wrapping_add(4)
        .wrapping_add(((offset as i32) << 2) as u32)
}

/// Translate BEQ/BNE/BLEZ/BGTZ/BLTZ/BGEZ, their likely and and-link forms
///
/// Emits, in order:
///
/// 1. the decision, evaluated on the registers before the delay slot
/// 2. a squash guard for likely forms
/// 3. the delay slot
/// 4. the link write for and-link forms, regardless of the decision
/// 5. the conditional exit to the static target
///
/// `b` / `bal` (`beq r0, r0` / `bgezal r0`) need no decision and end the unit.
pub(super) fn translate(
    translator: &Translator,
    builder: &mut UnitBuilder,
    memory: &GuestMemory,
    pc: u32,
    branch: Branch,
) -> Result<Continuation> {
    let target = branch_target(pc, branch.offset);
    let slot = builder.link_slot(target);
    let unconditional = branch.cond.always_taken(branch.rs, branch.rt);

    let flow = if branch.link {
        Flow::Call(Dest::Static(slot))
    } else {
        Flow::Branch(Dest::Static(slot))
    };

    builder.begin_branch(BranchDecision {
        branch_pc: pc,
        and_link: branch.link.then_some(reg::RA),
        conditional: !unconditional,
        flow,
    });
    builder.retire(pc);

    if !unconditional {
        builder.push(Op::Decide {
            cond: branch.cond,
            rs: branch.rs,
            rt: branch.rt,
        });
        if branch.likely {
            builder.push(Op::SquashUnlessTaken);
        }
    }

    translator.translate_delay_slot(builder, memory, pc)?;

    Ok(builder.close_branch())
}
