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
use crate::core::cpu::reg;
use crate::core::cpu::unit::{Dest, Flow, Op};
use crate::core::error::Result;
use crate::core::memory::GuestMemory;

/// J/JAL target: upper 4 bits of the delay slot address, then `target << 2`
#[inline(always)]
pub(super) fn jump_target(pc: u32, target: u32) -> u32 {
    (pc.wrapping_add(4) & 0xF000_0000) | ((target & 0x03FF_FFFF) << 2)
}

/// J: Jump / JAL: Jump and Link
///
/// Format: j target
/// Operation: PC = ((PC + 4) & 0xF0000000) | (target << 2); JAL also r31 = PC + 8
pub(super) fn translate_jump(
    translator: &Translator,
    builder: &mut UnitBuilder,
    memory: &GuestMemory,
    pc: u32,
    target: u32,
    link: bool,
) -> Result<Continuation> {
    let slot = builder.link_slot(jump_target(pc, target));

    builder.begin_branch(BranchDecision {
        branch_pc: pc,
        and_link: link.then_some(reg::RA),
        conditional: false,
        flow: if link {
            Flow::Call(Dest::Static(slot))
        } else {
            Flow::Branch(Dest::Static(slot))
        },
    });
    builder.retire(pc);

    translator.translate_delay_slot(builder, memory, pc)?;

    Ok(builder.close_branch())
}

/// JR: Jump Register / JALR: Jump And Link Register
///
/// The register is read before the delay slot runs, so a delay slot that
/// overwrites it does not change the target. `jr $ra` becomes a return exit.
///
/// Format: jr rs / jalr rd, rs
/// Operation: PC = rs; JALR also rd = PC + 8
pub(super) fn translate_jump_register(
    translator: &Translator,
    builder: &mut UnitBuilder,
    memory: &GuestMemory,
    pc: u32,
    rs: u8,
    link: Option<u8>,
) -> Result<Continuation> {
    let flow = match link {
        Some(_) => Flow::Call(Dest::Captured),
        None if rs == reg::RA => Flow::Return,
        None => Flow::Branch(Dest::Captured),
    };

    builder.begin_branch(BranchDecision {
        branch_pc: pc,
        and_link: link,
        conditional: false,
        flow,
    });
    builder.retire(pc);
    builder.push(Op::Capture { rs });

    translator.translate_delay_slot(builder, memory, pc)?;

    Ok(builder.close_branch())
}
