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

//! Guest thread control block

use bitflags::bitflags;

use super::wait::{CompletionEvent, WaitDescriptor, WaitType};
use super::ThreadId;
use crate::core::cpu::{reg, RegisterFile};
use crate::core::error::{KernelError, KernelResult, Result};
use crate::core::memory::{GuestMemory, Region};

/// Highest precedence a guest thread may request
pub const PRIORITY_HIGHEST: i32 = 1;

/// Lowest precedence a guest thread may request
pub const PRIORITY_LOWEST: i32 = 126;

/// Longest thread name kept, excluding the terminator
pub const MAX_NAME_LEN: usize = 31;

bitflags! {
    /// Thread attributes passed to CreateThread
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ThreadAttributes: u32 {
        /// Thread uses the VFPU
        const VFPU = 0x0000_4000;
        /// Thread may use the scratchpad
        const SCRATCH_SRAM = 0x0000_8000;
        /// Leave the stack contents alone at creation
        const NO_FILLSTACK = 0x0010_0000;
        /// Zero the stack when the thread exits
        const CLEAR_STACK = 0x0020_0000;
        /// User-mode thread
        const USER = 0x8000_0000;
    }
}

impl ThreadAttributes {
    /// Bits ChangeCurrentThreadAttr may clear or set
    pub const USER_MODIFIABLE: ThreadAttributes = ThreadAttributes::VFPU;
}

/// Scheduling status of a guest thread
///
/// Stopped is the dormant state: created, or exited and restartable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    Stopped,
    Ready,
    Running,
    Waiting,
    Suspended,
    Killed,
}

impl ThreadStatus {
    /// Status bits reported to guest code
    pub fn code(self) -> u32 {
        match self {
            ThreadStatus::Running => 0x01,
            ThreadStatus::Ready => 0x02,
            ThreadStatus::Waiting => 0x04,
            ThreadStatus::Suspended => 0x08,
            ThreadStatus::Stopped => 0x10,
            ThreadStatus::Killed => 0x20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ThreadStatus::Stopped => "stopped",
            ThreadStatus::Ready => "ready",
            ThreadStatus::Running => "running",
            ThreadStatus::Waiting => "waiting",
            ThreadStatus::Suspended => "suspended",
            ThreadStatus::Killed => "killed",
        }
    }

    /// Stopped or Killed
    pub fn is_terminated(self) -> bool {
        matches!(self, ThreadStatus::Stopped | ThreadStatus::Killed)
    }
}

/// Arguments of CreateThread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadParams {
    pub name: String,
    pub entry: u32,
    pub priority: i32,
    pub stack_size: u32,
    pub attributes: ThreadAttributes,
}

impl ThreadParams {
    pub fn new(name: impl Into<String>, entry: u32, priority: i32, stack_size: u32) -> Self {
        Self {
            name: name.into(),
            entry,
            priority,
            stack_size,
            attributes: ThreadAttributes::USER,
        }
    }

    pub fn with_attributes(mut self, attributes: ThreadAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// One guest thread
#[derive(Debug)]
pub struct GuestThread {
    pub(super) id: ThreadId,
    pub(super) name: String,
    pub(super) entry: u32,
    pub(super) gp: u32,
    pub(super) attributes: ThreadAttributes,
    pub(super) init_priority: i32,
    pub(super) priority: i32,
    pub(super) status: ThreadStatus,
    pub(super) regs: RegisterFile,
    pub(super) stack: Region,
    /// Size requested by the creator, before alignment
    pub(super) stack_size: u32,
    /// Pending wakeup credit; a sleep blocks when it drops below zero
    pub(super) wakeup_count: i32,
    pub(super) wait: Option<WaitDescriptor>,
    /// Result of the last resolved wait, applied to `v0` at switch-in
    pub(super) wake_result: Option<KernelResult<()>>,
    pub(super) exit_status: i32,
    pub(super) completion: CompletionEvent,
    /// Resolve the current wait to Suspended instead of Ready
    pub(super) suspend_pending: bool,
    /// Position in the ready queue while Ready
    pub(super) ready_key: Option<(i32, u64)>,
    pub(super) run_count: u32,
    pub(super) release_count: u32,
}

impl GuestThread {
    pub(super) fn new(
        id: ThreadId,
        params: ThreadParams,
        gp: u32,
        stack: Region,
        regs: RegisterFile,
    ) -> Self {
        let mut name = params.name;
        if name.len() > MAX_NAME_LEN {
            let mut end = MAX_NAME_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }

        Self {
            id,
            name,
            entry: params.entry,
            gp,
            attributes: params.attributes,
            init_priority: params.priority,
            priority: params.priority,
            status: ThreadStatus::Stopped,
            regs,
            stack,
            stack_size: params.stack_size,
            wakeup_count: 0,
            wait: None,
            wake_result: None,
            exit_status: 0,
            completion: CompletionEvent::new(),
            suspend_pending: false,
            ready_key: None,
            run_count: 0,
            release_count: 0,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn stack(&self) -> Region {
        self.stack
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Error for `operation` attempted in the current status
    pub(super) fn invalid(&self, operation: &'static str) -> KernelError {
        KernelError::InvalidThreadState {
            id: self.id,
            status: self.status.name(),
            operation,
        }
    }

    /// Seat pc, gp, sp and ra for a fresh run from the entry point
    pub(super) fn seat_entry(&mut self, return_address: u32) {
        self.regs.set_pc(self.entry);
        self.regs.set_reg(reg::GP, self.gp);
        self.regs.set_reg(reg::SP, self.stack.high());
        self.regs.set_reg(reg::RA, return_address);
    }

    pub(super) fn info(&self) -> ThreadInfo {
        ThreadInfo {
            id: self.id,
            name: self.name.clone(),
            attributes: self.attributes,
            status: self.status,
            entry: self.entry,
            stack: self.stack.low,
            stack_size: self.stack_size,
            gp: self.gp,
            init_priority: self.init_priority,
            current_priority: self.priority,
            wait_type: self.wait.as_ref().map_or(WaitType::None, |w| w.wait_type),
            wakeup_count: self.wakeup_count,
            exit_status: self.exit_status,
            run_count: self.run_count,
            release_count: self.release_count,
        }
    }
}

/// Snapshot returned by ReferThreadStatus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub attributes: ThreadAttributes,
    pub status: ThreadStatus,
    pub entry: u32,
    /// Low end of the stack
    pub stack: u32,
    pub stack_size: u32,
    pub gp: u32,
    pub init_priority: i32,
    pub current_priority: i32,
    pub wait_type: WaitType,
    pub wakeup_count: i32,
    pub exit_status: i32,
    /// Times the thread was switched in
    pub run_count: u32,
    /// Waits released by a trigger
    pub release_count: u32,
}

impl ThreadInfo {
    /// Size of the guest record written by [`ThreadInfo::write_to`]
    pub const RECORD_SIZE: u32 = 104;

    /// Write the guest thread-info record at `address`
    ///
    /// Layout (little endian):
    ///
    /// | Offset | Field                 |
    /// |--------|-----------------------|
    /// | 0      | size (104)            |
    /// | 4      | name, 32 bytes, NUL   |
    /// | 36     | attributes            |
    /// | 40     | status bits           |
    /// | 44     | entry                 |
    /// | 48     | stack low             |
    /// | 52     | stack size            |
    /// | 56     | gp                    |
    /// | 60     | initial priority      |
    /// | 64     | current priority      |
    /// | 68     | wait type             |
    /// | 72     | wait id               |
    /// | 76     | wakeup count          |
    /// | 80     | exit status           |
    /// | 84     | run clocks (u64)      |
    /// | 92     | interrupt preemptions |
    /// | 96     | switch-in count       |
    /// | 100    | release count         |
    pub fn write_to(&self, memory: &mut GuestMemory, address: u32) -> Result<()> {
        let mut record = [0u8; Self::RECORD_SIZE as usize];

        let mut put = |offset: usize, value: u32| {
            record[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        };
        put(0, Self::RECORD_SIZE);
        put(36, self.attributes.bits());
        put(40, self.status.code());
        put(44, self.entry);
        put(48, self.stack);
        put(52, self.stack_size);
        put(56, self.gp);
        put(60, self.init_priority as u32);
        put(64, self.current_priority as u32);
        put(68, self.wait_type.code());
        put(72, 0);
        put(76, self.wakeup_count as u32);
        put(80, self.exit_status as u32);
        put(96, self.run_count);
        put(100, self.release_count);

        let name = self.name.as_bytes();
        let len = name.len().min(MAX_NAME_LEN);
        record[4..4 + len].copy_from_slice(&name[..len]);

        memory.load(address, &record)
    }
}
