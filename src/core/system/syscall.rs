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

//! Numeric syscall table
//!
//! Translated code reaches the kernel through `SYSCALL code`. A
//! [`SyscallTable`] turns the code and the argument registers into a
//! [`Syscall`] for the dispatch loop. [`KernelSyscalls`] is the built-in
//! table covering the thread manager; firmware with a different numbering
//! plugs in its own table through
//! [`System::with_syscalls`](super::System::with_syscalls).
//!
//! # Register convention
//!
//! Arguments arrive in `a0`-`a3` then `t0`. The result goes to `v0`.

use crate::core::cpu::{reg, RegisterFile};
use crate::core::error::{KernelError, Result};
use crate::core::kernel::{KernelCall, ThreadAttributes, ThreadParams, MAX_NAME_LEN};
use crate::core::memory::GuestMemory;

/// What a syscall asks the dispatch loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Syscall {
    /// Run a thread-manager call
    Kernel(KernelCall),
    /// Handled by the table; store the value in `v0` and continue
    Return(i32),
    /// Stop the dispatch loop
    Halt,
}

/// Maps syscall codes to calls
///
/// A lookup may read guest memory to marshal arguments. Returning
/// `Err(EmulatorError::Kernel(_))` reports the error code to the guest in
/// `v0`; any other error stops the dispatch loop. An argument pointer that
/// does not map is a kernel error.
pub trait SyscallTable: Send {
    fn lookup(&mut self, code: u32, regs: &mut RegisterFile, memory: &mut GuestMemory)
        -> Result<Syscall>;
}

/// Syscall codes of [`KernelSyscalls`]
pub mod codes {
    pub const CREATE_THREAD: u32 = 0x2000;
    pub const START_THREAD: u32 = 0x2001;
    pub const SLEEP_THREAD: u32 = 0x2002;
    pub const SLEEP_THREAD_CB: u32 = 0x2003;
    pub const DELAY_THREAD: u32 = 0x2004;
    pub const DELAY_THREAD_CB: u32 = 0x2005;
    pub const WAIT_THREAD_END: u32 = 0x2006;
    pub const WAIT_THREAD_END_CB: u32 = 0x2007;
    pub const GET_THREAD_ID: u32 = 0x2008;
    pub const REFER_THREAD_STATUS: u32 = 0x2009;
    pub const WAKEUP_THREAD: u32 = 0x200A;
    pub const CHANGE_THREAD_PRIORITY: u32 = 0x200B;
    pub const SUSPEND_THREAD: u32 = 0x200C;
    pub const RESUME_THREAD: u32 = 0x200D;
    pub const GET_THREAD_EXIT_STATUS: u32 = 0x200E;
    pub const EXIT_THREAD: u32 = 0x200F;
    pub const EXIT_DELETE_THREAD: u32 = 0x2010;
    pub const DELETE_THREAD: u32 = 0x2011;
    pub const TERMINATE_THREAD: u32 = 0x2012;
    pub const TERMINATE_DELETE_THREAD: u32 = 0x2013;
    pub const GET_THREAD_CURRENT_PRIORITY: u32 = 0x2014;
    pub const CHANGE_CURRENT_THREAD_ATTR: u32 = 0x2015;
    /// Stop emulation
    pub const HALT: u32 = 0x2016;
}

/// Built-in table for the thread-manager calls
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelSyscalls;

impl KernelSyscalls {
    pub fn new() -> Self {
        Self
    }
}

impl SyscallTable for KernelSyscalls {
    fn lookup(
        &mut self,
        code: u32,
        regs: &mut RegisterFile,
        memory: &mut GuestMemory,
    ) -> Result<Syscall> {
        let a0 = regs.reg(reg::A0);
        let a1 = regs.reg(reg::A1);
        let a2 = regs.reg(reg::A2);

        let call = match code {
            codes::CREATE_THREAD => {
                let name = memory
                    .read_cstr(a0, MAX_NAME_LEN as u32 + 1)
                    .map_err(|_| KernelError::IllegalAddress(a0))?;
                KernelCall::CreateThread(
                    ThreadParams::new(name, a1, a2 as i32, regs.reg(reg::A3)).with_attributes(
                        ThreadAttributes::from_bits_retain(regs.reg(reg::T0)),
                    ),
                )
            }
            codes::START_THREAD => KernelCall::StartThread {
                id: a0,
                arg_len: a1,
                arg_ptr: a2,
            },
            codes::SLEEP_THREAD | codes::SLEEP_THREAD_CB => KernelCall::SleepThread {
                handle_callbacks: code == codes::SLEEP_THREAD_CB,
            },
            codes::DELAY_THREAD | codes::DELAY_THREAD_CB => KernelCall::DelayThread {
                micros: a0,
                handle_callbacks: code == codes::DELAY_THREAD_CB,
            },
            codes::WAIT_THREAD_END | codes::WAIT_THREAD_END_CB => {
                // a1 points at the timeout in microseconds; null waits forever
                let timeout_micros = match a1 {
                    0 => None,
                    ptr => Some(
                        memory
                            .read32(ptr)
                            .map_err(|_| KernelError::IllegalAddress(ptr))?,
                    ),
                };
                KernelCall::WaitThreadEnd {
                    id: a0,
                    timeout_micros,
                    handle_callbacks: code == codes::WAIT_THREAD_END_CB,
                }
            }
            codes::GET_THREAD_ID => KernelCall::GetThreadId,
            codes::REFER_THREAD_STATUS => KernelCall::ReferThreadStatus {
                id: a0,
                info_ptr: a1,
            },
            codes::WAKEUP_THREAD => KernelCall::WakeupThread { id: a0 },
            codes::CHANGE_THREAD_PRIORITY => KernelCall::ChangeThreadPriority {
                id: a0,
                priority: a1 as i32,
            },
            codes::SUSPEND_THREAD => KernelCall::SuspendThread { id: a0 },
            codes::RESUME_THREAD => KernelCall::ResumeThread { id: a0 },
            codes::GET_THREAD_EXIT_STATUS => KernelCall::GetThreadExitStatus { id: a0 },
            codes::EXIT_THREAD => KernelCall::ExitThread { status: a0 as i32 },
            codes::EXIT_DELETE_THREAD => KernelCall::ExitDeleteThread { status: a0 as i32 },
            codes::DELETE_THREAD => KernelCall::DeleteThread { id: a0 },
            codes::TERMINATE_THREAD => KernelCall::TerminateThread { id: a0 },
            codes::TERMINATE_DELETE_THREAD => KernelCall::TerminateDeleteThread { id: a0 },
            codes::GET_THREAD_CURRENT_PRIORITY => KernelCall::GetThreadCurrentPriority,
            codes::CHANGE_CURRENT_THREAD_ATTR => KernelCall::ChangeCurrentThreadAttr {
                clear: a0,
                set: a1,
            },
            codes::HALT => return Ok(Syscall::Halt),
            _ => return Err(KernelError::Unimplemented("syscall").into()),
        };
        Ok(Syscall::Kernel(call))
    }
}
