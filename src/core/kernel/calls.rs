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

//! Kernel-call surface
//!
//! [`KernelCall`] names each thread-manager call with its arguments already
//! marshaled. The numeric syscall table that produces them lives outside
//! the kernel (see `core::system::SyscallTable`).

use super::thread::ThreadParams;
use super::threads::ThreadManager;
use super::ThreadId;
use crate::core::cpu::RegisterFile;
use crate::core::error::{EmulatorError, KernelError, Result};
use crate::core::memory::GuestMemory;

/// Thread-manager call with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCall {
    CreateThread(ThreadParams),
    StartThread {
        id: ThreadId,
        arg_len: u32,
        arg_ptr: u32,
    },
    SleepThread {
        handle_callbacks: bool,
    },
    DelayThread {
        micros: u32,
        handle_callbacks: bool,
    },
    WaitThreadEnd {
        id: ThreadId,
        timeout_micros: Option<u32>,
        handle_callbacks: bool,
    },
    GetThreadId,
    /// Writes the thread-info record to `info_ptr`
    ReferThreadStatus {
        id: ThreadId,
        info_ptr: u32,
    },
    WakeupThread {
        id: ThreadId,
    },
    ChangeThreadPriority {
        id: ThreadId,
        priority: i32,
    },
    SuspendThread {
        id: ThreadId,
    },
    ResumeThread {
        id: ThreadId,
    },
    GetThreadExitStatus {
        id: ThreadId,
    },
    ExitThread {
        status: i32,
    },
    ExitDeleteThread {
        status: i32,
    },
    DeleteThread {
        id: ThreadId,
    },
    TerminateThread {
        id: ThreadId,
    },
    TerminateDeleteThread {
        id: ThreadId,
    },
    GetThreadCurrentPriority,
    ChangeCurrentThreadAttr {
        clear: u32,
        set: u32,
    },
}

impl KernelCall {
    pub fn name(&self) -> &'static str {
        match self {
            KernelCall::CreateThread(_) => "CreateThread",
            KernelCall::StartThread { .. } => "StartThread",
            KernelCall::SleepThread {
                handle_callbacks: false,
            } => "SleepThread",
            KernelCall::SleepThread { .. } => "SleepThreadCB",
            KernelCall::DelayThread {
                handle_callbacks: false,
                ..
            } => "DelayThread",
            KernelCall::DelayThread { .. } => "DelayThreadCB",
            KernelCall::WaitThreadEnd {
                handle_callbacks: false,
                ..
            } => "WaitThreadEnd",
            KernelCall::WaitThreadEnd { .. } => "WaitThreadEndCB",
            KernelCall::GetThreadId => "GetThreadId",
            KernelCall::ReferThreadStatus { .. } => "ReferThreadStatus",
            KernelCall::WakeupThread { .. } => "WakeupThread",
            KernelCall::ChangeThreadPriority { .. } => "ChangeThreadPriority",
            KernelCall::SuspendThread { .. } => "SuspendThread",
            KernelCall::ResumeThread { .. } => "ResumeThread",
            KernelCall::GetThreadExitStatus { .. } => "GetThreadExitStatus",
            KernelCall::ExitThread { .. } => "ExitThread",
            KernelCall::ExitDeleteThread { .. } => "ExitDeleteThread",
            KernelCall::DeleteThread { .. } => "DeleteThread",
            KernelCall::TerminateThread { .. } => "TerminateThread",
            KernelCall::TerminateDeleteThread { .. } => "TerminateDeleteThread",
            KernelCall::GetThreadCurrentPriority => "GetThreadCurrentPriority",
            KernelCall::ChangeCurrentThreadAttr { .. } => "ChangeCurrentThreadAttr",
        }
    }
}

/// Outcome of a kernel call as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelReturn {
    /// Value for `v0`; negative error codes on failure
    ///
    /// For a call that blocked this is provisional: the wait result replaces
    /// it when the thread is switched back in.
    pub value: i32,

    /// The caller gives up the CPU; the dispatcher must reschedule
    pub yield_now: bool,
}

impl KernelReturn {
    pub fn value(value: i32) -> Self {
        Self {
            value,
            yield_now: false,
        }
    }

    pub fn yielding(value: i32) -> Self {
        Self {
            value,
            yield_now: true,
        }
    }

    pub fn error(error: &KernelError) -> Self {
        Self::value(error.code())
    }
}

impl ThreadManager {
    /// Run one kernel call for the thread whose registers are `regs`
    ///
    /// Kernel errors become negative return values, including a guest
    /// pointer that does not map. Host-side failures such as a stack fill
    /// outside memory are returned as `Err`.
    pub fn execute(
        &self,
        call: KernelCall,
        regs: &RegisterFile,
        memory: &mut GuestMemory,
    ) -> Result<KernelReturn> {
        let name = call.name();
        log::trace!("Kernel: {:?}", call);

        let result = self.execute_inner(call, regs, memory);
        match result {
            Ok(ret) => Ok(ret),
            Err(EmulatorError::Kernel(e)) => {
                match e {
                    KernelError::Unimplemented(_) => log::warn!("Kernel: {} failed: {}", name, e),
                    _ => log::debug!("Kernel: {} failed: {}", name, e),
                }
                Ok(KernelReturn::error(&e))
            }
            Err(e) => Err(e),
        }
    }

    fn execute_inner(
        &self,
        call: KernelCall,
        regs: &RegisterFile,
        memory: &mut GuestMemory,
    ) -> Result<KernelReturn> {
        let ret = match call {
            KernelCall::CreateThread(params) => {
                let id = self.create_thread(regs, memory, params)?;
                KernelReturn::value(id as i32)
            }
            KernelCall::StartThread {
                id,
                arg_len,
                arg_ptr,
            } => {
                self.start_thread(id, arg_len, arg_ptr)?;
                KernelReturn::yielding(0)
            }
            KernelCall::SleepThread { handle_callbacks } => {
                let blocked = self.sleep_thread(handle_callbacks)?;
                KernelReturn {
                    value: 0,
                    yield_now: blocked,
                }
            }
            KernelCall::DelayThread {
                micros,
                handle_callbacks,
            } => {
                self.delay_thread(micros, handle_callbacks)?;
                KernelReturn::yielding(0)
            }
            KernelCall::WaitThreadEnd {
                id,
                timeout_micros,
                handle_callbacks,
            } => {
                let blocked = self.wait_thread_end(id, timeout_micros, handle_callbacks)?;
                KernelReturn {
                    value: 0,
                    yield_now: blocked,
                }
            }
            KernelCall::GetThreadId => KernelReturn::value(self.get_thread_id()? as i32),
            KernelCall::ReferThreadStatus { id, info_ptr } => {
                let info = self.refer_thread_status(id)?;
                info.write_to(memory, info_ptr)
                    .map_err(|_| KernelError::IllegalAddress(info_ptr))?;
                KernelReturn::value(0)
            }
            KernelCall::WakeupThread { id } => {
                self.wakeup_thread(id)?;
                KernelReturn::value(0)
            }
            KernelCall::ChangeThreadPriority { id, priority } => {
                self.change_thread_priority(id, priority)?;
                KernelReturn::yielding(0)
            }
            KernelCall::SuspendThread { id } => {
                self.suspend_thread(id)?;
                KernelReturn::value(0)
            }
            KernelCall::ResumeThread { id } => {
                self.resume_thread(id)?;
                KernelReturn::yielding(0)
            }
            KernelCall::GetThreadExitStatus { id } => {
                KernelReturn::value(self.get_thread_exit_status(id)?)
            }
            KernelCall::ExitThread { status } => {
                self.exit_thread(memory, status)?;
                KernelReturn::yielding(0)
            }
            KernelCall::ExitDeleteThread { status } => {
                self.exit_delete_thread(memory, status)?;
                KernelReturn::yielding(0)
            }
            KernelCall::DeleteThread { id } => {
                self.delete_thread(id)?;
                KernelReturn::value(0)
            }
            KernelCall::TerminateThread { id } => {
                self.terminate_thread(id)?;
                KernelReturn::yielding(0)
            }
            KernelCall::TerminateDeleteThread { id } => {
                self.terminate_delete_thread(id)?;
                KernelReturn::yielding(0)
            }
            KernelCall::GetThreadCurrentPriority => {
                KernelReturn::value(self.get_thread_current_priority()?)
            }
            KernelCall::ChangeCurrentThreadAttr { clear, set } => {
                self.change_current_thread_attr(clear, set)?;
                KernelReturn::value(0)
            }
        };
        Ok(ret)
    }
}
