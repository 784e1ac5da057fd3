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

//! Kernel thread manager
//!
//! Emulates the console kernel's thread API on top of the dispatch loop:
//! thread lifecycle, priority scheduling, the sleep/wakeup credit counter and
//! the wait primitives.
//!
//! Scheduling is cooperative. Guest code only gives up the CPU inside a
//! kernel call; external sources (timers on host threads) go through
//! [`WakeHandle`]s, which resolve a wait and flag a reschedule that the
//! dispatcher performs at its next kernel-call boundary.
//!
//! # Thread states
//!
//! ```text
//!            CreateThread
//!                 |
//!                 v
//!   +------> Stopped ---StartThread---> Ready <----------------+
//!   |                                   |   ^                  |
//!   | ExitThread                 switch |   | preempt / wake   | Resume
//!   |                                   v   |                  |
//!   +------------------------------- Running ---> Waiting ---> Suspended
//!                                                  (sleep, delay,
//!                                                   thread end)
//! ```
//!
//! TerminateThread moves any other live thread to Killed. Stopped and
//! Killed threads can be deleted, which frees their stacks.

mod calls;
mod scheduler;
#[cfg(test)]
mod tests;
mod thread;
mod threads;
mod wait;

pub use calls::{KernelCall, KernelReturn};
pub use thread::{
    GuestThread, ThreadAttributes, ThreadInfo, ThreadParams, ThreadStatus, MAX_NAME_LEN,
    PRIORITY_HIGHEST, PRIORITY_LOWEST,
};
pub use threads::ThreadManager;
pub use wait::{CompletionEvent, WaitDescriptor, WaitKey, WaitType, WakeHandle};

/// Kernel object id of a thread; 0 names the calling thread where allowed
pub type ThreadId = u32;
