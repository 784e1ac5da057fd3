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

//! Wait descriptors, completion events and one-shot wake handles
//!
//! A blocked thread carries one [`WaitDescriptor`] identified by a
//! [`WaitKey`] that is never reused. Every trigger that can end the wait
//! (a wakeup, a timer, another thread's completion) resolves it by key, so
//! the first trigger wins and any later one finds a different key (or no
//! wait at all) and is a logged no-op.

use std::sync::Weak;

use super::scheduler::Shared;
use super::ThreadId;
use crate::core::error::KernelResult;

/// What a waiting thread is blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitType {
    /// No external source; SleepThread waits for wakeup credit
    None,
    /// A one-shot timer (DelayThread)
    Timer,
    /// Another thread's completion event (WaitThreadEnd)
    ThreadEnd,
}

impl WaitType {
    /// Wait type number reported to guest code
    pub fn code(self) -> u32 {
        match self {
            WaitType::None => 0,
            WaitType::Timer => 2,
            WaitType::ThreadEnd => 9,
        }
    }
}

/// Identity of one armed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitKey(pub(super) u64);

/// Armed state of a blocked thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitDescriptor {
    /// Kernel call that armed the wait, for diagnostics
    pub reason: &'static str,
    pub wait_type: WaitType,
    /// Whether callbacks may be serviced while blocked
    pub handle_callbacks: bool,
    pub key: WaitKey,
    /// Thread whose completion event holds this wait
    pub target: Option<ThreadId>,
}

/// One-shot event fired when a thread run ends
///
/// Fires at most once per run; StartThread re-arms it.
#[derive(Debug, Default)]
pub struct CompletionEvent {
    fired: bool,
    subscribers: Vec<(ThreadId, WaitKey)>,
}

impl CompletionEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the wait `key` of `thread` when the event fires
    pub fn subscribe(&mut self, thread: ThreadId, key: WaitKey) {
        self.subscribers.push((thread, key));
    }

    /// Forget the wait `key` of `thread`, resolved by some other trigger
    pub fn unsubscribe(&mut self, thread: ThreadId, key: WaitKey) {
        self.subscribers
            .retain(|&(waiter, waiting_on)| (waiter, waiting_on) != (thread, key));
    }

    /// Fire the event, handing back every subscriber
    ///
    /// A second fire in the same run returns nothing.
    pub fn fire(&mut self) -> Vec<(ThreadId, WaitKey)> {
        if self.fired {
            log::debug!("Kernel: completion event fired twice, ignored");
            return Vec::new();
        }
        self.fired = true;
        std::mem::take(&mut self.subscribers)
    }

    /// Re-arm for a new run
    pub fn rearm(&mut self) {
        self.fired = false;
        self.subscribers.clear();
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Consumable trigger for one armed wait
///
/// Handed to external sources such as timers. Firing takes the scheduler
/// lock, resolves the wait if it is still the one this handle was made for,
/// and marks a reschedule as pending. It never touches a register file: the
/// outcome is parked on the thread and applied by the dispatcher.
#[derive(Debug)]
pub struct WakeHandle {
    shared: Weak<Shared>,
    thread: ThreadId,
    key: WaitKey,
    outcome: KernelResult<()>,
}

impl WakeHandle {
    pub(super) fn new(
        shared: Weak<Shared>,
        thread: ThreadId,
        key: WaitKey,
        outcome: KernelResult<()>,
    ) -> Self {
        Self {
            shared,
            thread,
            key,
            outcome,
        }
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn key(&self) -> WaitKey {
        self.key
    }

    /// Resolve the wait; returns `false` when it was already resolved
    pub fn fire(self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.wake(self.thread, self.key, self.outcome),
            None => {
                log::debug!(
                    "Kernel: wake for thread {} after the scheduler was dropped",
                    self.thread
                );
                false
            }
        }
    }
}
