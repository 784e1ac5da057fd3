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

//! Scheduler state: thread registry, ready queue and wait resolution
//!
//! Everything here runs under the one scheduler-wide mutex held in
//! [`Shared`]. The ready queue is keyed by `(priority, arrival)` so the
//! first entry is always the thread to run next: lowest priority value
//! first, FIFO among equals.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::thread::{GuestThread, ThreadStatus};
use super::wait::{WaitDescriptor, WaitKey};
use super::ThreadId;
use crate::core::error::{KernelError, KernelResult};
use crate::core::memory::PartitionAllocator;

/// State shared between the dispatcher and external wake sources
#[derive(Debug)]
pub(crate) struct Shared {
    pub(super) state: Mutex<SchedulerState>,
    /// Signalled whenever a thread becomes Ready from outside the dispatcher
    pub(super) ready: Condvar,
}

impl Shared {
    pub(super) fn new(state: SchedulerState) -> Self {
        Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
        }
    }

    /// Resolve a wait from an external source
    pub(super) fn wake(&self, thread: ThreadId, key: WaitKey, outcome: KernelResult<()>) -> bool {
        let mut state = self.state.lock();
        let woke = state.resolve_wait(thread, key, outcome);
        if woke {
            self.ready.notify_all();
        }
        woke
    }

    /// Block until a thread is Ready, a reschedule is pending or `timeout`
    /// elapses
    pub(super) fn wait_for_ready(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if state.has_ready() || state.reschedule_pending {
            return true;
        }
        let _ = self.ready.wait_for(&mut state, timeout);
        state.has_ready() || state.reschedule_pending
    }
}

#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(super) threads: BTreeMap<ThreadId, GuestThread>,
    ready: BTreeMap<(i32, u64), ThreadId>,
    /// Thread owning the CPU, or the one that just gave it up
    pub(super) current: Option<ThreadId>,
    pub(super) partition: PartitionAllocator,
    next_id: ThreadId,
    next_arrival: u64,
    next_wait_key: u64,
    /// Set by wake sources; the dispatcher reschedules at its next boundary
    pub(super) reschedule_pending: bool,
    pub(super) context_switches: u64,
}

impl SchedulerState {
    pub(super) fn new(partition: PartitionAllocator) -> Self {
        Self {
            threads: BTreeMap::new(),
            ready: BTreeMap::new(),
            current: None,
            partition,
            next_id: 1,
            next_arrival: 0,
            next_wait_key: 0,
            reschedule_pending: false,
            context_switches: 0,
        }
    }

    /// Carry the wait key counter of `previous` into this state
    pub(super) fn continuing_keys_from(mut self, previous: &SchedulerState) -> Self {
        self.next_wait_key = previous.next_wait_key;
        self
    }

    pub(super) fn allocate_id(&mut self) -> ThreadId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(super) fn next_wait_key(&mut self) -> WaitKey {
        let key = WaitKey(self.next_wait_key);
        self.next_wait_key += 1;
        key
    }

    pub(super) fn thread(&self, id: ThreadId) -> KernelResult<&GuestThread> {
        self.threads.get(&id).ok_or(KernelError::ThreadNotFound(id))
    }

    pub(super) fn thread_mut(&mut self, id: ThreadId) -> KernelResult<&mut GuestThread> {
        self.threads
            .get_mut(&id)
            .ok_or(KernelError::ThreadNotFound(id))
    }

    pub(super) fn current_id(&self) -> KernelResult<ThreadId> {
        self.current
            .filter(|id| self.threads.contains_key(id))
            .ok_or(KernelError::NoCurrentThread)
    }

    /// Map id 0 to the calling thread
    pub(super) fn resolve_id(&self, id: ThreadId) -> KernelResult<ThreadId> {
        if id == 0 {
            self.current_id()
        } else {
            Ok(id)
        }
    }

    pub(super) fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Ready threads in the order they would be picked
    pub(super) fn ready_order(&self) -> Vec<ThreadId> {
        self.ready.values().copied().collect()
    }

    /// Mark `id` Ready and queue it behind threads of equal priority
    pub(super) fn make_ready(&mut self, id: ThreadId) -> KernelResult<()> {
        let arrival = self.next_arrival;
        self.next_arrival += 1;

        let thread = self.threads.get_mut(&id).ok_or(KernelError::ThreadNotFound(id))?;
        thread.status = ThreadStatus::Ready;
        let key = (thread.priority, arrival);
        if let Some(old) = thread.ready_key.replace(key) {
            self.ready.remove(&old);
        }
        self.ready.insert(key, id);
        Ok(())
    }

    /// Take `id` out of the ready queue without changing its status
    pub(super) fn dequeue(&mut self, id: ThreadId) {
        if let Some(thread) = self.threads.get_mut(&id) {
            if let Some(key) = thread.ready_key.take() {
                self.ready.remove(&key);
            }
        }
    }

    /// Change a thread's priority, re-queueing it when Ready
    pub(super) fn set_priority(&mut self, id: ThreadId, priority: i32) -> KernelResult<()> {
        let thread = self.thread_mut(id)?;
        thread.priority = priority;
        if thread.status == ThreadStatus::Ready {
            self.dequeue(id);
            self.make_ready(id)?;
        }
        Ok(())
    }

    /// Move the calling thread from Running to Waiting on `wait`
    pub(super) fn block_current(&mut self, wait: WaitDescriptor) -> KernelResult<ThreadId> {
        let id = self.current_id()?;
        let thread = self.thread_mut(id)?;
        if thread.status != ThreadStatus::Running {
            return Err(thread.invalid(wait.reason));
        }
        log::debug!(
            "Kernel: thread {} '{}' waits ({}, {:?})",
            id,
            thread.name,
            wait.reason,
            wait.wait_type
        );
        thread.status = ThreadStatus::Waiting;
        thread.wait = Some(wait);
        Ok(id)
    }

    /// Undo [`SchedulerState::block_current`] when arming failed
    pub(super) fn unblock_current(&mut self, id: ThreadId) {
        self.discard_wait(id);
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.status = ThreadStatus::Running;
        }
    }

    /// Drop the wait of `id`, leaving any completion event it subscribed to
    pub(super) fn discard_wait(&mut self, id: ThreadId) -> Option<WaitDescriptor> {
        let wait = self.threads.get_mut(&id)?.wait.take()?;
        if let Some(target) = wait.target {
            if let Some(target) = self.threads.get_mut(&target) {
                target.completion.unsubscribe(id, wait.key);
            }
        }
        Some(wait)
    }

    /// Resolve the wait `key` of `id` with `outcome`
    ///
    /// Returns `false` without side effects when the thread is gone or is no
    /// longer blocked on that wait.
    pub(super) fn resolve_wait(
        &mut self,
        id: ThreadId,
        key: WaitKey,
        outcome: KernelResult<()>,
    ) -> bool {
        let Some(thread) = self.threads.get_mut(&id) else {
            log::debug!("Kernel: wake for deleted thread {} ignored", id);
            return false;
        };
        match &thread.wait {
            Some(wait) if wait.key == key => {}
            _ => {
                log::debug!("Kernel: spurious wake of thread {} ignored", id);
                return false;
            }
        }

        self.discard_wait(id);
        let Some(thread) = self.threads.get_mut(&id) else {
            return false;
        };
        thread.wake_result = Some(outcome);
        thread.release_count += 1;
        let suspended = std::mem::take(&mut thread.suspend_pending);

        if suspended {
            thread.status = ThreadStatus::Suspended;
            log::debug!("Kernel: thread {} released into suspension", id);
        } else if self.make_ready(id).is_err() {
            return false;
        } else {
            log::debug!("Kernel: thread {} released", id);
        }
        self.reschedule_pending = true;
        true
    }

    /// Fire the completion event of `id`, releasing its waiters
    pub(super) fn fire_completion(&mut self, id: ThreadId) {
        let waiters = match self.threads.get_mut(&id) {
            Some(thread) => thread.completion.fire(),
            None => return,
        };
        for (waiter, key) in waiters {
            self.resolve_wait(waiter, key, Ok(()));
        }
    }

    /// Pick the thread that should be Running
    ///
    /// A still-Running current thread keeps the CPU unless a Ready thread
    /// has a strictly lower priority value. Returns the chosen thread, or
    /// `None` when nothing is runnable.
    pub(super) fn reschedule(&mut self) -> Option<ThreadId> {
        self.reschedule_pending = false;

        let running = self
            .current
            .and_then(|id| self.threads.get(&id))
            .filter(|thread| thread.status == ThreadStatus::Running)
            .map(|thread| (thread.id, thread.priority));
        let best = self.ready.first_key_value().map(|(&(priority, _), &id)| (id, priority));

        let next = match (running, best) {
            (Some((current, current_priority)), Some((_, best_priority)))
                if best_priority >= current_priority =>
            {
                return Some(current);
            }
            (Some((current, _)), None) => return Some(current),
            (Some((current, _)), Some(_)) => {
                // Preempted: back of its priority group
                let _ = self.make_ready(current);
                self.ready.pop_first()
            }
            (None, _) => self.ready.pop_first(),
        };

        let Some((_, id)) = next else {
            if self.current.take().is_some() {
                log::debug!("Kernel: no runnable thread");
            }
            return None;
        };

        let thread = self.threads.get_mut(&id)?;
        thread.ready_key = None;
        thread.status = ThreadStatus::Running;
        thread.run_count += 1;

        if self.current != Some(id) {
            self.context_switches += 1;
            log::debug!(
                "Kernel: switch {:?} -> {} '{}' (priority {})",
                self.current,
                id,
                thread.name,
                thread.priority
            );
        }
        self.current = Some(id);
        Some(id)
    }

    /// Threads that are neither Stopped nor Killed
    pub(super) fn live_threads(&self) -> usize {
        self.threads
            .values()
            .filter(|thread| !thread.status.is_terminated())
            .count()
    }
}
