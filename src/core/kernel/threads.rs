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

//! Thread manager: the kernel thread operations
//!
//! Every operation takes the scheduler lock for its whole duration. Lock
//! order is scheduler, then clock: timers are armed with the scheduler lock
//! held, and timer callbacks run with the clock lock released.
//!
//! Operations never switch threads themselves. Calls that can change who
//! should run report it (see [`KernelReturn`](super::KernelReturn)) and the
//! dispatcher calls [`ThreadManager::reschedule`] at the call boundary.

use std::sync::Arc;
use std::time::Duration;

use super::scheduler::{SchedulerState, Shared};
use super::thread::{
    GuestThread, ThreadAttributes, ThreadInfo, ThreadParams, ThreadStatus, PRIORITY_HIGHEST,
    PRIORITY_LOWEST,
};
use super::wait::{WaitDescriptor, WaitType, WakeHandle};
use super::ThreadId;
use crate::core::config::KernelConfig;
use crate::core::cpu::{reg, RegisterFile};
use crate::core::error::{EmulatorError, KernelError, KernelResult, Result};
use crate::core::memory::{Anchor, GuestMemory, PartitionAllocator, Region};
use crate::core::timing::RealTimeClock;

/// Kernel thread registry and scheduler
///
/// Cheap to share: external wake sources only hold [`WakeHandle`]s, which
/// reach the scheduler through a weak reference.
pub struct ThreadManager {
    shared: Arc<Shared>,
    clock: Arc<dyn RealTimeClock>,
    config: KernelConfig,
}

fn check_priority(priority: i32) -> KernelResult<()> {
    if (PRIORITY_HIGHEST..=PRIORITY_LOWEST).contains(&priority) {
        Ok(())
    } else {
        Err(KernelError::IllegalPriority(priority))
    }
}

impl ThreadManager {
    pub fn new(config: &KernelConfig, clock: Arc<dyn RealTimeClock>) -> Self {
        let partition =
            PartitionAllocator::new(config.user_partition_base, config.user_partition_size);
        Self {
            shared: Arc::new(Shared::new(SchedulerState::new(partition))),
            clock,
            config: config.clone(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn RealTimeClock> {
        &self.clock
    }

    /// Drop every thread, release the whole partition and disarm the clock
    ///
    /// Wait keys keep counting up, so a wake handle that outlived the reset
    /// can never match a wait armed after it.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        let mut partition = state.partition.clone();
        partition.reset();
        let fresh = SchedulerState::new(partition).continuing_keys_from(&state);
        *state = fresh;
        self.clock.reset();
    }

    fn allocate_stack(
        &self,
        state: &mut SchedulerState,
        memory: &mut GuestMemory,
        size: u32,
        attributes: ThreadAttributes,
    ) -> Result<Region> {
        let stack = state
            .partition
            .allocate(size, Anchor::High, self.config.stack_alignment)?;

        if !attributes.contains(ThreadAttributes::NO_FILLSTACK) {
            if let Err(e) = memory.fill(stack.low, self.config.stack_fill_byte, stack.size) {
                let _ = state.partition.free(stack.low);
                return Err(e);
            }
        }
        Ok(stack)
    }

    /// Create and seat the boot thread as the Running thread
    ///
    /// Failure to reserve its stack is fatal.
    pub fn create_main_thread(
        &self,
        memory: &mut GuestMemory,
        entry: u32,
        gp: u32,
    ) -> Result<ThreadId> {
        let priority = i32::try_from(self.config.main_thread_priority)
            .map_err(|_| EmulatorError::Config("main thread priority out of range".into()))?;
        let params = ThreadParams::new(
            "user_main",
            entry,
            priority,
            self.config.main_thread_stack_size,
        );

        let mut state = self.shared.state.lock();
        let stack = self
            .allocate_stack(&mut state, memory, params.stack_size, params.attributes)
            .map_err(|e| match e {
                EmulatorError::Kernel(KernelError::AllocationFailure { size }) => {
                    EmulatorError::OutOfMemory { size }
                }
                other => other,
            })?;

        let id = state.allocate_id();
        let mut thread = GuestThread::new(id, params, gp, stack, RegisterFile::new());
        thread.seat_entry(self.config.thread_return_address);
        thread.status = ThreadStatus::Running;
        thread.run_count = 1;
        state.threads.insert(id, thread);
        state.current = Some(id);

        log::info!(
            "Kernel: main thread {} entry=0x{:08X} stack=0x{:08X}-0x{:08X}",
            id,
            entry,
            stack.low,
            stack.high()
        );
        Ok(id)
    }

    /// CreateThread: new thread in status Stopped
    ///
    /// The stack comes from the high end of the user partition. The new
    /// thread starts from a copy of `caller`'s registers with gp kept.
    pub fn create_thread(
        &self,
        caller: &RegisterFile,
        memory: &mut GuestMemory,
        params: ThreadParams,
    ) -> Result<ThreadId> {
        check_priority(params.priority)?;

        let mut state = self.shared.state.lock();
        let stack =
            self.allocate_stack(&mut state, memory, params.stack_size, params.attributes)?;

        let id = state.allocate_id();
        let gp = caller.reg(reg::GP);
        let mut thread = GuestThread::new(id, params, gp, stack, caller.clone());
        thread.seat_entry(self.config.thread_return_address);

        log::debug!(
            "Kernel: created thread {} '{}' entry=0x{:08X} priority={} stack=0x{:08X}+{:#x}",
            id,
            thread.name,
            thread.entry,
            thread.priority,
            stack.low,
            stack.size
        );
        state.threads.insert(id, thread);
        Ok(id)
    }

    /// StartThread: Stopped -> Ready with `a0 = arg_len`, `a1 = arg_ptr`
    pub fn start_thread(&self, id: ThreadId, arg_len: u32, arg_ptr: u32) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        let thread = state.thread_mut(id)?;
        if thread.status != ThreadStatus::Stopped {
            return Err(thread.invalid("start"));
        }

        thread.seat_entry(self.config.thread_return_address);
        thread.regs.set_reg(reg::A0, arg_len);
        thread.regs.set_reg(reg::A1, arg_ptr);
        thread.wakeup_count = 0;
        thread.wake_result = None;
        thread.exit_status = 0;
        thread.completion.rearm();

        state.make_ready(id)?;
        log::debug!("Kernel: started thread {}", id);
        Ok(())
    }

    /// SleepThread: consume one wakeup credit, blocking when none is left
    ///
    /// Returns whether the caller blocked.
    pub fn sleep_thread(&self, handle_callbacks: bool) -> KernelResult<bool> {
        let mut state = self.shared.state.lock();
        let id = state.current_id()?;
        let thread = state.thread_mut(id)?;
        thread.wakeup_count -= 1;
        if thread.wakeup_count >= 0 {
            return Ok(false);
        }

        let key = state.next_wait_key();
        state.block_current(WaitDescriptor {
            reason: "sleep",
            wait_type: WaitType::None,
            handle_callbacks,
            key,
            target: None,
        })?;
        Ok(true)
    }

    /// WakeupThread: add one wakeup credit, releasing a pending sleep
    pub fn wakeup_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        let id = state.resolve_id(id)?;
        let thread = state.thread_mut(id)?;
        if thread.status.is_terminated() {
            return Err(thread.invalid("wake up"));
        }

        thread.wakeup_count += 1;
        let sleeping = match &thread.wait {
            Some(wait) if wait.wait_type == WaitType::None && thread.wakeup_count >= 0 => {
                Some(wait.key)
            }
            _ => None,
        };
        if let Some(key) = sleeping {
            state.resolve_wait(id, key, Ok(()));
        }
        self.shared.ready.notify_all();
        Ok(())
    }

    /// DelayThread: block the caller until a one-shot timer fires
    pub fn delay_thread(&self, micros: u32, handle_callbacks: bool) -> Result<()> {
        let mut state = self.shared.state.lock();
        let key = state.next_wait_key();
        let id = state.block_current(WaitDescriptor {
            reason: "delay",
            wait_type: WaitType::Timer,
            handle_callbacks,
            key,
            target: None,
        })?;

        let handle = WakeHandle::new(Arc::downgrade(&self.shared), id, key, Ok(()));
        let armed = self.clock.register_timer_once(
            Duration::from_micros(u64::from(micros)),
            Box::new(move || {
                handle.fire();
            }),
        );
        if let Err(e) = armed {
            state.unblock_current(id);
            return Err(e);
        }
        Ok(())
    }

    /// WaitThreadEnd: block until `id` exits or is terminated
    ///
    /// Returns `Ok(false)` without arming anything when the target already
    /// ended. With a timeout, the completion event and a timer race; the
    /// first to fire resolves the wait and the other is a no-op. A timeout
    /// resolves with [`KernelError::WaitTimeout`].
    pub fn wait_thread_end(
        &self,
        id: ThreadId,
        timeout_micros: Option<u32>,
        handle_callbacks: bool,
    ) -> Result<bool> {
        let mut state = self.shared.state.lock();
        let current = state.current_id()?;
        let target = state.thread(id)?;
        if target.status.is_terminated() {
            return Ok(false);
        }
        if id == current {
            return Err(target.invalid("wait for its own end").into());
        }

        let key = state.next_wait_key();
        state.block_current(WaitDescriptor {
            reason: "wait thread end",
            wait_type: WaitType::ThreadEnd,
            handle_callbacks,
            key,
            target: Some(id),
        })?;
        state.thread_mut(id)?.completion.subscribe(current, key);

        if let Some(micros) = timeout_micros {
            let handle = WakeHandle::new(
                Arc::downgrade(&self.shared),
                current,
                key,
                Err(KernelError::WaitTimeout),
            );
            let armed = self.clock.register_timer_once(
                Duration::from_micros(u64::from(micros)),
                Box::new(move || {
                    handle.fire();
                }),
            );
            if let Err(e) = armed {
                state.unblock_current(current);
                return Err(e);
            }
        }
        Ok(true)
    }

    /// ChangeThreadPriority; id 0 is the caller
    pub fn change_thread_priority(&self, id: ThreadId, priority: i32) -> KernelResult<()> {
        check_priority(priority)?;
        let mut state = self.shared.state.lock();
        let id = state.resolve_id(id)?;
        if state.thread(id)?.status == ThreadStatus::Killed {
            return Err(state.thread(id)?.invalid("change priority of"));
        }
        state.set_priority(id, priority)
    }

    fn exit_locked(
        &self,
        state: &mut SchedulerState,
        memory: &mut GuestMemory,
        id: ThreadId,
        status: i32,
    ) -> Result<()> {
        let thread = state.thread_mut(id)?;
        if thread.status != ThreadStatus::Running {
            return Err(thread.invalid("exit").into());
        }

        thread.status = ThreadStatus::Stopped;
        thread.exit_status = status;
        thread.wait = None;
        let clear = thread
            .attributes
            .contains(ThreadAttributes::CLEAR_STACK)
            .then_some(thread.stack);
        log::debug!("Kernel: thread {} exited with {:#x}", id, status);

        state.fire_completion(id);
        if let Some(stack) = clear {
            memory.fill(stack.low, 0, stack.size)?;
        }
        Ok(())
    }

    fn delete_locked(state: &mut SchedulerState, id: ThreadId) -> KernelResult<()> {
        let thread = state.thread(id)?;
        if !thread.status.is_terminated() {
            return Err(thread.invalid("delete"));
        }

        state.dequeue(id);
        if let Some(thread) = state.threads.remove(&id) {
            state.partition.free(thread.stack.low)?;
            log::debug!("Kernel: deleted thread {} '{}'", id, thread.name);
        }
        if state.current == Some(id) {
            state.current = None;
        }
        Ok(())
    }

    fn terminate_locked(state: &mut SchedulerState, id: ThreadId) -> KernelResult<()> {
        let current = state.current;
        let thread = state.thread_mut(id)?;
        if current == Some(id) && thread.status == ThreadStatus::Running {
            return Err(thread.invalid("terminate itself"));
        }
        if thread.status.is_terminated() {
            return Err(thread.invalid("terminate"));
        }

        thread.status = ThreadStatus::Killed;
        thread.suspend_pending = false;
        state.discard_wait(id);
        state.dequeue(id);
        log::debug!("Kernel: thread {} terminated", id);

        state.fire_completion(id);
        Ok(())
    }

    /// ExitThread: the caller stops with `status` and its waiters are released
    pub fn exit_thread(&self, memory: &mut GuestMemory, status: i32) -> Result<()> {
        let mut state = self.shared.state.lock();
        let id = state.current_id()?;
        self.exit_locked(&mut state, memory, id, status)
    }

    /// ExitDeleteThread: exit then delete the caller in one step
    pub fn exit_delete_thread(&self, memory: &mut GuestMemory, status: i32) -> Result<()> {
        let mut state = self.shared.state.lock();
        let id = state.current_id()?;
        self.exit_locked(&mut state, memory, id, status)?;
        Self::delete_locked(&mut state, id)?;
        Ok(())
    }

    /// DeleteThread: remove a Stopped or Killed thread and free its stack
    pub fn delete_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        Self::delete_locked(&mut state, id)
    }

    /// TerminateThread: kill another thread, discarding its wait
    pub fn terminate_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        Self::terminate_locked(&mut state, id)
    }

    /// TerminateDeleteThread: terminate (unless already ended) then delete
    pub fn terminate_delete_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        if !state.thread(id)?.status.is_terminated() {
            Self::terminate_locked(&mut state, id)?;
        }
        Self::delete_locked(&mut state, id)
    }

    /// SuspendThread
    ///
    /// A Ready thread leaves the ready queue. A Waiting thread keeps waiting
    /// and moves to Suspended instead of Ready when its wait resolves.
    pub fn suspend_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        let thread = state.thread_mut(id)?;
        match (thread.status, thread.suspend_pending) {
            (ThreadStatus::Ready, _) => {
                thread.status = ThreadStatus::Suspended;
                state.dequeue(id);
            }
            (ThreadStatus::Waiting, false) => thread.suspend_pending = true,
            _ => return Err(thread.invalid("suspend")),
        }
        log::debug!("Kernel: thread {} suspended", id);
        Ok(())
    }

    /// ResumeThread: undo [`ThreadManager::suspend_thread`]
    pub fn resume_thread(&self, id: ThreadId) -> KernelResult<()> {
        let mut state = self.shared.state.lock();
        let thread = state.thread_mut(id)?;
        match (thread.status, thread.suspend_pending) {
            (ThreadStatus::Suspended, _) => state.make_ready(id)?,
            (ThreadStatus::Waiting, true) => thread.suspend_pending = false,
            _ => return Err(thread.invalid("resume")),
        }
        log::debug!("Kernel: thread {} resumed", id);
        Ok(())
    }

    /// GetThreadId
    pub fn get_thread_id(&self) -> KernelResult<ThreadId> {
        self.shared.state.lock().current_id()
    }

    /// ReferThreadStatus; id 0 is the caller
    pub fn refer_thread_status(&self, id: ThreadId) -> KernelResult<ThreadInfo> {
        let state = self.shared.state.lock();
        let id = state.resolve_id(id)?;
        Ok(state.thread(id)?.info())
    }

    /// GetThreadExitStatus; only defined once the thread ended
    pub fn get_thread_exit_status(&self, id: ThreadId) -> KernelResult<i32> {
        let state = self.shared.state.lock();
        let thread = state.thread(id)?;
        if thread.status.is_terminated() {
            Ok(thread.exit_status)
        } else {
            Err(thread.invalid("read exit status of"))
        }
    }

    /// GetThreadCurrentPriority
    pub fn get_thread_current_priority(&self) -> KernelResult<i32> {
        let state = self.shared.state.lock();
        Ok(state.thread(state.current_id()?)?.priority)
    }

    /// ChangeCurrentThreadAttr: clear then set user-modifiable attribute bits
    pub fn change_current_thread_attr(&self, clear: u32, set: u32) -> KernelResult<()> {
        let allowed = ThreadAttributes::USER_MODIFIABLE.bits();
        let illegal = (clear | set) & !allowed;
        if illegal != 0 {
            return Err(KernelError::IllegalAttribute(illegal));
        }

        let mut state = self.shared.state.lock();
        let id = state.current_id()?;
        let thread = state.thread_mut(id)?;
        thread.attributes = (thread.attributes - ThreadAttributes::from_bits_retain(clear))
            | ThreadAttributes::from_bits_retain(set);
        Ok(())
    }

    /// Pick the thread that should run next
    ///
    /// Switches only when a different thread is selected. Returns `None`
    /// when no thread is runnable.
    pub fn reschedule(&self) -> Option<ThreadId> {
        self.shared.state.lock().reschedule()
    }

    /// Consume the flag set by external wake sources
    pub fn take_reschedule_pending(&self) -> bool {
        std::mem::take(&mut self.shared.state.lock().reschedule_pending)
    }

    /// Block until a thread becomes Ready or `timeout` elapses
    pub fn wait_for_ready(&self, timeout: Duration) -> bool {
        self.shared.wait_for_ready(timeout)
    }

    /// Trigger for the current wait of `id`, resolving it successfully
    pub fn wake_handle(&self, id: ThreadId) -> Option<WakeHandle> {
        let state = self.shared.state.lock();
        let key = state.threads.get(&id)?.wait.as_ref()?.key;
        Some(WakeHandle::new(Arc::downgrade(&self.shared), id, key, Ok(())))
    }

    /// Store the register file of a thread being switched out
    ///
    /// Ended threads keep the context they had.
    pub fn save_context(&self, id: ThreadId, regs: &RegisterFile) {
        let mut state = self.shared.state.lock();
        if let Some(thread) = state.threads.get_mut(&id) {
            if !thread.status.is_terminated() {
                thread.regs = regs.clone();
            }
        }
    }

    /// Register file of a thread being switched in
    ///
    /// A parked wait result is applied to `v0`.
    pub fn load_context(&self, id: ThreadId) -> KernelResult<RegisterFile> {
        let mut state = self.shared.state.lock();
        let thread = state.thread_mut(id)?;
        if let Some(result) = thread.wake_result.take() {
            thread.regs.set_reg(reg::V0, result.map_or_else(|e| e.code() as u32, |()| 0));
        }
        Ok(thread.regs.clone())
    }

    /// Apply a parked wait result of `id` to an already seated register file
    pub fn apply_wake_result(&self, id: ThreadId, regs: &mut RegisterFile) {
        let mut state = self.shared.state.lock();
        if let Some(result) = state.threads.get_mut(&id).and_then(|t| t.wake_result.take()) {
            regs.set_reg(reg::V0, result.map_or_else(|e| e.code() as u32, |()| 0));
        }
    }

    /// Thread owning the CPU
    pub fn current(&self) -> Option<ThreadId> {
        self.shared.state.lock().current
    }

    pub fn status(&self, id: ThreadId) -> Option<ThreadStatus> {
        self.shared.state.lock().threads.get(&id).map(GuestThread::status)
    }

    /// Waits subscribed to the completion event of `id`
    pub fn completion_waiters(&self, id: ThreadId) -> Option<usize> {
        self.shared
            .state
            .lock()
            .threads
            .get(&id)
            .map(|thread| thread.completion.subscriber_count())
    }

    /// Registers stored for `id`
    pub fn registers(&self, id: ThreadId) -> Option<RegisterFile> {
        self.shared
            .state
            .lock()
            .threads
            .get(&id)
            .map(|thread| thread.regs.clone())
    }

    /// Ready threads in pick order
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        self.shared.state.lock().ready_order()
    }

    pub fn thread_count(&self) -> usize {
        self.shared.state.lock().threads.len()
    }

    /// Threads that have not ended
    pub fn live_threads(&self) -> usize {
        self.shared.state.lock().live_threads()
    }

    pub fn context_switches(&self) -> u64 {
        self.shared.state.lock().context_switches
    }

    /// Free bytes left in the user partition
    pub fn free_partition_bytes(&self) -> u32 {
        self.shared.state.lock().partition.free_bytes()
    }
}
