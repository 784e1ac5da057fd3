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

//! System integration module
//!
//! Ties guest memory, the method cache and the kernel thread manager
//! together and runs the dispatch loop.
//!
//! # Dispatch loop
//!
//! The loop is a trampoline: it runs the compiled unit at the seated
//! thread's pc, looks at the [`Exit`] it returns and picks the next unit.
//! Static targets follow the unit's direct links once they are filled;
//! everything else goes through the [`MethodCache`]. Guest calls and returns
//! only move the pc, so call depth never grows the host stack.
//!
//! Kernel calls are the only scheduling points. After a call that yields, or
//! when an external source flagged a reschedule, the seated registers are
//! saved and the thread picked by the scheduler is seated instead. When no
//! thread can run, the loop advances the clock to its next timer or waits
//! for a host timer to make a thread Ready.
//!
//! # Example
//!
//! ```
//! use pspx::core::config::{ClockMode, Config};
//! use pspx::core::cpu::{asm, reg};
//! use pspx::core::system::{RunOutcome, System};
//!
//! let mut config = Config::default();
//! config.clock.mode = ClockMode::Virtual;
//! let mut system = System::new(config);
//!
//! // v0 = 7; return from the entry function
//! system
//!     .load_words(0x08804000, &[asm::addiu(reg::V0, 0, 7), asm::jr(reg::RA), asm::nop()])
//!     .unwrap();
//! let main = system.boot(0x08804000, 0).unwrap();
//!
//! assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
//! assert_eq!(system.kernel().get_thread_exit_status(main), Ok(7));
//! ```

mod syscall;
#[cfg(test)]
mod tests;

pub use syscall::{codes, KernelSyscalls, Syscall, SyscallTable};

use std::sync::Arc;
use std::time::Duration;

use super::config::Config;
use super::cpu::{reg, CompiledUnit, Exit, MethodCache, RegisterFile, Target};
use super::error::{EmulatorError, Result};
use super::kernel::{KernelCall, ThreadId, ThreadManager};
use super::memory::GuestMemory;
use super::timing::{clock_from_config, RealTimeClock};

/// How long an idle loop blocks on host timers before checking again
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Whether [`System::initialize`] already ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    Initialized,
}

/// Why [`System::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every thread exited or was terminated
    AllThreadsExited,
    /// Live threads remain but all wait on something nothing will trigger
    Deadlocked,
    /// Guest code issued the halt syscall
    Halted,
    /// Guest code hit a BREAK instruction; `run` resumes after it
    Breakpoint { code: u32, address: u32 },
    /// The instruction budget ran out; calling `run` again resumes
    InstructionLimit,
}

/// Dispatch loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Guest instructions retired
    pub instructions: u64,
    /// Compiled unit invocations
    pub units_run: u64,
    /// Static exits that followed a filled direct link
    pub linked_dispatches: u64,
    pub calls: u64,
    pub returns: u64,
    /// Guest calls not yet returned from
    pub call_depth: u64,
    pub max_call_depth: u64,
    pub syscalls: u64,
    /// Times the loop found no runnable thread
    pub idle_passes: u64,
}

/// PSP system: memory, translated CPU and kernel
pub struct System {
    config: Config,
    memory: GuestMemory,
    cache: MethodCache,
    kernel: ThreadManager,
    syscalls: Box<dyn SyscallTable>,
    init: InitState,
    /// Thread whose context is loaded into `regs`
    seated: Option<ThreadId>,
    regs: RegisterFile,
    stats: RunStats,
    /// Retired instructions not yet reported to the clock
    unsynced_ticks: u64,
}

impl System {
    /// Create a system with the clock selected by `config.clock`
    pub fn new(config: Config) -> Self {
        let clock = clock_from_config(&config.clock);
        Self::with_clock(config, clock)
    }

    /// Create a system driven by `clock`
    pub fn with_clock(config: Config, clock: Arc<dyn RealTimeClock>) -> Self {
        Self {
            memory: GuestMemory::new(),
            cache: MethodCache::new(&config.cpu),
            kernel: ThreadManager::new(&config.kernel, clock),
            syscalls: Box::new(KernelSyscalls::new()),
            init: InitState::Uninitialized,
            seated: None,
            regs: RegisterFile::new(),
            stats: RunStats::default(),
            unsynced_ticks: 0,
            config,
        }
    }

    /// Replace the syscall table
    pub fn with_syscalls(mut self, table: impl SyscallTable + 'static) -> Self {
        self.syscalls = Box::new(table);
        self
    }

    /// Bring memory, the method cache and the kernel to their reset state
    ///
    /// Runs once; later calls are no-ops until [`System::reset`].
    pub fn initialize(&mut self) {
        if self.init == InitState::Initialized {
            log::debug!("System: already initialized");
            return;
        }

        self.memory.reset();
        self.cache.clear();
        self.kernel.reset();
        self.seated = None;
        self.regs = RegisterFile::new();
        self.stats = RunStats::default();
        self.unsynced_ticks = 0;
        self.init = InitState::Initialized;
        log::debug!("System: initialized");
    }

    /// Drop all guest state, as after a power cycle
    pub fn reset(&mut self) {
        self.init = InitState::Uninitialized;
        self.initialize();
    }

    /// Copy a flat image into guest memory
    ///
    /// Compiled units covering the range are discarded.
    pub fn load_image(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        self.initialize();
        self.memory.load(address, bytes)?;
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        self.cache.invalidate_range(address, len);
        log::info!(
            "System: loaded {} bytes at 0x{:08X}",
            bytes.len(),
            address
        );
        Ok(())
    }

    /// Write instruction words into guest memory
    pub fn load_words(&mut self, address: u32, words: &[u32]) -> Result<()> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.load_image(address, &bytes)
    }

    /// Create the boot thread at `entry` and seat it
    ///
    /// Fails with [`EmulatorError::OutOfMemory`] when its stack cannot be
    /// reserved and with [`EmulatorError::AlreadyBooted`] on a second call.
    pub fn boot(&mut self, entry: u32, gp: u32) -> Result<ThreadId> {
        self.initialize();
        if self.kernel.thread_count() > 0 {
            return Err(EmulatorError::AlreadyBooted);
        }

        let main = self.kernel.create_main_thread(&mut self.memory, entry, gp)?;
        self.regs = self.kernel.load_context(main)?;
        self.seated = Some(main);
        Ok(main)
    }

    /// Run guest code until an outcome other than normal execution
    ///
    /// With `limit`, stops after at least that many more guest instructions.
    pub fn run(&mut self, limit: Option<u64>) -> Result<RunOutcome> {
        let budget = limit.map(|n| self.stats.instructions.saturating_add(n));
        let mut next: Option<Arc<CompiledUnit>> = None;

        loop {
            if budget.is_some_and(|b| self.stats.instructions >= b) {
                self.sync_clock();
                return Ok(RunOutcome::InstructionLimit);
            }

            if self.seated.is_none() {
                next = None;
                match self.idle()? {
                    Some(outcome) => return Ok(outcome),
                    None => continue,
                }
            }

            let pc = self.regs.pc();
            if pc == self.config.kernel.thread_return_address {
                // Returned from the entry function
                let status = self.regs.reg(reg::V0) as i32;
                next = None;
                self.kernel_call(KernelCall::ExitThread { status })?;
                continue;
            }

            let unit = match next.take() {
                Some(unit) => unit,
                None => self.cache.resolve(pc, &self.memory)?,
            };
            let result = unit.run(&mut self.regs, &mut self.memory)?;
            self.stats.units_run += 1;
            self.stats.instructions += u64::from(result.retired);
            self.unsynced_ticks += u64::from(result.retired);

            match result.exit {
                Exit::Branch(target) => next = self.follow(&unit, target)?,
                Exit::Call(target) => {
                    self.stats.calls += 1;
                    self.stats.call_depth += 1;
                    self.stats.max_call_depth = self.stats.max_call_depth.max(self.stats.call_depth);
                    next = self.follow(&unit, target)?;
                }
                Exit::Return(address) => {
                    self.stats.returns += 1;
                    self.stats.call_depth = self.stats.call_depth.saturating_sub(1);
                    self.regs.set_pc(address);
                    self.sync_clock();
                }
                Exit::Syscall { code, resume } => {
                    self.regs.set_pc(resume);
                    if let Some(outcome) = self.syscall(code)? {
                        return Ok(outcome);
                    }
                }
                Exit::Break { code, address } => {
                    self.regs.set_pc(address.wrapping_add(4));
                    self.sync_clock();
                    log::info!("System: BREAK {:#x} at 0x{:08X}", code, address);
                    return Ok(RunOutcome::Breakpoint { code, address });
                }
            }
        }
    }

    /// Seat the target of an exit, returning the unit to run next when it
    /// is already known
    fn follow(
        &mut self,
        unit: &CompiledUnit,
        target: Target,
    ) -> Result<Option<Arc<CompiledUnit>>> {
        let address = unit.target_address(target);
        self.regs.set_pc(address);

        let Target::Static(slot) = target else {
            return Ok(None);
        };
        if address == self.config.kernel.thread_return_address {
            return Ok(None);
        }
        if let Some(linked) = unit.linked(slot) {
            self.stats.linked_dispatches += 1;
            return Ok(Some(linked));
        }

        let resolved = self.cache.resolve(address, &self.memory)?;
        unit.link(slot, &resolved);
        Ok(Some(resolved))
    }

    fn syscall(&mut self, code: u32) -> Result<Option<RunOutcome>> {
        self.stats.syscalls += 1;
        self.sync_clock();

        match self.syscalls.lookup(code, &mut self.regs, &mut self.memory) {
            Ok(Syscall::Kernel(call)) => self.kernel_call(call)?,
            Ok(Syscall::Return(value)) => self.regs.set_reg(reg::V0, value as u32),
            Ok(Syscall::Halt) => {
                log::info!("System: halted by guest at 0x{:08X}", self.regs.pc());
                return Ok(Some(RunOutcome::Halted));
            }
            Err(EmulatorError::Kernel(e)) => {
                log::warn!("System: syscall {:#x} failed: {}", code, e);
                self.regs.set_reg(reg::V0, e.code() as u32);
            }
            Err(e) => return Err(e),
        }
        Ok(None)
    }

    fn kernel_call(&mut self, call: KernelCall) -> Result<()> {
        let ret = self.kernel.execute(call, &self.regs, &mut self.memory)?;
        self.regs.set_reg(reg::V0, ret.value as u32);
        if ret.yield_now || self.kernel.take_reschedule_pending() {
            self.schedule()?;
        }
        Ok(())
    }

    /// Save the seated context and seat whichever thread should run
    fn schedule(&mut self) -> Result<()> {
        if let Some(id) = self.seated {
            self.kernel.save_context(id, &self.regs);
        }

        match self.kernel.reschedule() {
            Some(id) if self.seated == Some(id) => {
                self.kernel.apply_wake_result(id, &mut self.regs);
            }
            Some(id) => {
                self.regs = self.kernel.load_context(id)?;
                self.seated = Some(id);
                log::trace!("System: seated thread {} at 0x{:08X}", id, self.regs.pc());
            }
            None => self.seated = None,
        }
        Ok(())
    }

    /// No thread is seated: find one, advance time, or give up
    fn idle(&mut self) -> Result<Option<RunOutcome>> {
        self.stats.idle_passes += 1;
        self.sync_clock();
        self.schedule()?;
        if self.seated.is_some() {
            return Ok(None);
        }

        if self.kernel.live_threads() == 0 {
            log::info!("System: all threads exited");
            return Ok(Some(RunOutcome::AllThreadsExited));
        }

        let clock = Arc::clone(self.kernel.clock());
        if clock.advance_to_next() {
            log::trace!("System: idle, clock advanced to {:?}", clock.now());
            return Ok(None);
        }
        if clock.pending_timers() > 0 {
            self.kernel.wait_for_ready(IDLE_POLL);
            return Ok(None);
        }

        log::warn!(
            "System: {} live thread(s) waiting with no timer armed",
            self.kernel.live_threads()
        );
        Ok(Some(RunOutcome::Deadlocked))
    }

    /// Report retired instructions to the clock as elapsed ticks
    fn sync_clock(&mut self) {
        let ticks = std::mem::take(&mut self.unsynced_ticks);
        if ticks > 0 {
            self.kernel.clock().sync(ticks);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    /// Mutable guest memory
    ///
    /// Writes over translated code must be followed by
    /// [`System::invalidate`].
    pub fn memory_mut(&mut self) -> &mut GuestMemory {
        &mut self.memory
    }

    /// Discard compiled units covering `[address, address + len)`
    pub fn invalidate(&self, address: u32, len: u32) -> usize {
        self.cache.invalidate_range(address, len)
    }

    pub fn cache(&self) -> &MethodCache {
        &self.cache
    }

    pub fn kernel(&self) -> &ThreadManager {
        &self.kernel
    }

    /// Registers of the seated thread
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Thread whose context is loaded
    pub fn current_thread(&self) -> Option<ThreadId> {
        self.seated
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }
}
