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

use std::sync::Arc;

use crate::core::config::KernelConfig;
use crate::core::cpu::{reg, RegisterFile};
use crate::core::kernel::{ThreadId, ThreadManager, ThreadParams};
use crate::core::memory::GuestMemory;
use crate::core::timing::{RealTimeClock, VirtualClock};

/// Entry point of the boot thread
pub const MAIN_ENTRY: u32 = 0x0880_4000;

/// Entry point used for spawned threads
pub const THREAD_ENTRY: u32 = 0x0880_8000;

/// gp of the boot thread
pub const MAIN_GP: u32 = 0x0890_0000;

/// Stack size used for spawned threads
pub const STACK_SIZE: u32 = 0x1000;

/// Thread manager on a 1 MHz virtual clock with a Running boot thread
pub struct Kernel {
    pub manager: ThreadManager,
    pub clock: Arc<VirtualClock>,
    pub mem: GuestMemory,
    pub main: ThreadId,
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let clock = Arc::new(VirtualClock::new(1_000_000));
        let shared: Arc<dyn RealTimeClock> = clock.clone();
        let manager = ThreadManager::new(&config, shared);
        let mut mem = GuestMemory::new();
        let main = manager
            .create_main_thread(&mut mem, MAIN_ENTRY, MAIN_GP)
            .unwrap();
        Self {
            manager,
            clock,
            mem,
            main,
        }
    }

    /// Registers of the calling thread
    pub fn caller(&self) -> RegisterFile {
        let mut regs = self
            .manager
            .registers(self.manager.current().unwrap())
            .unwrap();
        regs.set_reg(reg::S0, 0x5A5A_5A5A);
        regs
    }

    /// Create a thread from the current thread
    pub fn spawn(&mut self, name: &str, priority: i32) -> ThreadId {
        let caller = self.caller();
        self.manager
            .create_thread(
                &caller,
                &mut self.mem,
                ThreadParams::new(name, THREAD_ENTRY, priority, STACK_SIZE),
            )
            .unwrap()
    }

    /// Create and start a thread
    pub fn spawn_started(&mut self, name: &str, priority: i32) -> ThreadId {
        let id = self.spawn(name, priority);
        self.manager.start_thread(id, 0, 0).unwrap();
        id
    }

    /// Reschedule and return the running thread
    pub fn switch(&self) -> Option<ThreadId> {
        self.manager.reschedule()
    }
}
