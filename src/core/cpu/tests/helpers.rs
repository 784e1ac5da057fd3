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

//! Shared harness for translation tests

use crate::core::config::CpuConfig;
use crate::core::cpu::{Exit, MethodCache, RegisterFile, UnitExit};
use crate::core::memory::GuestMemory;

/// Address test programs are loaded at
pub const BASE: u32 = 0x0880_4000;

pub struct Harness {
    pub mem: GuestMemory,
    pub regs: RegisterFile,
    pub cache: MethodCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let mut regs = RegisterFile::new();
        regs.set_pc(BASE);
        Self {
            mem: GuestMemory::new(),
            regs,
            cache: MethodCache::new(&config),
        }
    }

    /// Load a program at `BASE`
    pub fn load(&mut self, program: &[u32]) {
        self.load_at(BASE, program);
    }

    pub fn load_at(&mut self, address: u32, program: &[u32]) {
        self.mem.write_words(address, program).unwrap();
    }

    /// Run the unit at the current pc and move pc to where it exits
    pub fn step(&mut self) -> UnitExit {
        let unit = self.cache.resolve(self.regs.pc(), &self.mem).unwrap();
        let result = unit.run(&mut self.regs, &mut self.mem).unwrap();
        let next = match result.exit {
            Exit::Branch(target) | Exit::Call(target) => unit.target_address(target),
            Exit::Return(address) => address,
            Exit::Syscall { resume, .. } => resume,
            Exit::Break { address, .. } => address,
        };
        self.regs.set_pc(next);
        result
    }

    /// Step until a BREAK exit and return its code
    pub fn run_until_break(&mut self, max_units: usize) -> u32 {
        for _ in 0..max_units {
            if let Exit::Break { code, .. } = self.step().exit {
                return code;
            }
        }
        panic!("no BREAK within {} units", max_units);
    }
}
