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

//! Test fixtures for common test scenarios

use pspx::core::config::{ClockMode, Config};
use pspx::core::kernel::ThreadId;
use pspx::core::system::System;

/// Entry point used by every fixture program
#[allow(dead_code)]
pub const ENTRY: u32 = 0x0880_4000;

/// Scratch data area the fixture programs read and write
#[allow(dead_code)]
pub const DATA: u32 = 0x0881_0000;

/// Configuration on a 1 MHz virtual clock
#[allow(dead_code)]
pub fn virtual_config() -> Config {
    let mut config = Config::default();
    config.clock.mode = ClockMode::Virtual;
    config.clock.guest_hz = 1_000_000;
    config
}

/// System on a 1 MHz virtual clock: one guest instruction per microsecond
#[allow(dead_code)]
pub fn virtual_system() -> System {
    System::new(virtual_config())
}

/// Load `program` at [`ENTRY`] and boot it on a virtual clock
#[allow(dead_code)]
pub fn boot_program(program: &[u32]) -> (System, ThreadId) {
    boot_with(virtual_system(), program, &[])
}

/// Load `program` at [`ENTRY`] and `data` at [`DATA`] into `system`, then boot
#[allow(dead_code)]
pub fn boot_with(mut system: System, program: &[u32], data: &[u8]) -> (System, ThreadId) {
    system
        .load_words(ENTRY, program)
        .expect("Failed to load program");
    system.load_image(DATA, data).expect("Failed to load data");
    let main = system.boot(ENTRY, 0).expect("Failed to boot");
    (system, main)
}
