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

//! System module tests
//!
//! - `boot`: initialization, image loading and boot thread setup
//! - `dispatch`: the trampoline, direct links and exits
//! - `syscalls`: kernel calls issued by guest code

use super::*;
use crate::core::config::ClockMode;

mod dispatch;

/// Entry point of the boot thread
const ENTRY: u32 = 0x0880_4000;

/// Guest data area used by the test programs
const DATA: u32 = 0x0881_0000;

/// System on a 1 MHz virtual clock: one guest instruction per microsecond
fn virtual_system() -> System {
    let mut config = Config::default();
    config.clock.mode = ClockMode::Virtual;
    config.clock.guest_hz = 1_000_000;
    System::new(config)
}

/// Load `program` at [`ENTRY`] and boot it
fn booted(program: &[u32]) -> (System, ThreadId) {
    let mut system = virtual_system();
    system.load_words(ENTRY, program).unwrap();
    let main = system.boot(ENTRY, 0).unwrap();
    (system, main)
}
