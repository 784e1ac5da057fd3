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

//! PSP (MIPS Allegrex) emulation core
//!
//! This library translates guest machine code into compiled units run by an
//! explicit dispatch loop, and emulates the console kernel's cooperative
//! thread API on top of it.
//!
//! # Example
//!
//! ```
//! use pspx::core::config::{ClockMode, Config};
//! use pspx::core::cpu::{asm, reg};
//! use pspx::core::system::{codes, RunOutcome, System};
//!
//! let mut config = Config::default();
//! config.clock.mode = ClockMode::Virtual;
//! let mut system = System::new(config);
//!
//! system
//!     .load_words(
//!         0x08804000,
//!         &[asm::ori(reg::A0, 0, 1), asm::syscall(codes::EXIT_THREAD)],
//!     )
//!     .unwrap();
//! system.boot(0x08804000, 0).unwrap();
//!
//! assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
//! ```

pub mod core;
