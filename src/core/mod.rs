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

//! Core emulation components
//!
//! This module contains:
//! - Guest memory and the kernel partition allocator
//! - CPU (Allegrex) decoding and dynamic translation
//! - Real-time clocks for kernel timers
//! - Kernel thread manager
//! - System integration and the dispatch loop

pub mod config;
pub mod cpu;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod system;
pub mod timing;

// Re-export commonly used types
pub use config::Config;
pub use cpu::{MethodCache, RegisterFile};
pub use error::{EmulatorError, KernelError, Result};
pub use kernel::ThreadManager;
pub use memory::GuestMemory;
pub use system::System;
