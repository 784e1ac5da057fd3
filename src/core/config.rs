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

//! Emulator configuration
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (sections `[cpu]`, `[kernel]`, `[clock]`)
//! 3. `PSPX_*` environment variables (a `.env` file is loaded by the binary)
//!
//! # Example
//!
//! ```
//! use pspx::core::config::{ClockMode, Config};
//!
//! let config: Config = toml::from_str(
//!     r#"
//!     [cpu]
//!     max_unit_instructions = 64
//!
//!     [clock]
//!     mode = "virtual"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.cpu.max_unit_instructions, 64);
//! assert!(config.cpu.squash_likely_delay_slot);
//! assert_eq!(config.clock.mode, ClockMode::Virtual);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cpu: CpuConfig,
    pub kernel: KernelConfig,
    pub clock: ClockConfig,
}

/// Translation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Skip the delay slot of a not-taken likely branch
    pub squash_likely_delay_slot: bool,

    /// Upper bound on guest instructions in one compiled unit
    pub max_unit_instructions: u32,

    /// Log every translated instruction at trace level
    pub trace_translation: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            squash_likely_delay_slot: true,
            max_unit_instructions: 256,
            trace_translation: false,
        }
    }
}

/// Kernel thread manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Byte written over a fresh thread stack
    pub stack_fill_byte: u8,

    /// Alignment of thread stack allocations
    pub stack_alignment: u32,

    /// Base of the user memory partition
    pub user_partition_base: u32,

    /// Size of the user memory partition
    pub user_partition_size: u32,

    /// Return address seated in `ra` of every new thread
    ///
    /// Jumping here from the entry function exits the thread.
    pub thread_return_address: u32,

    /// Priority of the boot thread
    pub main_thread_priority: u32,

    /// Stack size of the boot thread
    pub main_thread_stack_size: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            stack_fill_byte: 0xFF,
            stack_alignment: 0x100,
            user_partition_base: 0x0880_0000,
            user_partition_size: 0x0180_0000,
            thread_return_address: 0x0800_0000,
            main_thread_priority: 0x20,
            main_thread_stack_size: 0x0004_0000,
        }
    }
}

/// Which real-time clock backs timed waits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Timers fire on host threads in wall-clock time
    #[default]
    Host,
    /// Timers fire when guest time reaches them
    Virtual,
}

impl std::str::FromStr for ClockMode {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(ClockMode::Host),
            "virtual" => Ok(ClockMode::Virtual),
            other => Err(EmulatorError::Config(format!("unknown clock mode '{}'", other))),
        }
    }
}

/// Real-time clock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub mode: ClockMode,

    /// Guest CPU frequency used to convert retired instructions to time
    pub guest_hz: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            mode: ClockMode::Host,
            guest_hz: 222_000_000,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse::<u32>().ok(),
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text).map_err(|e| {
                    EmulatorError::Config(format!("{}: {}", path.display(), e))
                })?
            }
            None => Config::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `PSPX_*` overrides read through `lookup`
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn apply<T>(
            lookup: &dyn Fn(&str) -> Option<String>,
            name: &str,
            parse: fn(&str) -> Option<T>,
            slot: &mut T,
        ) {
            if let Some(raw) = lookup(name) {
                match parse(raw.trim()) {
                    Some(value) => *slot = value,
                    None => log::warn!("Config: ignoring {}={:?}", name, raw),
                }
            }
        }

        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;

        apply(lookup, "PSPX_SQUASH_LIKELY", parse_bool, &mut self.cpu.squash_likely_delay_slot);
        apply(lookup, "PSPX_MAX_UNIT_INSTRUCTIONS", parse_u32, &mut self.cpu.max_unit_instructions);
        apply(lookup, "PSPX_TRACE_TRANSLATION", parse_bool, &mut self.cpu.trace_translation);
        apply(lookup, "PSPX_MAIN_THREAD_PRIORITY", parse_u32, &mut self.kernel.main_thread_priority);
        apply(lookup, "PSPX_MAIN_STACK_SIZE", parse_u32, &mut self.kernel.main_thread_stack_size);
        apply(lookup, "PSPX_CLOCK_MODE", |s| s.parse().ok(), &mut self.clock.mode);
        apply(lookup, "PSPX_GUEST_HZ", |s| s.parse::<u64>().ok(), &mut self.clock.guest_hz);
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cpu.max_unit_instructions == 0 {
            return Err(EmulatorError::Config(
                "cpu.max_unit_instructions must be at least 1".into(),
            ));
        }
        if !self.kernel.stack_alignment.is_power_of_two() {
            return Err(EmulatorError::Config(format!(
                "kernel.stack_alignment {:#x} is not a power of two",
                self.kernel.stack_alignment
            )));
        }
        if !(1..=126).contains(&self.kernel.main_thread_priority) {
            return Err(EmulatorError::Config(format!(
                "kernel.main_thread_priority {} outside 1..=126",
                self.kernel.main_thread_priority
            )));
        }
        if self.clock.guest_hz == 0 {
            return Err(EmulatorError::Config("clock.guest_hz must be non-zero".into()));
        }
        Ok(())
    }
}
