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

//! Run a flat PSP code image
//!
//! The image is copied to the load address and a boot thread is started at
//! the entry point. Emulation runs until every thread exits, the guest
//! halts, or the instruction limit is reached.

use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use pspx::core::config::{ClockMode, Config};
use pspx::core::error::Result;
use pspx::core::system::{RunOutcome, System};

fn parse_address(value: &str) -> std::result::Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", value, e))
}

/// PSP emulation core
#[derive(Parser)]
#[command(name = "pspx")]
#[command(about = "Runs a flat PSP code image", long_about = None)]
struct Args {
    /// Path to the raw code image
    image: PathBuf,

    /// Guest address the image is copied to
    #[arg(short = 'l', long, default_value = "0x08804000", value_parser = parse_address)]
    load_address: u32,

    /// Entry point (defaults to the load address)
    #[arg(short = 'e', long, value_parser = parse_address)]
    entry: Option<u32>,

    /// Initial gp of the boot thread
    #[arg(long, default_value = "0", value_parser = parse_address)]
    gp: u32,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Stop after this many guest instructions
    #[arg(short = 'n', long)]
    instructions: Option<u64>,

    /// Clock backing kernel timers (overrides the configuration)
    #[arg(long, value_enum)]
    clock: Option<ClockMode>,
}

fn main() -> Result<()> {
    // Load .env file if present; PSPX_* variables override the config file
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize logger with default level INFO
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("pspx v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(mode) = args.clock {
        config.clock.mode = mode;
    }
    info!("Clock: {:?}", config.clock.mode);

    let image = std::fs::read(&args.image)?;
    info!(
        "Loading {} ({} bytes) at 0x{:08X}",
        args.image.display(),
        image.len(),
        args.load_address
    );

    let mut system = System::new(config);
    system.load_image(args.load_address, &image)?;

    let entry = args.entry.unwrap_or(args.load_address);
    system.boot(entry, args.gp)?;

    info!("Starting emulation at 0x{:08X}...", entry);
    let outcome = match system.run(args.instructions) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Error at PC=0x{:08X}: {}", system.registers().pc(), e);
            error!("{}", system.registers());
            return Err(e);
        }
    };

    match outcome {
        RunOutcome::AllThreadsExited => info!("All threads exited"),
        RunOutcome::Halted => info!("Guest halted"),
        RunOutcome::InstructionLimit => info!("Instruction limit reached"),
        RunOutcome::Breakpoint { code, address } => {
            warn!("BREAK {:#x} at 0x{:08X}", code, address)
        }
        RunOutcome::Deadlocked => warn!("Every live thread is blocked forever"),
    }

    let stats = system.stats();
    let cache = system.cache().stats();
    info!("Instructions: {}", stats.instructions);
    info!(
        "Units run: {} | linked: {} | translations: {}",
        stats.units_run, stats.linked_dispatches, cache.translations
    );
    info!(
        "Calls: {} | max depth: {} | syscalls: {}",
        stats.calls, stats.max_call_depth, stats.syscalls
    );
    info!("Context switches: {}", system.kernel().context_switches());

    Ok(())
}
