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

//! Allegrex CPU: register state and dynamic translation
//!
//! Guest code is translated into [`CompiledUnit`]s, each covering a run of
//! instructions starting at one address. A unit never calls into another unit;
//! it returns an [`Exit`] and the dispatch loop in `core::system` looks up the
//! next unit through the [`MethodCache`]. Deep guest call chains therefore
//! never grow the host stack.

use std::fmt;

// Module declarations
pub mod asm;
mod decode;
mod disassembler;
mod method_cache;
#[cfg(test)]
mod tests;
mod translate;
mod unit;

// Re-exports
pub use decode::{decode, AluOp, Condition, ImmOp, Instruction, ShiftOp, Width};
pub use disassembler::Disassembler;
pub use method_cache::{CacheStats, MethodCache};
pub use translate::Translator;
pub use unit::{CompiledUnit, Exit, Target, UnitExit};

/// Register numbers with a fixed role in the PSP calling convention
pub mod reg {
    pub const ZERO: u8 = 0;
    pub const V0: u8 = 2;
    pub const V1: u8 = 3;
    pub const A0: u8 = 4;
    pub const A1: u8 = 5;
    pub const A2: u8 = 6;
    pub const A3: u8 = 7;
    pub const T0: u8 = 8;
    pub const S0: u8 = 16;
    pub const K0: u8 = 26;
    pub const GP: u8 = 28;
    pub const SP: u8 = 29;
    pub const FP: u8 = 30;
    /// Link register
    pub const RA: u8 = 31;
}

/// Per-thread register file
///
/// # Example
/// ```
/// use pspx::core::cpu::RegisterFile;
///
/// let mut regs = RegisterFile::new();
/// regs.set_reg(1, 0x12345678);
/// assert_eq!(regs.reg(1), 0x12345678);
///
/// // Writes to r0 are ignored
/// regs.set_reg(0, 0xDEADBEEF);
/// assert_eq!(regs.reg(0), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    /// General purpose registers (r0-r31)
    ///
    /// r0 is hardwired to always return 0
    regs: [u32; 32],

    /// Program counter
    pc: u32,

    /// HI register (multiplication result upper 32 bits)
    hi: u32,

    /// LO register (multiplication result lower 32 bits)
    lo: u32,
}

impl RegisterFile {
    /// Create a zeroed register file
    pub fn new() -> Self {
        Self {
            regs: [0u32; 32],
            pc: 0,
            hi: 0,
            lo: 0,
        }
    }

    /// Register value. r0 always returns 0.
    #[inline(always)]
    pub fn reg(&self, index: u8) -> u32 {
        if index == 0 {
            0
        } else {
            self.regs[(index & 0x1F) as usize]
        }
    }

    /// Write to general purpose register
    ///
    /// Writes to r0 are ignored.
    #[inline(always)]
    pub fn set_reg(&mut self, index: u8, value: u32) {
        if index != 0 {
            self.regs[(index & 0x1F) as usize] = value;
        }
    }

    #[inline(always)]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    #[inline(always)]
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    #[inline(always)]
    pub fn hi(&self) -> u32 {
        self.hi
    }

    #[inline(always)]
    pub fn lo(&self) -> u32 {
        self.lo
    }

    #[inline(always)]
    pub fn set_hi(&mut self, value: u32) {
        self.hi = value;
    }

    #[inline(always)]
    pub fn set_lo(&mut self, value: u32) {
        self.lo = value;
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PC: 0x{:08X}  HI: 0x{:08X}  LO: 0x{:08X}", self.pc, self.hi, self.lo)?;

        // General-purpose registers in rows of 4
        for i in 0..32u8 {
            write!(f, "r{:2}: 0x{:08X}  ", i, self.reg(i))?;
            if i % 4 == 3 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
