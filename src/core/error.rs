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

/// Emulator error types
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Result type for kernel calls
pub type KernelResult<T> = std::result::Result<T, KernelError>;

/// Main error type for the emulator
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess { address: u32 },

    #[error("Unaligned memory access: {size}-byte access at 0x{address:08X}")]
    UnalignedAccess { address: u32, size: u8 },

    /// Decode-time failure: the word at `address` cannot be translated.
    ///
    /// Kept apart from [`EmulatorError::Kernel`] so a bad encoding is never
    /// mistaken for a scheduler fault.
    #[error("Undefined instruction 0x{word:08X} at 0x{address:08X}: {reason}")]
    UndefinedInstruction {
        address: u32,
        word: u32,
        reason: &'static str,
    },

    #[error("BREAK {code:#x} hit at 0x{address:08X}")]
    Breakpoint { address: u32, code: u32 },

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("System already booted")]
    AlreadyBooted,

    #[error("Out of memory: cannot reserve {size:#x} bytes")]
    OutOfMemory { size: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Loader error: {0}")]
    LoaderError(String),
}

/// Kernel-call error types
///
/// These never abort the host. The syscall table maps them to the negative
/// status codes guest code expects via [`KernelError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Thread {0} not found")]
    ThreadNotFound(u32),

    #[error("Thread {id} is {status}, cannot {operation}")]
    InvalidThreadState {
        id: u32,
        status: &'static str,
        operation: &'static str,
    },

    #[error("Partition allocation of {size:#x} bytes failed")]
    AllocationFailure { size: u32 },

    #[error("No partition block at 0x{0:08X}")]
    UnknownBlock(u32),

    #[error("Illegal priority {0}")]
    IllegalPriority(i32),

    #[error("Illegal thread attribute {0:#010x}")]
    IllegalAttribute(u32),

    #[error("Illegal guest address 0x{0:08X}")]
    IllegalAddress(u32),

    #[error("Wait timed out")]
    WaitTimeout,

    #[error("No current thread")]
    NoCurrentThread,

    #[error("Kernel call not implemented: {0}")]
    Unimplemented(&'static str),
}

impl KernelError {
    /// Guest-visible status code for this error
    ///
    /// Values follow the console's `SCE_KERNEL_ERROR_*` numbering; the
    /// 32-bit pattern is returned reinterpreted as a negative `i32`.
    pub fn code(&self) -> i32 {
        let raw: u32 = match self {
            KernelError::ThreadNotFound(_) => 0x8002_0198,
            KernelError::InvalidThreadState { .. } => 0x8002_01A4,
            KernelError::AllocationFailure { .. } => 0x8002_0190,
            KernelError::UnknownBlock(_) => 0x8002_00D3,
            KernelError::IllegalPriority(_) => 0x8002_0193,
            KernelError::IllegalAttribute(_) => 0x8002_0191,
            KernelError::IllegalAddress(_) => 0x8002_00D3,
            KernelError::WaitTimeout => 0x8002_01A8,
            KernelError::NoCurrentThread => 0x8002_0001,
            KernelError::Unimplemented(_) => 0x8002_0001,
        };
        raw as i32
    }
}
