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

//! Guest memory for the PSP emulator core
//!
//! `GuestMemory` is the flat memory the translator fetches from and the
//! translated code loads from and stores to. It performs segment mirroring,
//! alignment checks and routing to the backing regions.
//!
//! # Memory Map
//!
//! | Physical Address Range | Region       | Size   | Access |
//! |------------------------|--------------|--------|--------|
//! | 0x00010000-0x00013FFF  | Scratchpad   | 16KB   | R/W    |
//! | 0x04000000-0x041FFFFF  | VRAM         | 2MB    | R/W    |
//! | 0x08000000-0x09FFFFFF  | Main RAM     | 32MB   | R/W    |
//!
//! # Address Translation
//!
//! The upper 3 bits select the segment (user, uncached mirror at 0x40000000,
//! kernel at 0x80000000); masking them off yields the physical address.
//!
//! # Example
//!
//! ```
//! use pspx::core::memory::GuestMemory;
//!
//! let mut mem = GuestMemory::new();
//!
//! mem.write32(0x08800000, 0x12345678).unwrap();
//!
//! // Kernel and uncached segments mirror the same RAM
//! assert_eq!(mem.read32(0x88800000).unwrap(), 0x12345678);
//! assert_eq!(mem.read32(0x48800000).unwrap(), 0x12345678);
//! ```

mod partition;
mod region;
#[cfg(test)]
mod tests;

pub use partition::{Anchor, PartitionAllocator, Region};
pub use region::MemoryRegion;

use crate::core::error::{EmulatorError, Result};

/// Guest memory backing all translated code and kernel data
pub struct GuestMemory {
    /// Main RAM (32MB)
    ///
    /// Physical address: 0x08000000-0x09FFFFFF. The kernel occupies the low
    /// 8MB; the user partition starts at 0x08800000.
    ram: Vec<u8>,

    /// Scratchpad (16KB)
    scratchpad: Vec<u8>,

    /// VRAM (2MB)
    ///
    /// Plain storage here; the raster pipeline that consumes it is external.
    vram: Vec<u8>,
}

impl GuestMemory {
    /// Main RAM size (32MB)
    pub const RAM_SIZE: usize = 32 * 1024 * 1024;

    /// Scratchpad size (16KB)
    pub const SCRATCHPAD_SIZE: usize = 16 * 1024;

    /// VRAM size (2MB)
    pub const VRAM_SIZE: usize = 2 * 1024 * 1024;

    pub const RAM_START: u32 = 0x0800_0000;
    pub const RAM_END: u32 = 0x09FF_FFFF;

    pub const SCRATCHPAD_START: u32 = 0x0001_0000;
    pub const SCRATCHPAD_END: u32 = 0x0001_3FFF;

    pub const VRAM_START: u32 = 0x0400_0000;
    pub const VRAM_END: u32 = 0x041F_FFFF;

    /// Start of the user memory partition
    pub const USER_PARTITION_START: u32 = 0x0880_0000;

    /// Create zero-filled guest memory
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; Self::RAM_SIZE],
            scratchpad: vec![0u8; Self::SCRATCHPAD_SIZE],
            vram: vec![0u8; Self::VRAM_SIZE],
        }
    }

    /// Clear every region back to zero
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.scratchpad.fill(0);
        self.vram.fill(0);
    }

    /// Resolve a virtual address to its backing slice and offset
    fn backing(&self, vaddr: u32) -> Result<(&[u8], usize)> {
        let paddr = self.translate_address(vaddr);
        match self.identify_region(vaddr) {
            MemoryRegion::Ram => Ok((&self.ram, (paddr - Self::RAM_START) as usize)),
            MemoryRegion::Scratchpad => Ok((
                &self.scratchpad,
                (paddr - Self::SCRATCHPAD_START) as usize,
            )),
            MemoryRegion::Vram => Ok((&self.vram, (paddr - Self::VRAM_START) as usize)),
            MemoryRegion::Unmapped => Err(EmulatorError::InvalidMemoryAccess { address: vaddr }),
        }
    }

    fn backing_mut(&mut self, vaddr: u32) -> Result<(&mut [u8], usize)> {
        let paddr = self.translate_address(vaddr);
        match self.identify_region(vaddr) {
            MemoryRegion::Ram => Ok((&mut self.ram, (paddr - Self::RAM_START) as usize)),
            MemoryRegion::Scratchpad => Ok((
                &mut self.scratchpad,
                (paddr - Self::SCRATCHPAD_START) as usize,
            )),
            MemoryRegion::Vram => Ok((&mut self.vram, (paddr - Self::VRAM_START) as usize)),
            MemoryRegion::Unmapped => Err(EmulatorError::InvalidMemoryAccess { address: vaddr }),
        }
    }

    /// Read 8-bit value from memory
    ///
    /// # Example
    ///
    /// ```
    /// use pspx::core::memory::GuestMemory;
    ///
    /// let mut mem = GuestMemory::new();
    /// mem.write8(0x08800000, 0x42).unwrap();
    /// assert_eq!(mem.read8(0x08800000).unwrap(), 0x42);
    /// ```
    pub fn read8(&self, vaddr: u32) -> Result<u8> {
        let (data, offset) = self.backing(vaddr)?;
        Ok(data[offset])
    }

    /// Read 16-bit little-endian value (must be 2-byte aligned)
    pub fn read16(&self, vaddr: u32) -> Result<u16> {
        if vaddr & 0x1 != 0 {
            return Err(EmulatorError::UnalignedAccess {
                address: vaddr,
                size: 2,
            });
        }
        let (data, offset) = self.backing(vaddr)?;
        Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
    }

    /// Read 32-bit little-endian value (must be 4-byte aligned)
    ///
    /// # Example
    ///
    /// ```
    /// use pspx::core::memory::GuestMemory;
    ///
    /// let mem = GuestMemory::new();
    /// assert!(mem.read32(0x08800001).is_err());
    /// assert!(mem.read32(0x00000000).is_err()); // unmapped
    /// ```
    pub fn read32(&self, vaddr: u32) -> Result<u32> {
        if vaddr & 0x3 != 0 {
            return Err(EmulatorError::UnalignedAccess {
                address: vaddr,
                size: 4,
            });
        }
        let (data, offset) = self.backing(vaddr)?;
        Ok(u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]))
    }

    /// Write 8-bit value to memory
    pub fn write8(&mut self, vaddr: u32, value: u8) -> Result<()> {
        let (data, offset) = self.backing_mut(vaddr)?;
        data[offset] = value;
        Ok(())
    }

    /// Write 16-bit little-endian value (must be 2-byte aligned)
    pub fn write16(&mut self, vaddr: u32, value: u16) -> Result<()> {
        if vaddr & 0x1 != 0 {
            return Err(EmulatorError::UnalignedAccess {
                address: vaddr,
                size: 2,
            });
        }
        let (data, offset) = self.backing_mut(vaddr)?;
        data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write 32-bit little-endian value (must be 4-byte aligned)
    pub fn write32(&mut self, vaddr: u32, value: u32) -> Result<()> {
        if vaddr & 0x3 != 0 {
            return Err(EmulatorError::UnalignedAccess {
                address: vaddr,
                size: 4,
            });
        }
        let (data, offset) = self.backing_mut(vaddr)?;
        data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Fill `len` bytes starting at `vaddr` with `value`
    ///
    /// The whole range must lie inside one region.
    ///
    /// # Example
    ///
    /// ```
    /// use pspx::core::memory::GuestMemory;
    ///
    /// let mut mem = GuestMemory::new();
    /// mem.fill(0x08900000, 0xFF, 0x100).unwrap();
    /// assert_eq!(mem.read32(0x089000FC).unwrap(), 0xFFFFFFFF);
    /// ```
    pub fn fill(&mut self, vaddr: u32, value: u8, len: u32) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let (data, offset) = self.checked_range_mut(vaddr, len)?;
        data[offset..offset + len as usize].fill(value);
        Ok(())
    }

    /// Copy raw bytes into memory starting at `vaddr`
    pub fn load(&mut self, vaddr: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let len = u32::try_from(bytes.len()).map_err(|_| EmulatorError::OutOfMemory {
            size: u32::MAX,
        })?;
        let (data, offset) = self.checked_range_mut(vaddr, len)?;
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Write a sequence of instruction words starting at `vaddr`
    pub fn write_words(&mut self, vaddr: u32, words: &[u32]) -> Result<()> {
        for (i, &word) in words.iter().enumerate() {
            self.write32(vaddr.wrapping_add(i as u32 * 4), word)?;
        }
        Ok(())
    }

    /// Read a NUL-terminated string of at most `max_len` bytes
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_cstr(&self, vaddr: u32, max_len: u32) -> Result<String> {
        let mut bytes = Vec::new();
        for i in 0..max_len {
            match self.read8(vaddr.wrapping_add(i))? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn checked_range_mut(&mut self, vaddr: u32, len: u32) -> Result<(&mut [u8], usize)> {
        let last = vaddr
            .checked_add(len - 1)
            .ok_or(EmulatorError::InvalidMemoryAccess { address: vaddr })?;
        if self.identify_region(vaddr) != self.identify_region(last) {
            return Err(EmulatorError::InvalidMemoryAccess { address: last });
        }
        self.backing_mut(vaddr)
    }
}

impl Default for GuestMemory {
    fn default() -> Self {
        Self::new()
    }
}
