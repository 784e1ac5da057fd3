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

//! Memory region identification and address translation

use super::GuestMemory;

/// Memory region identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    /// Main RAM (32MB)
    Ram,
    /// Scratchpad (16KB)
    Scratchpad,
    /// Video RAM (2MB)
    Vram,
    /// Unmapped region
    Unmapped,
}

impl GuestMemory {
    /// Translate virtual address to physical address
    ///
    /// Masking the upper 3 bits folds the user, uncached and kernel segments
    /// onto the same physical space.
    #[inline(always)]
    pub(super) fn translate_address(&self, vaddr: u32) -> u32 {
        vaddr & 0x1FFF_FFFF
    }

    /// Identify memory region for an address
    ///
    /// # Example
    ///
    /// ```
    /// use pspx::core::memory::{GuestMemory, MemoryRegion};
    ///
    /// let mem = GuestMemory::new();
    /// assert_eq!(mem.identify_region(0x08800000), MemoryRegion::Ram);
    /// assert_eq!(mem.identify_region(0x88800000), MemoryRegion::Ram);
    /// assert_eq!(mem.identify_region(0x00010000), MemoryRegion::Scratchpad);
    /// assert_eq!(mem.identify_region(0x00000000), MemoryRegion::Unmapped);
    /// ```
    pub fn identify_region(&self, vaddr: u32) -> MemoryRegion {
        let paddr = self.translate_address(vaddr);

        if (Self::RAM_START..=Self::RAM_END).contains(&paddr) {
            MemoryRegion::Ram
        } else if (Self::SCRATCHPAD_START..=Self::SCRATCHPAD_END).contains(&paddr) {
            MemoryRegion::Scratchpad
        } else if (Self::VRAM_START..=Self::VRAM_END).contains(&paddr) {
            MemoryRegion::Vram
        } else {
            MemoryRegion::Unmapped
        }
    }
}
