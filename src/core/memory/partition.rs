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

//! Kernel memory partition allocator
//!
//! A partition is a window of guest address space carved into blocks.
//! Allocations can be anchored at the low end, the high end (thread stacks)
//! or a fixed address. Freed blocks are merged with free neighbours so a
//! later allocation of equal or smaller size lands in the same place.
//!
//! # Example
//!
//! ```
//! use pspx::core::memory::{Anchor, PartitionAllocator};
//!
//! let mut part = PartitionAllocator::new(0x08800000, 0x00100000);
//! let stack = part.allocate(0x4000, Anchor::High, 0x100).unwrap();
//! assert_eq!(stack.high(), 0x08900000);
//!
//! part.free(stack.low).unwrap();
//! let again = part.allocate(0x4000, Anchor::High, 0x100).unwrap();
//! assert_eq!(again, stack);
//! ```

use crate::core::error::{KernelError, KernelResult};

/// Where inside the partition an allocation is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Lowest free address that fits
    Low,
    /// Highest free address that fits
    High,
    /// Exactly at the given address
    Addr(u32),
}

/// A reserved address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First address of the range
    pub low: u32,
    /// Size in bytes
    pub size: u32,
}

impl Region {
    /// One past the last address of the range
    #[inline]
    pub fn high(&self) -> u32 {
        self.low.wrapping_add(self.size)
    }
}

#[derive(Debug, Clone, Copy)]
struct Block {
    start: u32,
    size: u32,
    used: bool,
}

impl Block {
    fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.size)
    }
}

/// Block allocator over one partition of guest memory
#[derive(Debug, Clone)]
pub struct PartitionAllocator {
    base: u32,
    size: u32,
    /// Blocks sorted by start address, covering the partition exactly
    blocks: Vec<Block>,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn align_down(value: u64, alignment: u64) -> u64 {
    value / alignment * alignment
}

impl PartitionAllocator {
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            base,
            size,
            blocks: vec![Block {
                start: base,
                size,
                used: false,
            }],
        }
    }

    /// Release every block
    pub fn reset(&mut self) {
        self.blocks = vec![Block {
            start: self.base,
            size: self.size,
            used: false,
        }];
    }

    /// Reserve `size` bytes at `anchor`, aligned to `alignment`
    ///
    /// The size is rounded up to the alignment. Fails with
    /// [`KernelError::AllocationFailure`] when no free block can hold it.
    pub fn allocate(&mut self, size: u32, anchor: Anchor, alignment: u32) -> KernelResult<Region> {
        let alignment = u64::from(alignment.max(1));
        let wanted = align_up(u64::from(size.max(1)), alignment);
        let failure = KernelError::AllocationFailure { size };

        let placement = match anchor {
            Anchor::Low => self.blocks.iter().enumerate().find_map(|(i, b)| {
                if b.used {
                    return None;
                }
                let start = align_up(u64::from(b.start), alignment);
                (start + wanted <= b.end()).then_some((i, start))
            }),
            Anchor::High => self.blocks.iter().enumerate().rev().find_map(|(i, b)| {
                if b.used || b.end() < wanted {
                    return None;
                }
                let start = align_down(b.end() - wanted, alignment);
                (start >= u64::from(b.start)).then_some((i, start))
            }),
            Anchor::Addr(addr) => self.blocks.iter().enumerate().find_map(|(i, b)| {
                let start = u64::from(addr);
                (!b.used && start >= u64::from(b.start) && start + wanted <= b.end())
                    .then_some((i, start))
            }),
        };

        let (index, start) = placement.ok_or(failure.clone())?;
        let size = u32::try_from(wanted).map_err(|_| failure)?;
        let start = start as u32;
        self.split(index, start, size);

        log::trace!(
            "Partition: allocated {:#x} bytes at 0x{:08X} ({:?})",
            size,
            start,
            anchor
        );

        Ok(Region { low: start, size })
    }

    /// Carve `[start, start + size)` out of free block `index`
    fn split(&mut self, index: usize, start: u32, size: u32) {
        let block = self.blocks[index];
        let mut replacement = Vec::with_capacity(3);
        if start > block.start {
            replacement.push(Block {
                start: block.start,
                size: start - block.start,
                used: false,
            });
        }
        replacement.push(Block {
            start,
            size,
            used: true,
        });
        let tail = block.end() - (u64::from(start) + u64::from(size));
        if tail > 0 {
            replacement.push(Block {
                start: start + size,
                size: tail as u32,
                used: false,
            });
        }
        self.blocks.splice(index..=index, replacement);
    }

    /// Release the block starting at `low`, merging with free neighbours
    pub fn free(&mut self, low: u32) -> KernelResult<()> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.used && b.start == low)
            .ok_or(KernelError::UnknownBlock(low))?;

        self.blocks[index].used = false;

        if index + 1 < self.blocks.len() && !self.blocks[index + 1].used {
            let next = self.blocks.remove(index + 1);
            self.blocks[index].size += next.size;
        }
        if index > 0 && !self.blocks[index - 1].used {
            let current = self.blocks.remove(index);
            self.blocks[index - 1].size += current.size;
        }

        log::trace!("Partition: freed block at 0x{:08X}", low);
        Ok(())
    }

    /// Total bytes currently free
    pub fn free_bytes(&self) -> u32 {
        self.blocks
            .iter()
            .filter(|b| !b.used)
            .map(|b| b.size)
            .sum()
    }

    /// Number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.used).count()
    }
}
