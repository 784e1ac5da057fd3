// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Partition allocator tests

use super::*;
use crate::core::error::KernelError;

const BASE: u32 = 0x08800000;
const SIZE: u32 = 0x01800000;

#[test]
fn test_high_anchor_allocates_from_top() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let a = part.allocate(0x4000, Anchor::High, 0x100).unwrap();
    let b = part.allocate(0x4000, Anchor::High, 0x100).unwrap();

    assert_eq!(a.high(), BASE + SIZE);
    assert_eq!(a.low, BASE + SIZE - 0x4000);
    assert_eq!(b.high(), a.low);
    assert_eq!(part.allocation_count(), 2);
}

#[test]
fn test_low_anchor_allocates_from_bottom() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let a = part.allocate(0x100, Anchor::Low, 0x10).unwrap();
    let b = part.allocate(0x100, Anchor::Low, 0x10).unwrap();

    assert_eq!(a.low, BASE);
    assert_eq!(b.low, BASE + 0x100);
}

#[test]
fn test_size_rounded_to_alignment() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let region = part.allocate(0x1234, Anchor::High, 0x100).unwrap();

    assert_eq!(region.size, 0x1300);
    assert_eq!(region.low % 0x100, 0);
    assert_eq!(part.free_bytes(), SIZE - 0x1300);
}

#[test]
fn test_fixed_address_allocation() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let region = part.allocate(0x1000, Anchor::Addr(0x08900000), 0x100).unwrap();
    assert_eq!(region.low, 0x08900000);

    // Overlapping request at the same address fails
    assert!(matches!(
        part.allocate(0x1000, Anchor::Addr(0x08900800), 0x100),
        Err(KernelError::AllocationFailure { .. })
    ));
}

#[test]
fn test_free_then_reallocate_reuses_range() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let first = part.allocate(0x40000, Anchor::High, 0x100).unwrap();
    let second = part.allocate(0x4000, Anchor::High, 0x100).unwrap();

    part.free(second.low).unwrap();
    let again = part.allocate(0x4000, Anchor::High, 0x100).unwrap();

    assert_eq!(again, second);
    assert_ne!(again.low, first.low);
}

#[test]
fn test_free_merges_neighbours() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    let a = part.allocate(0x1000, Anchor::Low, 0x100).unwrap();
    let b = part.allocate(0x1000, Anchor::Low, 0x100).unwrap();
    let c = part.allocate(0x1000, Anchor::Low, 0x100).unwrap();

    part.free(a.low).unwrap();
    part.free(c.low).unwrap();
    part.free(b.low).unwrap();

    assert_eq!(part.allocation_count(), 0);
    assert_eq!(part.free_bytes(), SIZE);

    // A request spanning all three fits at the bottom again
    let whole = part.allocate(0x3000, Anchor::Low, 0x100).unwrap();
    assert_eq!(whole.low, BASE);
}

#[test]
fn test_free_unknown_block() {
    let mut part = PartitionAllocator::new(BASE, SIZE);

    assert_eq!(
        part.free(0x08900000),
        Err(KernelError::UnknownBlock(0x08900000))
    );

    let region = part.allocate(0x100, Anchor::Low, 0x100).unwrap();
    part.free(region.low).unwrap();
    // Double free
    assert!(part.free(region.low).is_err());
}

#[test]
fn test_exhaustion() {
    let mut part = PartitionAllocator::new(BASE, 0x10000);

    part.allocate(0x8000, Anchor::High, 0x100).unwrap();
    part.allocate(0x8000, Anchor::High, 0x100).unwrap();

    assert_eq!(
        part.allocate(0x100, Anchor::High, 0x100),
        Err(KernelError::AllocationFailure { size: 0x100 })
    );
}

#[test]
fn test_reset_releases_everything() {
    let mut part = PartitionAllocator::new(BASE, SIZE);
    part.allocate(0x4000, Anchor::High, 0x100).unwrap();
    part.allocate(0x4000, Anchor::Low, 0x100).unwrap();

    part.reset();

    assert_eq!(part.allocation_count(), 0);
    assert_eq!(part.free_bytes(), SIZE);
}
