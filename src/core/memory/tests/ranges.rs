// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Bulk range operation tests

use super::*;

#[test]
fn test_fill_range() {
    let mut mem = GuestMemory::new();

    mem.fill(0x08900000, 0xFF, 0x40).unwrap();

    assert_eq!(mem.read8(0x08900000).unwrap(), 0xFF);
    assert_eq!(mem.read8(0x0890003F).unwrap(), 0xFF);
    assert_eq!(mem.read8(0x08900040).unwrap(), 0x00);
}

#[test]
fn test_fill_zero_length_is_noop() {
    let mut mem = GuestMemory::new();
    assert!(mem.fill(0x00000000, 0xFF, 0).is_ok());
}

#[test]
fn test_fill_crossing_region_end_fails() {
    let mut mem = GuestMemory::new();

    // Last byte lands past the end of RAM
    let result = mem.fill(0x09FFFFF0, 0xAA, 0x20);
    assert!(matches!(
        result,
        Err(EmulatorError::InvalidMemoryAccess { .. })
    ));
    // Nothing was written
    assert_eq!(mem.read8(0x09FFFFF0).unwrap(), 0);
}

#[test]
fn test_load_bytes() {
    let mut mem = GuestMemory::new();

    mem.load(0x08804000, &[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();

    assert_eq!(mem.read32(0x08804000).unwrap(), 0x04030201);
    assert_eq!(mem.read8(0x08804004).unwrap(), 0x05);
}

#[test]
fn test_write_words() {
    let mut mem = GuestMemory::new();

    mem.write_words(0x08804000, &[0x1111_1111, 0x2222_2222, 0x3333_3333])
        .unwrap();

    assert_eq!(mem.read32(0x08804000).unwrap(), 0x1111_1111);
    assert_eq!(mem.read32(0x08804004).unwrap(), 0x2222_2222);
    assert_eq!(mem.read32(0x08804008).unwrap(), 0x3333_3333);
}

#[test]
fn test_scratchpad_range() {
    let mut mem = GuestMemory::new();

    mem.fill(0x00010000, 0x5A, GuestMemory::SCRATCHPAD_SIZE as u32)
        .unwrap();
    assert_eq!(mem.read8(0x00013FFF).unwrap(), 0x5A);
    assert!(mem.fill(0x00013FFF, 0x5A, 2).is_err());
}

#[test]
fn test_read_cstr() {
    let mut mem = GuestMemory::new();
    mem.load(0x08801000, b"user_main\0garbage").unwrap();

    assert_eq!(mem.read_cstr(0x08801000, 32).unwrap(), "user_main");
    assert_eq!(mem.read_cstr(0x08801000, 4).unwrap(), "user");
    assert_eq!(mem.read_cstr(0x08802000, 32).unwrap(), "");
    assert!(mem.read_cstr(0x00000000, 32).is_err());
}
