// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Guest memory tests
//!
//! - `basic`: region identification, alignment and segment mirroring
//! - `ranges`: bulk fills, loads and range boundary checks
//! - `partition`: kernel partition allocation and reuse

use super::*;

mod partition;
mod ranges;
