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

//! Address-keyed cache of compiled units
//!
//! # Example
//!
//! ```
//! use pspx::core::config::CpuConfig;
//! use pspx::core::cpu::MethodCache;
//! use pspx::core::memory::GuestMemory;
//! use std::sync::Arc;
//!
//! let mut mem = GuestMemory::new();
//! mem.write_words(0x08804000, &[0x03E00008, 0x00000000]).unwrap(); // jr $ra; nop
//!
//! let cache = MethodCache::new(&CpuConfig::default());
//! let first = cache.resolve(0x08804000, &mem).unwrap();
//! let second = cache.resolve(0x08804000, &mem).unwrap();
//!
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(cache.stats().translations, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::translate::Translator;
use super::unit::CompiledUnit;
use crate::core::config::CpuConfig;
use crate::core::error::Result;
use crate::core::memory::GuestMemory;

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub translations: u64,
    pub invalidations: u64,
    pub entries: usize,
}

/// Memoizing address → compiled unit resolver
///
/// Safe to share between threads. Concurrent resolutions of the same address
/// produce one translation: the vacant map entry stays locked while the unit
/// is built.
pub struct MethodCache {
    units: DashMap<u32, Arc<CompiledUnit>>,
    translator: Translator,
    hits: AtomicU64,
    misses: AtomicU64,
    translations: AtomicU64,
    invalidations: AtomicU64,
}

impl MethodCache {
    pub fn new(config: &CpuConfig) -> Self {
        Self {
            units: DashMap::new(),
            translator: Translator::new(config),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            translations: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Compiled unit for `address`, translating it on first use
    pub fn resolve(&self, address: u32, memory: &GuestMemory) -> Result<Arc<CompiledUnit>> {
        if let Some(unit) = self.units.get(&address) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(unit.value()));
        }

        match self.units.entry(address) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let unit = Arc::new(self.translator.translate(address, memory)?);
                self.translations.fetch_add(1, Ordering::Relaxed);
                entry.insert(Arc::clone(&unit));
                Ok(unit)
            }
        }
    }

    /// Cached unit for `address` without translating
    pub fn get(&self, address: u32) -> Option<Arc<CompiledUnit>> {
        self.units.get(&address).map(|unit| Arc::clone(unit.value()))
    }

    /// Drop every unit that reads guest memory in `[start, start + len)`
    ///
    /// Returns the number of units removed. Removed units are marked stale so
    /// static links into them are no longer followed.
    pub fn invalidate_range(&self, start: u32, len: u32) -> usize {
        let mut removed = 0;
        self.units.retain(|_, unit| {
            if unit.overlaps(start, len) {
                unit.invalidate();
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
            log::debug!(
                "MethodCache: invalidated {} unit(s) in 0x{:08X}+{:#x}",
                removed,
                start,
                len
            );
        }
        removed
    }

    /// Drop every unit
    pub fn clear(&self) {
        self.units.iter().for_each(|unit| unit.invalidate());
        self.units.clear();
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.units.len(),
        }
    }
}
