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

//! Real-time clocks for kernel timers
//!
//! The kernel arms one-shot timers (DelayThread, WaitThreadEnd timeouts)
//! through the [`RealTimeClock`] trait. Two clocks are provided:
//!
//! - [`VirtualClock`]: a deterministic timer queue driven by guest time. The
//!   dispatch loop feeds it retired instruction counts through
//!   [`RealTimeClock::sync`] and jumps it forward with
//!   [`RealTimeClock::advance_to_next`] when every thread is waiting.
//! - [`HostClock`]: wall-clock timers, one host thread per armed timer.
//!
//! Timer callbacks always run with the clock's own lock released, so a
//! callback may take the scheduler lock or arm another timer. Callers must
//! not hold the scheduler lock while calling `sync` or `advance_to_next`.
//!
//! # Example
//!
//! ```
//! use pspx::core::timing::{RealTimeClock, VirtualClock};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = VirtualClock::new(1_000_000);
//! let fired = Arc::new(AtomicBool::new(false));
//!
//! let flag = Arc::clone(&fired);
//! clock
//!     .register_timer_once(Duration::from_micros(1000), Box::new(move || {
//!         flag.store(true, Ordering::SeqCst);
//!     }))
//!     .unwrap();
//!
//! // 1000 µs at 1 MHz is 1000 ticks
//! clock.sync(999);
//! assert!(!fired.load(Ordering::SeqCst));
//! clock.sync(1);
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::config::{ClockConfig, ClockMode};
use crate::core::error::Result;

/// Global tick counter type (absolute guest time in cycles since reset)
pub type GlobalTicks = u64;

/// Timer handle (identifier for armed timers)
pub type TimerHandle = u64;

/// Work run once when a timer expires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer service used by the kernel
pub trait RealTimeClock: Send + Sync {
    /// Arm a timer that runs `callback` once after `delay`
    fn register_timer_once(&self, delay: Duration, callback: TimerCallback) -> Result<()>;

    /// Account `ticks` of elapsed guest time and fire every expired timer
    ///
    /// Returns the number of timers fired.
    fn sync(&self, ticks: GlobalTicks) -> usize;

    /// Timers armed but not yet fired
    fn pending_timers(&self) -> usize;

    /// Skip ahead to the earliest armed timer and fire it
    ///
    /// Returns `false` when the clock cannot advance on its own.
    fn advance_to_next(&self) -> bool;

    /// Elapsed time since the clock was created
    fn now(&self) -> Duration;

    /// Disarm every timer without running its callback
    fn reset(&self);
}

/// Build the clock selected by the configuration
pub fn clock_from_config(config: &ClockConfig) -> Arc<dyn RealTimeClock> {
    match config.mode {
        ClockMode::Host => Arc::new(HostClock::new()),
        ClockMode::Virtual => Arc::new(VirtualClock::new(config.guest_hz)),
    }
}

/// Armed timer in the virtual queue
pub struct TimingEvent {
    /// Timer ID (handle)
    pub id: TimerHandle,

    /// Execution time (global ticks)
    pub next_run_time: GlobalTicks,

    callback: TimerCallback,
}

impl fmt::Debug for TimingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingEvent")
            .field("id", &self.id)
            .field("next_run_time", &self.next_run_time)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    /// Global tick counter (absolute time since reset)
    global_tick_counter: GlobalTicks,

    next_id: TimerHandle,

    /// Armed timers sorted by (next_run_time, id)
    events: Vec<TimingEvent>,
}

impl VirtualState {
    /// Remove every event whose time has come, earliest first
    fn take_due(&mut self) -> Vec<TimingEvent> {
        let now = self.global_tick_counter;
        let due = self.events.partition_point(|e| e.next_run_time <= now);
        self.events.drain(..due).collect()
    }
}

/// Deterministic timer queue driven by guest time
///
/// Durations are converted to ticks at `guest_hz`. Timers that expire at the
/// same tick fire in arming order.
#[derive(Debug)]
pub struct VirtualClock {
    guest_hz: u64,
    state: Mutex<VirtualState>,
}

impl VirtualClock {
    pub fn new(guest_hz: u64) -> Self {
        Self {
            guest_hz: guest_hz.max(1),
            state: Mutex::new(VirtualState::default()),
        }
    }

    /// Guest ticks spanned by `duration`
    pub fn ticks_for(&self, duration: Duration) -> GlobalTicks {
        let ticks = duration.as_nanos() * u128::from(self.guest_hz) / 1_000_000_000;
        ticks.min(u128::from(GlobalTicks::MAX)) as GlobalTicks
    }

    /// Current global tick counter
    pub fn ticks(&self) -> GlobalTicks {
        self.state.lock().global_tick_counter
    }

    fn fire(events: Vec<TimingEvent>) -> usize {
        let count = events.len();
        for event in events {
            log::trace!(
                "Timing: timer {} fired at tick {}",
                event.id,
                event.next_run_time
            );
            (event.callback)();
        }
        count
    }
}

impl RealTimeClock for VirtualClock {
    fn register_timer_once(&self, delay: Duration, callback: TimerCallback) -> Result<()> {
        let ticks = self.ticks_for(delay);
        let mut state = self.state.lock();

        let id = state.next_id;
        state.next_id += 1;
        let next_run_time = state.global_tick_counter.saturating_add(ticks);

        // Insert after every event due at or before the same tick
        let at = state
            .events
            .partition_point(|e| e.next_run_time <= next_run_time);
        state.events.insert(
            at,
            TimingEvent {
                id,
                next_run_time,
                callback,
            },
        );

        log::trace!("Timing: timer {} armed for tick {}", id, next_run_time);
        Ok(())
    }

    fn sync(&self, ticks: GlobalTicks) -> usize {
        let due = {
            let mut state = self.state.lock();
            state.global_tick_counter = state.global_tick_counter.saturating_add(ticks);
            state.take_due()
        };
        Self::fire(due)
    }

    fn pending_timers(&self) -> usize {
        self.state.lock().events.len()
    }

    fn advance_to_next(&self) -> bool {
        let due = {
            let mut state = self.state.lock();
            let Some(next) = state.events.first().map(|e| e.next_run_time) else {
                return false;
            };
            state.global_tick_counter = state.global_tick_counter.max(next);
            state.take_due()
        };
        Self::fire(due) > 0
    }

    fn now(&self) -> Duration {
        let ticks = u128::from(self.ticks());
        let nanos = ticks * 1_000_000_000 / u128::from(self.guest_hz);
        Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64)
    }

    /// Drop every armed timer without firing it and rewind to zero
    fn reset(&self) {
        let dropped = std::mem::take(&mut *self.state.lock());
        if !dropped.events.is_empty() {
            log::debug!("Timing: reset dropped {} armed timer(s)", dropped.events.len());
        }
    }
}

/// Wall-clock timers on host threads
///
/// Each armed timer sleeps on its own thread and runs its callback there.
/// A timer armed before the last [`RealTimeClock::reset`] still sleeps out
/// its delay but drops its callback.
#[derive(Debug)]
pub struct HostClock {
    started: Instant,
    pending: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            pending: Arc::new(AtomicUsize::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RealTimeClock for HostClock {
    fn register_timer_once(&self, delay: Duration, callback: TimerCallback) -> Result<()> {
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let armed_in = generation.load(Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("pspx-timer".to_string())
            .spawn({
                let pending = Arc::clone(&pending);
                move || {
                    thread::sleep(delay);
                    if generation.load(Ordering::SeqCst) == armed_in {
                        callback();
                    } else {
                        log::trace!("Timing: host timer from before reset dropped");
                    }
                    // Decrement after the callback so an idle dispatcher never
                    // sees zero pending timers while a wake is in flight
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            });

        if let Err(e) = spawned {
            pending.fetch_sub(1, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    fn sync(&self, _ticks: GlobalTicks) -> usize {
        0
    }

    fn pending_timers(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn advance_to_next(&self) -> bool {
        false
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
