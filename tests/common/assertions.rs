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

//! Custom assertions for system state

use pspx::core::kernel::{ThreadId, ThreadStatus};
use pspx::core::system::{RunOutcome, System};

/// Run to completion and assert every thread exited
#[allow(dead_code)]
pub fn run_to_exit(system: &mut System) {
    let outcome = system.run(None).expect("Run failed");
    assert_eq!(
        outcome,
        RunOutcome::AllThreadsExited,
        "Expected all threads to exit, stats: {:?}",
        system.stats()
    );
}

/// Assert a thread ended with `expected` as its exit status
#[allow(dead_code)]
pub fn assert_exit_status(system: &System, id: ThreadId, expected: i32) {
    let actual = system
        .kernel()
        .get_thread_exit_status(id)
        .unwrap_or_else(|e| panic!("Thread {} has no exit status: {}", id, e));
    assert_eq!(
        actual, expected,
        "Thread {} exit status mismatch: expected {}, got {}",
        id, expected, actual
    );
}

/// Assert a thread's scheduling status
#[allow(dead_code)]
pub fn assert_status(system: &System, id: ThreadId, expected: ThreadStatus) {
    assert_eq!(
        system.kernel().status(id),
        Some(expected),
        "Thread {} status mismatch",
        id
    );
}

/// Assert a guest word in memory
#[allow(dead_code)]
pub fn assert_word(system: &System, address: u32, expected: u32) {
    let actual = system
        .memory()
        .read32(address)
        .unwrap_or_else(|e| panic!("Failed to read 0x{:08X}: {}", address, e));
    assert_eq!(
        actual, expected,
        "Word at 0x{:08X} mismatch: expected 0x{:08X}, got 0x{:08X}",
        address, expected, actual
    );
}

/// Assert the shared event log written by `programs::log_marker`
#[allow(dead_code)]
pub fn assert_log(system: &System, expected: &[u32]) {
    use super::fixtures::DATA;
    use super::programs::{LOG_COUNT, LOG_ENTRIES};

    let count = system.memory().read32(DATA + LOG_COUNT).expect("Failed to read log count");
    let entries: Vec<u32> = (0..count)
        .map(|i| {
            system
                .memory()
                .read32(DATA + LOG_ENTRIES + i * 4)
                .expect("Failed to read log entry")
        })
        .collect();
    assert_eq!(entries, expected, "Event log mismatch");
}
