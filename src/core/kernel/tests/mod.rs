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

//! Kernel thread manager tests
//!
//! - `lifecycle`: create, start, exit, delete, terminate and thread info
//! - `scheduling`: ready queue order, preemption, priorities, suspension
//! - `waits`: sleep credit, delays, thread-end waits and their timeouts

mod helpers;
