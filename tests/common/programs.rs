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

//! Guest programs assembled with `pspx::core::cpu::asm`

use pspx::core::cpu::{asm, reg};
use pspx::core::system::codes;

use super::fixtures::DATA;

const T3: u8 = 11;
const T4: u8 = 12;
const T5: u8 = 13;
const T6: u8 = 14;

/// Offset of the event log counter inside [`DATA`]
#[allow(dead_code)]
pub const LOG_COUNT: u32 = 0xFC;

/// Offset of the first event log entry inside [`DATA`]
#[allow(dead_code)]
pub const LOG_ENTRIES: u32 = 0x100;

/// Append the value of `value` to the shared event log
///
/// Clobbers t3-t5.
#[allow(dead_code)]
pub fn log_register(value: u8) -> Vec<u32> {
    vec![
        asm::lui(T3, (DATA >> 16) as u16),
        asm::lw(T4, LOG_COUNT as i16, T3),
        asm::sll(T5, T4, 2),
        asm::addu(T5, T5, T3),
        asm::sw(value, LOG_ENTRIES as i16, T5),
        asm::addiu(T4, T4, 1),
        asm::sw(T4, LOG_COUNT as i16, T3),
    ]
}

/// Append `marker` to the shared event log
///
/// Clobbers t3-t6.
#[allow(dead_code)]
pub fn log_marker(marker: u16) -> Vec<u32> {
    let mut code = vec![asm::ori(T6, 0, marker)];
    code.extend(log_register(T6));
    code
}

/// `exit_thread(v0)`
#[allow(dead_code)]
pub fn exit_with_v0() -> Vec<u32> {
    vec![
        asm::or(reg::A0, reg::V0, 0),
        asm::syscall(codes::EXIT_THREAD),
    ]
}

/// Recursive `f(n) = n == 0 ? 0 : f(n - 1) + 1` placed at `base`
///
/// Every level pushes `ra` onto the guest stack.
#[allow(dead_code)]
pub fn recursive_count(base: u32) -> Vec<u32> {
    vec![
        asm::beq(reg::A0, 0, 10),
        asm::nop(),
        asm::addiu(reg::SP, reg::SP, -8),
        asm::sw(reg::RA, 0, reg::SP),
        asm::addiu(reg::A0, reg::A0, -1),
        asm::jal(base),
        asm::nop(),
        asm::lw(reg::RA, 0, reg::SP),
        asm::addiu(reg::SP, reg::SP, 8),
        asm::jr(reg::RA),
        asm::addiu(reg::V0, reg::V0, 1),
        asm::jr(reg::RA),
        asm::addiu(reg::V0, 0, 0),
    ]
}

/// Sum `1..=n` in a loop, leaving the result in v0
#[allow(dead_code)]
pub fn sum_loop(n: u16) -> Vec<u32> {
    const T0: u8 = reg::T0;
    vec![
        asm::ori(T0, 0, n),
        asm::ori(reg::V0, 0, 0),
        asm::addu(reg::V0, reg::V0, T0),
        asm::addiu(T0, T0, -1),
        asm::bgtz(T0, -3),
        asm::nop(),
    ]
}

/// `create_thread(name, entry, priority, 0x1000)` leaving the id in `dest`
#[allow(dead_code)]
pub fn create_thread(name: u32, entry: u32, priority: u16, dest: u8) -> Vec<u32> {
    vec![
        asm::lui(reg::A0, (name >> 16) as u16),
        asm::ori(reg::A0, reg::A0, name as u16),
        asm::lui(reg::A1, (entry >> 16) as u16),
        asm::ori(reg::A1, reg::A1, entry as u16),
        asm::ori(reg::A2, 0, priority),
        asm::ori(reg::A3, 0, 0x1000),
        asm::ori(reg::T0, 0, 0),
        asm::syscall(codes::CREATE_THREAD),
        asm::or(dest, reg::V0, 0),
    ]
}

/// `start_thread(id, arg_len, 0)`
#[allow(dead_code)]
pub fn start_thread(id: u8, arg_len: u8) -> Vec<u32> {
    vec![
        asm::or(reg::A0, id, 0),
        asm::or(reg::A1, arg_len, 0),
        asm::ori(reg::A2, 0, 0),
        asm::syscall(codes::START_THREAD),
    ]
}

/// Pad `program` with NOPs to `words` instructions
///
/// Panics when the program is already longer.
#[allow(dead_code)]
pub fn pad_to(mut program: Vec<u32>, words: usize) -> Vec<u32> {
    assert!(program.len() <= words, "program overflows its slot");
    program.resize(words, asm::nop());
    program
}
