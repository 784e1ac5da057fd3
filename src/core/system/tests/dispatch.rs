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

use super::*;
use crate::core::cpu::asm;

const T0: u8 = reg::T0;
const T1: u8 = 9;

#[test]
fn test_return_from_entry_exits_thread() {
    let (mut system, main) = booted(&[asm::ori(reg::V0, 0, 0x2A), asm::jr(reg::RA), asm::nop()]);

    assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
    assert_eq!(system.kernel().get_thread_exit_status(main), Ok(0x2A));
    assert_eq!(system.current_thread(), None);

    let stats = system.stats();
    assert_eq!(stats.instructions, 3);
    assert_eq!(stats.returns, 1);
    assert_eq!(stats.calls, 0);
}

#[test]
fn test_counted_loop() {
    let (mut system, main) = booted(&[
        asm::ori(T0, 0, 5),
        asm::addiu(T0, T0, -1), // loop:
        asm::bne(T0, 0, -2),
        asm::addiu(reg::V1, reg::V1, 1),
        asm::jr(reg::RA),
        asm::or(reg::V0, reg::V1, 0),
    ]);

    assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
    // The delay slot runs on every pass, taken or not
    assert_eq!(system.kernel().get_thread_exit_status(main), Ok(5));
    assert!(system.stats().linked_dispatches > 0);
    assert_eq!(system.cache().stats().translations, 2);
}

#[test]
fn test_nested_calls() {
    const F: u32 = ENTRY + 0x100;
    let mut program = vec![
        asm::ori(reg::A0, 0, 3),
        asm::jal(F),
        asm::nop(),
        asm::or(reg::A0, reg::V0, 0),
        asm::syscall(codes::EXIT_THREAD),
    ];
    program.resize(0x40, asm::nop());
    program.extend_from_slice(&recursive_count());
    let (mut system, main) = booted(&program);

    assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
    assert_eq!(system.kernel().get_thread_exit_status(main), Ok(3));

    let stats = system.stats();
    assert_eq!(stats.calls, 4);
    assert_eq!(stats.returns, 4);
    assert_eq!(stats.max_call_depth, 4);
    assert_eq!(stats.call_depth, 0);
    assert!(stats.linked_dispatches >= 2);
}

/// `f(n) = n == 0 ? 0 : f(n - 1) + 1`, keeping `ra` on the stack
fn recursive_count() -> [u32; 13] {
    const F: u32 = ENTRY + 0x100;
    [
        asm::beq(reg::A0, 0, 10),
        asm::nop(),
        asm::addiu(reg::SP, reg::SP, -8),
        asm::sw(reg::RA, 0, reg::SP),
        asm::addiu(reg::A0, reg::A0, -1),
        asm::jal(F),
        asm::nop(),
        asm::lw(reg::RA, 0, reg::SP),
        asm::addiu(reg::SP, reg::SP, 8),
        asm::jr(reg::RA),
        asm::addiu(reg::V0, reg::V0, 1),
        asm::jr(reg::RA), // n == 0
        asm::addiu(reg::V0, 0, 0),
    ]
}

#[test]
fn test_jalr_and_dynamic_target() {
    const F: u32 = ENTRY + 0x80;
    let mut program = vec![
        asm::lui(T1, (F >> 16) as u16),
        asm::ori(T1, T1, F as u16),
        asm::jalr(reg::RA, T1),
        // Overwriting the target in the delay slot does not redirect
        asm::ori(T1, 0, 0),
        asm::or(reg::A0, reg::V0, 0),
        asm::syscall(codes::EXIT_THREAD),
    ];
    program.resize(0x20, asm::nop());
    program.extend_from_slice(&[asm::jr(reg::RA), asm::ori(reg::V0, 0, 9)]);
    let (mut system, main) = booted(&program);

    assert_eq!(system.run(None).unwrap(), RunOutcome::AllThreadsExited);
    assert_eq!(system.kernel().get_thread_exit_status(main), Ok(9));
    assert_eq!(system.stats().calls, 1);
}

#[test]
fn test_instruction_limit_resumes() {
    // Spin forever
    let (mut system, _) = booted(&[asm::j(ENTRY), asm::nop()]);

    assert_eq!(system.run(Some(1000)).unwrap(), RunOutcome::InstructionLimit);
    let first = system.stats().instructions;
    assert!(first >= 1000);
    assert_eq!(system.registers().pc(), ENTRY);

    assert_eq!(system.run(Some(1000)).unwrap(), RunOutcome::InstructionLimit);
    assert!(system.stats().instructions >= first + 1000);
    assert_eq!(system.cache().stats().translations, 1);
}

#[test]
fn test_breakpoint() {
    let (mut system, _) = booted(&[
        asm::ori(reg::V0, 0, 1),
        asm::brk(7),
        asm::ori(reg::V0, 0, 2),
        asm::syscall(codes::HALT),
    ]);

    assert_eq!(
        system.run(None).unwrap(),
        RunOutcome::Breakpoint {
            code: 7,
            address: ENTRY + 4
        }
    );
    assert_eq!(system.registers().reg(reg::V0), 1);

    assert_eq!(system.run(None).unwrap(), RunOutcome::Halted);
    assert_eq!(system.registers().reg(reg::V0), 2);
}

#[test]
fn test_undefined_instruction_surfaces() {
    let (mut system, _) = booted(&[asm::ori(reg::V0, 0, 1), asm::j(ENTRY + 0x40), asm::nop()]);
    system.memory_mut().write32(ENTRY + 0x40, 0x4000_0000).unwrap();

    let err = system.run(None).unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::UndefinedInstruction {
            address,
            word: 0x4000_0000,
            ..
        } if address == ENTRY + 0x40
    ));
}

#[test]
fn test_memory_fault_reports_pc() {
    // lw from an unmapped address
    let (mut system, _) = booted(&[asm::nop(), asm::lw(reg::V0, 0, reg::ZERO)]);

    let err = system.run(None).unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidMemoryAccess { address: 0 }));
    assert_eq!(system.registers().pc(), ENTRY + 4);
}

#[test]
fn test_rewritten_code_retranslated() {
    let (mut system, _) = booted(&[asm::ori(reg::V0, 0, 1), asm::syscall(codes::HALT)]);
    assert_eq!(system.run(None).unwrap(), RunOutcome::Halted);
    assert_eq!(system.registers().reg(reg::V0), 1);

    system.load_words(ENTRY, &[asm::ori(reg::V0, 0, 2)]).unwrap();
    system.registers_mut().set_pc(ENTRY);
    assert_eq!(system.run(None).unwrap(), RunOutcome::Halted);
    assert_eq!(system.registers().reg(reg::V0), 2);
    assert_eq!(system.cache().stats().translations, 2);
}

#[test]
fn test_virtual_time_follows_instructions() {
    let (mut system, _) = booted(&[
        asm::nop(),
        asm::nop(),
        asm::nop(),
        asm::jr(reg::RA),
        asm::nop(),
    ]);

    system.run(None).unwrap();
    assert_eq!(system.kernel().clock().now(), Duration::from_micros(5));
}
