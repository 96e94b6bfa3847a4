// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Intcode executor
//!
//! The [`Cpu`] holds the program counter and relative base of one machine and
//! applies decoded instructions to a [`Memory`]. Input and output go through a
//! [`Port`], which is the only place execution can suspend.

use std::time::Duration;

use log::trace;
use thiserror::Error;

use crate::core::Memory;
use crate::decoder::{Instruction, Opcode, Param, ParamMode, decode};

/// Fatal execution errors. Any of these halts the machine that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid instruction word {word} at address {pc}")]
    InvalidOpcode { word: i64, pc: u64 },
    #[error("invalid parameter mode {mode} at address {pc}")]
    InvalidMode { mode: i64, pc: u64 },
    #[error("instruction at address {pc} writes to an immediate parameter")]
    WriteToImmediate { pc: u64 },
    #[error("instruction at address {pc} references negative address {address}")]
    NegativeAddress { address: i64, pc: u64 },
    #[error("arithmetic overflow in instruction at address {pc}")]
    Overflow { pc: u64 },
    #[error("no input arrived within {waited:?} for instruction at address {pc}")]
    InputStarved { waited: Duration, pc: u64 },
}

/// What a [`Port`] has to offer when the program asks for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Value(i64),
    /// Nothing available yet; the INPUT instruction is retried on the next step.
    Pending,
    /// Gave up waiting after the given duration.
    Starved(Duration),
}

/// The executor's connection to the outside world.
pub trait Port {
    fn input(&mut self) -> Input;
    fn output(&mut self, value: i64);
}

impl<P: Port + ?Sized> Port for &mut P {
    fn input(&mut self) -> Input {
        (**self).input()
    }

    fn output(&mut self, value: i64) {
        (**self).output(value)
    }
}

/// Outcome of a single [`Cpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction executed; more may follow.
    Continue,
    /// The port had no input; PC still points at the INPUT instruction.
    Awaiting,
    /// HALT has executed. Further steps do nothing.
    Halted,
}

/// Where control goes after an instruction.
enum Transition {
    Goto(u64),
    Await,
    Halt,
}

/// Intcode CPU state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpu {
    pub pc: u64,
    pub relative_base: i64,
    /// Instructions retired so far.
    pub instructions: u64,
    pub halted: bool,
    pub last_output: Option<i64>,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a parameter to the value it denotes.
    ///
    /// Negative addresses are never written, so reading one yields 0.
    pub fn value(&self, memory: &Memory, param: Param) -> Result<i64, VmError> {
        let address = match param.mode {
            ParamMode::Immediate => return Ok(param.literal),
            ParamMode::Position => param.literal,
            ParamMode::Relative => self.relative(param.literal)?,
        };
        Ok(u64::try_from(address).map_or(0, |address| memory[address]))
    }

    /// Resolve a parameter to the address an instruction writes to.
    pub fn target(&self, param: Param) -> Result<u64, VmError> {
        match param.mode {
            ParamMode::Immediate => Err(VmError::WriteToImmediate { pc: self.pc }),
            ParamMode::Position => self.address(param.literal),
            ParamMode::Relative => self.address(self.relative(param.literal)?),
        }
    }

    fn relative(&self, offset: i64) -> Result<i64, VmError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(VmError::Overflow { pc: self.pc })
    }

    fn address(&self, address: i64) -> Result<u64, VmError> {
        u64::try_from(address).map_err(|_| VmError::NegativeAddress {
            address,
            pc: self.pc,
        })
    }

    fn arith(&self, result: Option<i64>) -> Result<i64, VmError> {
        result.ok_or(VmError::Overflow { pc: self.pc })
    }

    /// Decode and execute the instruction at PC.
    ///
    /// A fatal error leaves the CPU halted with PC on the failing instruction.
    pub fn step<P: Port + ?Sized>(
        &mut self,
        memory: &mut Memory,
        port: &mut P,
    ) -> Result<Step, VmError> {
        if self.halted {
            return Ok(Step::Halted);
        }

        let instr = decode(memory, self.pc).inspect_err(|_| self.halted = true)?;
        trace!(
            "pc: {:>8} | rb: {:>6} | {instr}",
            self.pc, self.relative_base
        );

        let transition = self
            .execute(&instr, memory, port)
            .inspect_err(|_| self.halted = true)?;
        match transition {
            Transition::Goto(pc) => {
                self.pc = pc;
                self.instructions += 1;
                Ok(Step::Continue)
            }
            Transition::Await => Ok(Step::Awaiting),
            Transition::Halt => {
                self.halted = true;
                self.instructions += 1;
                Ok(Step::Halted)
            }
        }
    }

    fn execute<P: Port + ?Sized>(
        &mut self,
        instr: &Instruction,
        memory: &mut Memory,
        port: &mut P,
    ) -> Result<Transition, VmError> {
        let p = instr.params();
        let next = self.pc + instr.width() as u64;

        match instr.opcode {
            Opcode::Add => {
                let sum = self.value(memory, p[0])?.checked_add(self.value(memory, p[1])?);
                let sum = self.arith(sum)?;
                memory.write(self.target(p[2])?, sum);
            }
            Opcode::Mul => {
                let product = self.value(memory, p[0])?.checked_mul(self.value(memory, p[1])?);
                let product = self.arith(product)?;
                memory.write(self.target(p[2])?, product);
            }
            Opcode::Input => {
                let dest = self.target(p[0])?;
                match port.input() {
                    Input::Value(value) => memory.write(dest, value),
                    Input::Pending => return Ok(Transition::Await),
                    Input::Starved(waited) => {
                        return Err(VmError::InputStarved {
                            waited,
                            pc: self.pc,
                        });
                    }
                }
            }
            Opcode::Output => {
                let value = self.value(memory, p[0])?;
                self.last_output = Some(value);
                port.output(value);
            }
            Opcode::JumpIfTrue => {
                if self.value(memory, p[0])? != 0 {
                    return Ok(Transition::Goto(self.address(self.value(memory, p[1])?)?));
                }
            }
            Opcode::JumpIfFalse => {
                if self.value(memory, p[0])? == 0 {
                    return Ok(Transition::Goto(self.address(self.value(memory, p[1])?)?));
                }
            }
            Opcode::LessThan => {
                let flag = self.value(memory, p[0])? < self.value(memory, p[1])?;
                memory.write(self.target(p[2])?, i64::from(flag));
            }
            Opcode::Equals => {
                let flag = self.value(memory, p[0])? == self.value(memory, p[1])?;
                memory.write(self.target(p[2])?, i64::from(flag));
            }
            Opcode::AdjustRelativeBase => {
                let base = self.relative_base.checked_add(self.value(memory, p[0])?);
                self.relative_base = self.arith(base)?;
            }
            Opcode::Halt => return Ok(Transition::Halt),
        }

        Ok(Transition::Goto(next))
    }
}
