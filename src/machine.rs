// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Single-threaded Intcode machine
//!
//! A [`Machine`] pairs one [`Cpu`] with the [`Memory`] it owns and runs the
//! fetch-decode-execute loop against any [`Port`]. It never blocks by itself:
//! with a port that reports [`Input::Pending`] the run returns
//! [`Stop::Awaiting`] and can be resumed once more input is available.

use std::collections::VecDeque;

use log::debug;

use crate::core::Memory;
use crate::cpu::{Cpu, Input, Port, Step, VmError};

/// Why [`Machine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Execution is waiting on input that the port could not supply.
    Awaiting,
    /// Execution has halted.
    Halted,
}

/// A port backed by an input queue and an output buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedPort {
    inputs: VecDeque<i64>,
    outputs: Vec<i64>,
}

impl BufferedPort {
    pub fn new(inputs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
        }
    }

    pub fn push_input(&mut self, value: i64) {
        self.inputs.push_back(value);
    }

    /// Take every output collected so far.
    pub fn take_outputs(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.outputs)
    }

    /// Inputs not consumed yet.
    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

impl Port for BufferedPort {
    fn input(&mut self) -> Input {
        self.inputs.pop_front().map_or(Input::Pending, Input::Value)
    }

    fn output(&mut self, value: i64) {
        self.outputs.push(value);
    }
}

/// Machine execution statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineStats {
    pub pc: u64,
    pub relative_base: i64,
    pub instructions: u64,
    pub halted: bool,
}

/// One Intcode computer: a CPU and the memory it exclusively owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Machine {
    pub cpu: Cpu,
    pub memory: Memory,
}

impl Machine {
    /// Create a machine with `program` loaded from address 0.
    pub fn new(program: impl IntoIterator<Item = i64>) -> Self {
        Self {
            cpu: Cpu::new(),
            memory: program.into_iter().collect(),
        }
    }

    /// Execute a single instruction
    pub fn step<P: Port + ?Sized>(&mut self, port: &mut P) -> Result<Step, VmError> {
        self.cpu.step(&mut self.memory, port)
    }

    /// Run until the program halts or the port runs dry.
    pub fn run<P: Port + ?Sized>(&mut self, port: &mut P) -> Result<Stop, VmError> {
        loop {
            match self.step(port)? {
                Step::Continue => {}
                Step::Awaiting => {
                    debug!("awaiting input at address {}", self.cpu.pc);
                    return Ok(Stop::Awaiting);
                }
                Step::Halted => return Ok(Stop::Halted),
            }
        }
    }

    /// Feed `inputs` to the program and run until it halts or wants more.
    ///
    /// Returns every value output during this run along with the reason it
    /// stopped. On [`Stop::Awaiting`] the machine can be resumed with another
    /// call.
    pub fn run_through_inputs(
        &mut self,
        inputs: impl IntoIterator<Item = i64>,
    ) -> Result<(Vec<i64>, Stop), VmError> {
        let mut port = BufferedPort::new(inputs);
        let stop = self.run(&mut port)?;
        Ok((port.take_outputs(), stop))
    }

    /// Read a memory cell
    #[doc(alias = "peek")]
    pub fn mem_get(&self, address: u64) -> i64 {
        self.memory[address]
    }

    /// Overwrite a memory cell, typically to patch a program before running it
    #[doc(alias = "poke")]
    pub fn mem_set(&mut self, address: u64, value: i64) {
        self.memory[address] = value;
    }

    pub fn last_output(&self) -> Option<i64> {
        self.cpu.last_output
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.halted
    }

    /// Get current execution statistics
    pub fn stats(&self) -> MachineStats {
        MachineStats {
            pc: self.cpu.pc,
            relative_base: self.cpu.relative_base,
            instructions: self.cpu.instructions,
            halted: self.cpu.halted,
        }
    }
}
