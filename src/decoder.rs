// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Instruction decoder
//!
//! An instruction word `ABCDE` is split into a two digit opcode (`DE`) and one
//! addressing mode digit per parameter, read right to left (`C` for the first
//! parameter, `B` for the second, `A` for the third). Missing digits mean
//! position mode, so `1002` is a multiply whose second parameter is immediate.

use std::fmt;

use crate::core::Memory;
use crate::cpu::VmError;

/// Maximum number of parameters any instruction takes.
pub const MAX_PARAMS: usize = 3;

/// Operation selected by the low two digits of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Add = 1,
    Mul = 2,
    Input = 3,
    Output = 4,
    JumpIfTrue = 5,
    JumpIfFalse = 6,
    LessThan = 7,
    Equals = 8,
    AdjustRelativeBase = 9,
    Halt = 99,
}

/// Opcode and instruction width (opcode word plus parameters), indexed by the
/// numeric opcode. Unassigned slots are `None`.
static OPCODE_TABLE: [Option<(Opcode, usize)>; 100] = build_opcode_table();

const fn build_opcode_table() -> [Option<(Opcode, usize)>; 100] {
    let mut table = [None; 100];
    table[1] = Some((Opcode::Add, 4));
    table[2] = Some((Opcode::Mul, 4));
    table[3] = Some((Opcode::Input, 2));
    table[4] = Some((Opcode::Output, 2));
    table[5] = Some((Opcode::JumpIfTrue, 3));
    table[6] = Some((Opcode::JumpIfFalse, 3));
    table[7] = Some((Opcode::LessThan, 4));
    table[8] = Some((Opcode::Equals, 4));
    table[9] = Some((Opcode::AdjustRelativeBase, 2));
    table[99] = Some((Opcode::Halt, 1));
    table
}

impl Opcode {
    /// Look up a numeric opcode.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| OPCODE_TABLE.get(index).copied().flatten())
            .map(|(opcode, _)| opcode)
    }

    /// Width of the instruction in words, opcode word included.
    pub fn width(self) -> usize {
        OPCODE_TABLE[self as usize].map_or(1, |(_, width)| width)
    }

    /// Number of parameters following the opcode word.
    pub fn arity(self) -> usize {
        self.width() - 1
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Input => "in",
            Opcode::Output => "out",
            Opcode::JumpIfTrue => "jnz",
            Opcode::JumpIfFalse => "jz",
            Opcode::LessThan => "lt",
            Opcode::Equals => "eq",
            Opcode::AdjustRelativeBase => "arb",
            Opcode::Halt => "halt",
        }
    }
}

/// Addressing mode of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamMode {
    /// The literal is an address; the value lives in memory.
    #[default]
    Position = 0,
    /// The literal is the value. Never legal for a write target.
    Immediate = 1,
    /// The literal is an offset from the relative base.
    Relative = 2,
}

impl ParamMode {
    fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(ParamMode::Position),
            1 => Some(ParamMode::Immediate),
            2 => Some(ParamMode::Relative),
            _ => None,
        }
    }
}

/// A raw operand word together with its addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Param {
    pub literal: i64,
    pub mode: ParamMode,
}

impl Param {
    pub const fn new(literal: i64, mode: ParamMode) -> Self {
        Self { literal, mode }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ParamMode::Position => write!(f, "{}", self.literal),
            ParamMode::Immediate => write!(f, "#{}", self.literal),
            ParamMode::Relative => write!(f, "@{}", self.literal),
        }
    }
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// The undecoded instruction word.
    pub word: i64,
    params: [Param; MAX_PARAMS],
}

impl Instruction {
    /// Parameters in operand order.
    pub fn params(&self) -> &[Param] {
        &self.params[..self.opcode.arity()]
    }

    pub fn width(&self) -> usize {
        self.opcode.width()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05} {}", self.word, self.opcode.mnemonic())?;
        for (i, param) in self.params().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{param}")?;
        }
        Ok(())
    }
}

/// Decode the instruction stored at `pc`.
///
/// Only the opcode word and its operand words are read. Mode digits beyond
/// the instruction's arity are ignored.
pub fn decode(memory: &Memory, pc: u64) -> Result<Instruction, VmError> {
    let word = memory[pc];
    let opcode = (word >= 0)
        .then(|| Opcode::from_code(word % 100))
        .flatten()
        .ok_or(VmError::InvalidOpcode { word, pc })?;

    let mut params = [Param::default(); MAX_PARAMS];
    let mut modes = word / 100;
    for (offset, param) in (1u64..).zip(params.iter_mut().take(opcode.arity())) {
        let digit = modes % 10;
        let mode = ParamMode::from_digit(digit).ok_or(VmError::InvalidMode { mode: digit, pc })?;
        *param = Param::new(memory[pc + offset], mode);
        modes /= 10;
    }

    Ok(Instruction {
        opcode,
        word,
        params,
    })
}
