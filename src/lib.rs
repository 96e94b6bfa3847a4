// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Intcode virtual machine
//!
//! This library provides a self-modifying integer VM with sparse memory,
//! plus the plumbing to run many of them on their own threads and wire
//! their inputs and outputs together into pipelines and control loops.

pub mod channel;
pub mod controller;
pub mod core;
pub mod cpu;
pub mod decoder;
pub mod instance;
pub mod machine;
pub mod pipeline;
pub mod program;

// Re-export commonly used types
pub use channel::{Channel, Sender};
pub use controller::{Device, OutputFrames, drive};
pub use core::Memory;
pub use cpu::{Cpu, Input, Port, Step, VmError};
pub use decoder::{Instruction, Opcode, Param, ParamMode, decode};
pub use instance::{Instance, InstanceConfig, InstanceError, InstanceState};
pub use machine::{BufferedPort, Machine, MachineStats, Stop};
pub use pipeline::PipelineError;
pub use program::ProgramError;
