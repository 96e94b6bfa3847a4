// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end runs through the public API, on worker threads where it matters.

use std::iter::empty;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use intcode_core::{
    Channel, Device, Instance, Machine, OutputFrames, Stop, VmError, drive, pipeline, program,
};
use pretty_assertions::assert_eq;

const QUINE: [i64; 16] = [
    109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
];

/// Run on a worker thread, collecting every output through the handler.
fn run_instance(program: &[i64], inputs: &[i64]) -> (Instance, Vec<i64>) {
    let mut instance = Instance::with_inputs(program.to_vec(), inputs.to_vec());
    let outputs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outputs);
    instance
        .set_output_handler(move |value| sink.lock().unwrap().push(value))
        .unwrap();
    instance.start().unwrap();
    instance.await_halt().unwrap();
    let outputs = outputs.lock().unwrap().clone();
    (instance, outputs)
}

#[test]
fn self_modifying_add() {
    let (instance, outputs) = run_instance(&[1, 0, 0, 0, 99], &[]);
    assert_eq!(instance.mem_get(0), Some(2));
    assert!(outputs.is_empty());
}

#[test]
fn echo_through_channel() {
    let (_, outputs) = run_instance(&[3, 0, 4, 0, 99], &[42]);
    assert_eq!(outputs, vec![42]);
}

#[test]
fn immediate_mode_multiply_patches_halt() {
    let (instance, _) = run_instance(&[1002, 4, 3, 4, 33], &[]);
    assert_eq!(instance.mem_get(4), Some(99));
}

#[test]
fn quine_on_a_thread() {
    let (_, outputs) = run_instance(&QUINE, &[]);
    assert_eq!(outputs, QUINE.to_vec());
}

#[test]
fn relative_base_reaches_far_memory() {
    // rb = 2019, then output [rb - 34]
    let mut machine = Machine::new([109, 2000, 109, 19, 204, -34, 99]);
    machine.mem_set(1985, 1234);
    assert_eq!(machine.run_through_inputs(empty()), Ok((vec![1234], Stop::Halted)));
    assert_eq!(machine.stats().relative_base, 2019);
}

#[test]
fn two_instances_wired_end_to_end() {
    let mut a = Instance::new([3, 0, 4, 0, 99]);
    let mut b = Instance::new([3, 0, 4, 0, 99]);
    let to_b = b.input_sender();
    a.set_output_handler(move |value| to_b.send(value)).unwrap();

    a.start().unwrap();
    b.start().unwrap();
    a.send_input(17);
    a.await_halt().unwrap();
    b.await_halt().unwrap();
    assert_eq!(b.last_output(), Some(17));
}

#[test]
fn output_reaches_external_channel_in_order() {
    let observed = Channel::new();
    let sender = observed.sender();
    let mut instance = Instance::new(QUINE);
    instance.set_output_handler(move |value| sender.send(value)).unwrap();
    instance.start().unwrap();
    instance.await_halt().unwrap();
    assert_eq!(observed.drain(), QUINE.to_vec());
}

#[test]
fn amplifier_chain() {
    let program = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];
    assert_eq!(pipeline::run_chain(&program, &[4, 3, 2, 1, 0], 0).unwrap(), 43210);
}

#[test]
fn amplifier_feedback_loop() {
    let program = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];
    assert_eq!(
        pipeline::run_feedback_loop(&program, &[9, 8, 7, 6, 5], 0).unwrap(),
        139629729
    );
}

#[test]
fn amplifier_program_loaded_from_text() {
    let program = program::parse("3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0\n").unwrap();
    let (best, signal) = pipeline::best_phase_setting(&program, &[0, 1, 2, 3, 4], false).unwrap();
    assert_eq!(best, vec![4, 3, 2, 1, 0]);
    assert_eq!(signal, 43210);
}

/// Tracks a robot painting panels: each input is the colour under it, each
/// pair of outputs is a colour to paint and a turn.
#[derive(Default)]
struct Painter {
    frames: OutputFrames<2>,
    painted: Vec<(i64, i64)>,
    under: i64,
}

impl Device for Painter {
    fn on_output(&mut self, value: i64) {
        if let Some([colour, turn]) = self.frames.push(value) {
            self.painted.push((colour, turn));
            self.under = colour;
        }
    }

    fn next_input(&mut self) -> i64 {
        self.under
    }
}

#[test]
fn controller_feeds_device_state_back() {
    // three rounds of: read colour, paint 1 - colour, turn 0
    let program = [
        3, 100, 1002, 100, -1, 101, 1001, 101, 1, 101, 4, 101, 104, 0, 1001, 102, 1, 102, 1007,
        102, 3, 103, 1005, 103, 0, 99,
    ];
    let mut instance = Instance::new(program);
    let painter = Arc::new(Mutex::new(Painter::default()));
    drive(&mut instance, &painter, Duration::from_millis(1)).unwrap();
    assert_eq!(painter.lock().unwrap().painted, vec![(1, 0), (0, 0), (1, 0)]);
}

#[test]
fn controller_counts_to_five() {
    #[derive(Default)]
    struct LastOutput(Vec<i64>);

    impl Device for LastOutput {
        fn on_output(&mut self, value: i64) {
            self.0.push(value);
        }

        fn next_input(&mut self) -> i64 {
            self.0.last().copied().unwrap_or_default()
        }
    }

    let program = [3, 100, 1001, 100, 1, 100, 4, 100, 1007, 100, 5, 101, 1005, 101, 0, 99];
    let mut instance = Instance::new(program);
    let device = Arc::new(Mutex::new(LastOutput::default()));
    drive(&mut instance, &device, Duration::from_millis(1)).unwrap();
    assert_eq!(device.lock().unwrap().0, vec![1, 2, 3, 4, 5]);
}

#[test]
fn fatal_error_does_not_disturb_other_instances() {
    let mut broken = Instance::with_inputs([3, 0, 4, 0, -7], [1]);
    let mut healthy = Instance::with_inputs([3, 0, 4, 0, 99], [2]);
    broken.start().unwrap();
    healthy.start().unwrap();
    let err = broken.await_halt().unwrap_err();
    assert!(std::error::Error::source(&err)
        .and_then(|source| source.downcast_ref::<VmError>())
        .is_some_and(|vm| *vm == VmError::InvalidOpcode { word: -7, pc: 4 }));
    healthy.await_halt().unwrap();
    assert_eq!(healthy.last_output(), Some(2));
}
