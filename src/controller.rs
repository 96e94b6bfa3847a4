// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reactive controllers
//!
//! A controller owns some device state that the program drives through its
//! outputs, and answers the program's input requests from that state. Outputs
//! are applied on the worker thread as they happen; inputs are supplied by
//! the caller's thread, which polls the instance until it is blocked waiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use crate::instance::{Instance, InstanceError};

/// Something an Intcode program talks to.
pub trait Device {
    /// Called on the worker thread for every value the program outputs.
    fn on_output(&mut self, value: i64);

    /// The value to send when the program blocks on input.
    fn next_input(&mut self) -> i64;
}

/// Run `instance` to completion against `device`.
///
/// Installs an output handler that forwards to [`Device::on_output`], starts
/// the instance, then checks every `poll_interval` whether the program is
/// waiting for input and, if so, answers with [`Device::next_input`].
pub fn drive<D>(
    instance: &mut Instance,
    device: &Arc<Mutex<D>>,
    poll_interval: Duration,
) -> Result<(), InstanceError>
where
    D: Device + Send + 'static,
{
    let sink = Arc::clone(device);
    instance.set_output_handler(move |value| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_output(value);
    })?;
    instance.start()?;

    let mut answered = 0u64;
    while !instance.has_halted() {
        if instance.is_waiting_for_input() {
            let value = device
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_input();
            trace!("{}: answering input with {value}", instance.name());
            instance.send_input(value);
            answered += 1;
        }
        thread::sleep(poll_interval);
    }
    debug!("{}: controller answered {answered} inputs", instance.name());
    instance.await_halt()
}

/// Groups a flat output stream into fixed-size frames.
///
/// Programs commonly emit records of `N` values in a row (a position and a
/// colour, or x, y and a tile id). Frames must hold at least one value:
///
/// ```compile_fail
/// let frames = intcode_core::OutputFrames::<0>::new();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFrames<const N: usize> {
    buf: [i64; N],
    filled: usize,
}

impl<const N: usize> Default for OutputFrames<N> {
    fn default() -> Self {
        const { assert!(N > 0, "an output frame needs at least one value") };
        Self {
            buf: [0; N],
            filled: 0,
        }
    }
}

impl<const N: usize> OutputFrames<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value; returns the frame once `N` values have been collected.
    pub fn push(&mut self, value: i64) -> Option<[i64; N]> {
        self.buf[self.filled] = value;
        self.filled += 1;
        if self.filled == N {
            self.filled = 0;
            Some(self.buf)
        } else {
            None
        }
    }

    /// Values collected towards the next frame.
    pub fn pending(&self) -> &[i64] {
        &self.buf[..self.filled]
    }
}
