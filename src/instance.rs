// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Threaded Intcode instances
//!
//! An [`Instance`] moves a [`Machine`] onto its own worker thread. Input
//! arrives through a blocking [`Channel`]; every output is handed to an
//! optional handler, which may in turn feed another instance's channel.
//!
//! ```
//! use intcode_core::Instance;
//!
//! let mut a = Instance::new([3, 0, 4, 0, 99]);
//! let mut b = Instance::new([3, 0, 4, 0, 99]);
//! let to_b = b.input_sender();
//! a.set_output_handler(move |value| to_b.send(value)).unwrap();
//!
//! a.send_input(42);
//! a.start().unwrap();
//! b.start().unwrap();
//! a.await_halt().unwrap();
//! b.await_halt().unwrap();
//! assert_eq!(b.last_output(), Some(42));
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::channel::{Channel, Sender};
use crate::cpu::{Input, Port, VmError};
use crate::machine::{Machine, MachineStats, Stop};

/// Callback invoked on the worker thread for every OUTPUT instruction.
pub type OutputHandler = Box<dyn FnMut(i64) + Send + 'static>;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Lifecycle errors, plus fatal errors raised by the program itself.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("instance {0} has already been started")]
    AlreadyStarted(String),
    #[error("instance {0} was never started")]
    NotStarted(String),
    #[error("could not spawn worker thread for instance {name}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("worker thread for instance {0} panicked")]
    WorkerPanicked(String),
    #[error("instance {name} failed")]
    Vm {
        name: String,
        #[source]
        source: VmError,
    },
}

/// Settings applied when an instance is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Name used for the worker thread and in log messages.
    pub name: Option<String>,
    /// Treat an INPUT that waits longer than this as fatal. `None` blocks
    /// forever.
    pub input_timeout: Option<Duration>,
    /// Worker thread stack size in bytes.
    pub stack_size: Option<usize>,
}

impl InstanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout = Some(timeout);
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

/// Externally visible lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Ready,
    Running,
    Halted,
}

#[derive(Debug, Default)]
struct Shared {
    halted: AtomicBool,
    last_output: Mutex<Option<i64>>,
}

impl Shared {
    fn last_output(&self) -> Option<i64> {
        *self
            .last_output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_output(&self, value: i64) {
        *self
            .last_output
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

/// Marks the instance halted when the worker exits, even by unwinding.
struct HaltGuard(Arc<Shared>);

impl Drop for HaltGuard {
    fn drop(&mut self) {
        self.0.halted.store(true, Ordering::Release);
    }
}

/// The worker side of an instance's I/O.
struct WorkerPort {
    name: String,
    input: Channel,
    timeout: Option<Duration>,
    handler: Option<OutputHandler>,
    shared: Arc<Shared>,
}

impl Port for WorkerPort {
    fn input(&mut self) -> Input {
        let value = match self.timeout {
            None => Some(self.input.recv()),
            Some(timeout) => self.input.recv_timeout(timeout),
        };
        match value {
            Some(value) => {
                debug!("{}: received {value}", self.name);
                Input::Value(value)
            }
            None => Input::Starved(self.timeout.unwrap_or_default()),
        }
    }

    fn output(&mut self, value: i64) {
        debug!("{}: emitted {value}", self.name);
        self.shared.record_output(value);
        if let Some(handler) = self.handler.as_mut() {
            handler(value);
        }
    }
}

type WorkerResult = (Machine, Result<(), VmError>);

/// An Intcode machine running on its own thread.
pub struct Instance {
    name: String,
    config: InstanceConfig,
    /// Present before start and again after a successful join.
    machine: Option<Machine>,
    input: Channel,
    handler: Option<OutputHandler>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<WorkerResult>>,
    started: bool,
    failure: Option<VmError>,
}

impl Instance {
    pub fn new(program: impl IntoIterator<Item = i64>) -> Self {
        Self::with_config(program, std::iter::empty(), InstanceConfig::default())
    }

    /// Create an instance whose input channel already holds `inputs`.
    pub fn with_inputs(
        program: impl IntoIterator<Item = i64>,
        inputs: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self::with_config(program, inputs, InstanceConfig::default())
    }

    pub fn with_config(
        program: impl IntoIterator<Item = i64>,
        inputs: impl IntoIterator<Item = i64>,
        config: InstanceConfig,
    ) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("intcode-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)));
        Self {
            name,
            config,
            machine: Some(Machine::new(program)),
            input: Channel::with_values(inputs),
            handler: None,
            shared: Arc::default(),
            worker: None,
            started: false,
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle that feeds this instance's input channel.
    pub fn input_sender(&self) -> Sender {
        self.input.sender()
    }

    /// Queue an input value. Never blocks.
    pub fn send_input(&self, value: i64) {
        self.input.send(value);
    }

    /// Install the callback invoked for every output. Must happen before
    /// [`start`](Self::start); the handler runs on the worker thread.
    pub fn set_output_handler<F>(&mut self, handler: F) -> Result<(), InstanceError>
    where
        F: FnMut(i64) + Send + 'static,
    {
        if self.started {
            return Err(InstanceError::AlreadyStarted(self.name.clone()));
        }
        self.handler = Some(Box::new(handler));
        Ok(())
    }

    /// Patch a memory cell before the program starts.
    pub fn mem_set(&mut self, address: u64, value: i64) -> Result<(), InstanceError> {
        match self.machine.as_mut() {
            Some(machine) if !self.started => {
                machine.mem_set(address, value);
                Ok(())
            }
            _ => Err(InstanceError::AlreadyStarted(self.name.clone())),
        }
    }

    /// Spawn the worker thread and begin executing.
    pub fn start(&mut self) -> Result<(), InstanceError> {
        let machine = match self.machine.take() {
            Some(machine) if !self.started => machine,
            other => {
                self.machine = other;
                return Err(InstanceError::AlreadyStarted(self.name.clone()));
            }
        };

        let mut port = WorkerPort {
            name: self.name.clone(),
            input: self.input.clone(),
            timeout: self.config.input_timeout,
            handler: self.handler.take(),
            shared: Arc::clone(&self.shared),
        };
        let guard = HaltGuard(Arc::clone(&self.shared));

        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(bytes) = self.config.stack_size {
            builder = builder.stack_size(bytes);
        }

        debug!("{}: starting", self.name);
        let worker = builder
            .spawn(move || {
                let _guard = guard;
                let mut machine = machine;
                let result = match machine.run(&mut port) {
                    Ok(Stop::Halted) => Ok(()),
                    // a blocking port never reports pending input
                    Ok(Stop::Awaiting) => unreachable!("worker port returned no input"),
                    Err(err) => Err(err),
                };
                match &result {
                    Ok(()) => debug!(
                        "{}: halted after {} instructions",
                        port.name, machine.cpu.instructions
                    ),
                    Err(err) => warn!("{}: {err}", port.name),
                }
                let unread = port.input.drain();
                if !unread.is_empty() {
                    debug!("{}: dropping {} unread inputs", port.name, unread.len());
                }
                (machine, result)
            })
            .map_err(|source| InstanceError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        self.worker = Some(worker);
        self.started = true;
        Ok(())
    }

    pub fn state(&self) -> InstanceState {
        if !self.started {
            InstanceState::Ready
        } else if self.has_halted() {
            InstanceState::Halted
        } else {
            InstanceState::Running
        }
    }

    pub fn has_halted(&self) -> bool {
        self.shared.halted.load(Ordering::Acquire)
    }

    /// True while the program is blocked in INPUT with nothing queued.
    pub fn is_waiting_for_input(&self) -> bool {
        self.started && !self.has_halted() && self.input.is_waiting()
    }

    /// The most recently emitted value, if any.
    pub fn last_output(&self) -> Option<i64> {
        self.shared.last_output()
    }

    /// Block until the worker thread has exited.
    ///
    /// Returns the program's fatal error if it had one. Calling this again
    /// after the worker has been joined returns the same outcome.
    pub fn await_halt(&mut self) -> Result<(), InstanceError> {
        if let Some(worker) = self.worker.take() {
            let (machine, result) = worker
                .join()
                .map_err(|_| InstanceError::WorkerPanicked(self.name.clone()))?;
            self.machine = Some(machine);
            self.failure = result.err();
        } else if !self.started {
            return Err(InstanceError::NotStarted(self.name.clone()));
        } else if self.machine.is_none() {
            return Err(InstanceError::WorkerPanicked(self.name.clone()));
        }

        match &self.failure {
            Some(err) => Err(InstanceError::Vm {
                name: self.name.clone(),
                source: err.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Read a memory cell. Only available before start or after
    /// [`await_halt`](Self::await_halt).
    pub fn mem_get(&self, address: u64) -> Option<i64> {
        self.machine.as_ref().map(|machine| machine.mem_get(address))
    }

    /// Statistics of the machine, when it is not running.
    pub fn stats(&self) -> Option<MachineStats> {
        self.machine.as_ref().map(Machine::stats)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("queued_inputs", &self.input.len())
            .field("last_output", &self.last_output())
            .finish()
    }
}
