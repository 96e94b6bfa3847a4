// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// Command-line front end for the Intcode VM.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;

use intcode_core::{Instance, pipeline, program};

#[derive(Parser)]
#[command(version, about = "Run Intcode programs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program and print every output
    Run {
        /// Program file (comma-separated integers)
        file: PathBuf,
        /// Input value, may be given more than once
        #[arg(short, long = "input", allow_negative_numbers = true)]
        inputs: Vec<i64>,
    },
    /// Run an amplifier chain with fixed phase settings
    Chain {
        file: PathBuf,
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        phases: Vec<i64>,
        /// Value fed to the first stage after its phase
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        seed: i64,
        /// Feed the last stage's output back into the first
        #[arg(long)]
        feedback: bool,
    },
    /// Find the phase ordering that produces the highest signal
    Search {
        file: PathBuf,
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        phases: Vec<i64>,
        #[arg(long)]
        feedback: bool,
    },
    /// Patch memory, run the program, then inspect memory
    Patch {
        file: PathBuf,
        /// Memory assignment applied before start
        #[arg(long = "set", value_name = "ADDR=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(u64, i64)>,
        /// Address to print after the program halts
        #[arg(long = "print", value_name = "ADDR", default_value_t = 0)]
        print: u64,
        #[arg(short, long = "input", allow_negative_numbers = true)]
        inputs: Vec<i64>,
    },
}

fn parse_assignment(arg: &str) -> Result<(u64, i64), String> {
    let (address, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got {arg:?}"))?;
    let address = address
        .trim()
        .parse()
        .map_err(|e| format!("bad address {address:?}: {e}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value {value:?}: {e}"))?;
    Ok((address, value))
}

fn load(file: &Path) -> Result<Vec<i64>> {
    program::load(file).with_context(|| format!("failed to load {}", file.display()))
}

/// Run `program` on an instance, returning everything it printed.
fn run_collecting(
    program: Vec<i64>,
    inputs: Vec<i64>,
    patches: &[(u64, i64)],
) -> Result<(Instance, Vec<i64>)> {
    let mut instance = Instance::with_inputs(program, inputs);
    for &(address, value) in patches {
        instance.mem_set(address, value)?;
    }

    let outputs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outputs);
    instance.set_output_handler(move |value| {
        if let Ok(mut outputs) = sink.lock() {
            outputs.push(value);
        }
    })?;
    instance.start()?;
    instance.await_halt().context("program failed")?;

    let outputs = outputs
        .lock()
        .map(|outputs| outputs.clone())
        .map_err(|_| anyhow!("output buffer poisoned"))?;
    Ok((instance, outputs))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Run { file, inputs } => {
            let (instance, outputs) = run_collecting(load(&file)?, inputs, &[])?;
            for value in &outputs {
                println!("{value}");
            }
            if let Some(stats) = instance.stats() {
                info!("halted after {} instructions", stats.instructions);
            }
        }
        Command::Chain {
            file,
            phases,
            seed,
            feedback,
        } => {
            let program = load(&file)?;
            let signal = if feedback {
                pipeline::run_feedback_loop(&program, &phases, seed)
            } else {
                pipeline::run_chain(&program, &phases, seed)
            }
            .context("amplifier chain failed")?;
            info!("phases {phases:?} produced {signal}");
            println!("{signal}");
        }
        Command::Search {
            file,
            phases,
            feedback,
        } => {
            let program = load(&file)?;
            let (best, signal) = pipeline::best_phase_setting(&program, &phases, feedback)
                .context("phase search failed")?;
            info!("best phases {best:?}");
            println!("{signal}");
        }
        Command::Patch {
            file,
            assignments,
            print,
            inputs,
        } => {
            let (instance, _) = run_collecting(load(&file)?, inputs, &assignments)?;
            let value = instance
                .mem_get(print)
                .ok_or_else(|| anyhow!("memory of {} is unavailable", instance.name()))?;
            println!("{value}");
        }
    }

    Ok(())
}
