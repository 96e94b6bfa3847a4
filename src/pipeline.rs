// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Amplifier pipelines
//!
//! Every stage runs its own copy of the same program and is seeded with a
//! phase setting. Stage `i`'s outputs feed stage `i + 1`; with feedback
//! enabled the last stage also feeds the first, and the loop keeps going
//! until every stage halts. The result is the last stage's final output.

use std::thread;
use std::time::Duration;

use itertools::Itertools;
use log::{debug, warn};
use thiserror::Error;

use crate::instance::{Instance, InstanceConfig, InstanceError};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a pipeline needs at least one stage")]
    Empty,
    #[error("stage {stage} failed")]
    Stage {
        stage: usize,
        #[source]
        source: InstanceError,
    },
    #[error("the last stage never produced output")]
    NoOutput,
}

/// Create one instance per phase and wire each output into the next input.
///
/// Every stage starts with its phase queued. Nothing is started yet.
pub fn build(
    program: &[i64],
    phases: &[i64],
    feedback: bool,
) -> Result<Vec<Instance>, PipelineError> {
    if phases.is_empty() {
        return Err(PipelineError::Empty);
    }

    let mut stages: Vec<Instance> = phases
        .iter()
        .enumerate()
        .map(|(i, &phase)| {
            let config = InstanceConfig::new().name(format!("amp-{i}"));
            Instance::with_config(program.iter().copied(), [phase], config)
        })
        .collect();

    let count = stages.len();
    let links = if feedback { count } else { count - 1 };
    for i in 0..links {
        let next = stages[(i + 1) % count].input_sender();
        stages[i]
            .set_output_handler(move |value| next.send(value))
            .map_err(|source| PipelineError::Stage { stage: i, source })?;
    }
    Ok(stages)
}

fn final_output(stages: &[Instance]) -> Result<i64, PipelineError> {
    stages
        .last()
        .and_then(Instance::last_output)
        .ok_or(PipelineError::NoOutput)
}

/// Run the stages one after another, each to completion.
pub fn run_chain(program: &[i64], phases: &[i64], seed: i64) -> Result<i64, PipelineError> {
    let mut stages = build(program, phases, false)?;
    stages[0].send_input(seed);
    for (stage, instance) in stages.iter_mut().enumerate() {
        instance
            .start()
            .and_then(|()| instance.await_halt())
            .map_err(|source| PipelineError::Stage { stage, source })?;
    }
    final_output(&stages)
}

/// Run every stage at once and wait for all of them.
///
/// If any stage fails the whole run fails; stages that are still blocked on
/// input at that point are left parked.
pub fn run_concurrent(
    program: &[i64],
    phases: &[i64],
    seed: i64,
    feedback: bool,
) -> Result<i64, PipelineError> {
    let mut stages = build(program, phases, feedback)?;
    stages[0].send_input(seed);
    for (stage, instance) in stages.iter_mut().enumerate() {
        instance
            .start()
            .map_err(|source| PipelineError::Stage { stage, source })?;
    }

    let mut pending: Vec<usize> = (0..stages.len()).collect();
    while !pending.is_empty() {
        let mut still_running = Vec::with_capacity(pending.len());
        for stage in pending {
            if !stages[stage].has_halted() {
                still_running.push(stage);
                continue;
            }
            if let Err(source) = stages[stage].await_halt() {
                warn!("abandoning pipeline, stage {stage} failed: {source}");
                return Err(PipelineError::Stage { stage, source });
            }
            debug!("stage {stage} halted");
        }
        pending = still_running;
        if !pending.is_empty() {
            thread::sleep(POLL_INTERVAL);
        }
    }
    final_output(&stages)
}

/// Run the stages concurrently with the last one feeding the first.
pub fn run_feedback_loop(
    program: &[i64],
    phases: &[i64],
    seed: i64,
) -> Result<i64, PipelineError> {
    run_concurrent(program, phases, seed, true)
}

/// Try every ordering of `phases` and return the best one with its signal.
pub fn best_phase_setting(
    program: &[i64],
    phases: &[i64],
    feedback: bool,
) -> Result<(Vec<i64>, i64), PipelineError> {
    let mut best: Option<(Vec<i64>, i64)> = None;
    for order in phases.iter().copied().permutations(phases.len()) {
        let signal = if feedback {
            run_feedback_loop(program, &order, 0)?
        } else {
            run_chain(program, &order, 0)?
        };
        if best.as_ref().is_none_or(|(_, top)| signal > *top) {
            best = Some((order, signal));
        }
    }
    best.ok_or(PipelineError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::VmError;

    const CHAIN_A: [i64; 17] = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];
    const CHAIN_B: [i64; 25] = [
        3, 23, 3, 24, 1002, 24, 10, 24, 1002, 23, -1, 23, 101, 5, 23, 23, 1, 24, 23, 23, 4, 23,
        99, 0, 0,
    ];
    const CHAIN_C: [i64; 34] = [
        3, 31, 3, 32, 1002, 32, 10, 32, 1001, 31, -2, 31, 1007, 31, 0, 33, 1002, 33, 7, 33, 1, 33,
        31, 31, 1, 32, 31, 31, 4, 31, 99, 0, 0, 0,
    ];
    const LOOP_A: [i64; 29] = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];
    const LOOP_B: [i64; 57] = [
        3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001, 54,
        -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55, 53, 4,
        53, 1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
    ];

    #[test]
    fn amplifier_chain_signals() {
        assert_eq!(run_chain(&CHAIN_A, &[4, 3, 2, 1, 0], 0).unwrap(), 43210);
        assert_eq!(run_chain(&CHAIN_B, &[0, 1, 2, 3, 4], 0).unwrap(), 54321);
        assert_eq!(run_chain(&CHAIN_C, &[1, 0, 4, 3, 2], 0).unwrap(), 65210);
    }

    #[test]
    fn concurrent_chain_matches_sequential() {
        let phases = [4, 3, 2, 1, 0];
        assert_eq!(
            run_concurrent(&CHAIN_A, &phases, 0, false).unwrap(),
            run_chain(&CHAIN_A, &phases, 0).unwrap()
        );
    }

    #[test]
    fn feedback_loop_signals() {
        assert_eq!(run_feedback_loop(&LOOP_A, &[9, 8, 7, 6, 5], 0).unwrap(), 139629729);
        assert_eq!(run_feedback_loop(&LOOP_B, &[9, 7, 8, 5, 6], 0).unwrap(), 18216);
    }

    #[test]
    fn finds_best_phase_settings() {
        assert_eq!(
            best_phase_setting(&CHAIN_A, &[0, 1, 2, 3, 4], false).unwrap(),
            (vec![4, 3, 2, 1, 0], 43210)
        );
        assert_eq!(
            best_phase_setting(&LOOP_A, &[5, 6, 7, 8, 9], true).unwrap(),
            (vec![9, 8, 7, 6, 5], 139629729)
        );
    }

    #[test]
    fn single_stage_echo() {
        assert_eq!(run_chain(&[3, 0, 3, 0, 4, 0, 99], &[1], 77).unwrap(), 77);
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        assert!(matches!(run_chain(&CHAIN_A, &[], 0), Err(PipelineError::Empty)));
        assert!(matches!(build(&CHAIN_A, &[], true), Err(PipelineError::Empty)));
    }

    #[test]
    fn failing_stage_fails_the_pipeline() {
        // forwards the phase, then hits an invalid opcode
        let program = [3, 0, 4, 0, 42];
        let err = run_chain(&program, &[1, 2], 0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: 0,
                source: InstanceError::Vm {
                    source: VmError::InvalidOpcode { word: 42, pc: 4 },
                    ..
                },
            }
        ));

        let err = run_concurrent(&program, &[1, 2], 0, false).unwrap_err();
        assert!(matches!(err, PipelineError::Stage { .. }));
    }

    #[test]
    fn silent_program_has_no_output() {
        assert!(matches!(
            run_chain(&[3, 0, 99], &[1], 0),
            Err(PipelineError::NoOutput)
        ));
    }
}
