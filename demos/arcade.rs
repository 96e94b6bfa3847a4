//! Arcade Cabinet Demo
//!
//! Demonstrates the reactive controller:
//! - Patching memory before start (inserting credits)
//! - Tile triples grouped with `OutputFrames<3>`
//! - Joystick input answered by `drive` whenever the program blocks
//!
//! Pass a program file and a credit address to run a different cabinet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use intcode_core::{Device, Instance, OutputFrames, drive, program};

/// Moves a ball by the joystick once per credit, then reports its x as the score.
const BUILT_IN: [i64; 29] = [
    3, 27, 4, 26, 104, 0, 104, 4, 1, 26, 27, 26, 1001, 28, -1, 28, 1005, 28, 0, 104, -1, 104,
    0, 4, 26, 99, 0, 0, 1,
];
const BUILT_IN_CREDITS: u64 = 28;

const BALL: i64 = 4;
const PADDLE: i64 = 3;

#[derive(Debug, Default)]
struct Cabinet {
    frames: OutputFrames<3>,
    screen: HashMap<(i64, i64), i64>,
    ball_x: i64,
    paddle_x: i64,
    score: i64,
}

impl Device for Cabinet {
    fn on_output(&mut self, value: i64) {
        match self.frames.push(value) {
            Some([-1, 0, score]) => self.score = score,
            Some([x, y, tile]) => {
                match tile {
                    BALL => self.ball_x = x,
                    PADDLE => self.paddle_x = x,
                    _ => {}
                }
                self.screen.insert((x, y), tile);
            }
            None => {}
        }
    }

    fn next_input(&mut self) -> i64 {
        // chase a target three columns right of the paddle
        (self.paddle_x + 3 - self.ball_x).signum()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Intcode Arcade Cabinet Demo");
    println!("===========================\n");

    let mut args = std::env::args().skip(1);
    let (code, credits_at) = match (args.next(), args.next()) {
        (Some(path), Some(address)) => (program::load(path)?, address.parse::<u64>()?),
        (Some(path), None) => (program::load(path)?, 0),
        _ => (BUILT_IN.to_vec(), BUILT_IN_CREDITS),
    };

    let mut instance = Instance::new(code);
    instance.mem_set(credits_at, 2)?;
    println!("Inserted credits at address {credits_at}");

    let cabinet = Arc::new(Mutex::new(Cabinet::default()));
    drive(&mut instance, &cabinet, Duration::from_millis(1))?;

    let cabinet = cabinet
        .lock()
        .map_err(|_| anyhow::anyhow!("cabinet state poisoned"))?;
    println!("Tiles drawn:   {}", cabinet.screen.len());
    println!("Final score:   {}", cabinet.score);
    if let Some(stats) = instance.stats() {
        println!("Instructions:  {}", stats.instructions);
    }
    Ok(())
}
