//! Hull Painting Robot Demo
//!
//! Demonstrates wiring an instance's output handler back into its own input:
//! - Output pairs grouped with `OutputFrames<2>`
//! - The handler answers each pair through a `Sender`
//! - Final robot state read after `await_halt`
//!
//! Pass a program file to run it instead of the built-in program.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use intcode_core::{Instance, OutputFrames, program};

/// Six moves, each painting the opposite of the colour seen. Turns right on
/// the second move and left otherwise.
const BUILT_IN: [i64; 30] = [
    3, 100, 1002, 100, -1, 101, 1001, 101, 1, 101, 4, 101, 1001, 102, 1, 102, 1008, 102, 2,
    103, 4, 103, 1007, 102, 6, 104, 1005, 104, 0, 99,
];

#[derive(Debug, Default)]
struct Robot {
    frames: OutputFrames<2>,
    position: (i32, i32),
    heading: (i32, i32),
    panels: HashMap<(i32, i32), i64>,
    moves: usize,
}

impl Robot {
    fn new() -> Self {
        Self {
            heading: (0, -1),
            ..Self::default()
        }
    }

    fn colour_under(&self) -> i64 {
        self.panels.get(&self.position).copied().unwrap_or(0)
    }

    /// Apply one output value; returns the next input once a move completes.
    fn accept(&mut self, value: i64) -> Option<i64> {
        let [colour, turn] = self.frames.push(value)?;
        self.panels.insert(self.position, colour);
        let (dx, dy) = self.heading;
        self.heading = if turn == 0 { (dy, -dx) } else { (-dy, dx) };
        self.position.0 += self.heading.0;
        self.position.1 += self.heading.1;
        self.moves += 1;
        Some(self.colour_under())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Intcode Hull Painting Robot Demo");
    println!("================================\n");

    let code = match std::env::args().nth(1) {
        Some(path) => program::load(path)?,
        None => BUILT_IN.to_vec(),
    };

    let robot = Arc::new(Mutex::new(Robot::new()));
    let mut instance = Instance::new(code);
    let camera = instance.input_sender();
    let state = Arc::clone(&robot);
    instance.set_output_handler(move |value| {
        let reply = state.lock().ok().and_then(|mut robot| robot.accept(value));
        if let Some(colour) = reply {
            camera.send(colour);
        }
    })?;

    // the robot starts on a black panel
    instance.send_input(0);
    instance.start()?;
    instance.await_halt()?;

    let robot = robot
        .lock()
        .map_err(|_| anyhow::anyhow!("robot state poisoned"))?;
    println!("Moves made:      {}", robot.moves);
    println!("Panels painted:  {}", robot.panels.len());
    println!("Panels white:    {}", robot.panels.values().filter(|&&c| c == 1).count());
    println!("Final position:  {:?}", robot.position);
    Ok(())
}
