// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Fixed-timestep scheduling example
//!
//! Runs a physics-style system on a fixed 50ms step while the outer loop
//! advances with irregular frame times, showing how the accumulator decouples
//! the two and how the interpolation alpha reports leftover time.

use std::any::Any;

use sparse_ecs::{EcsResult, Interval, System, World, WorldBuilder};

/// Counts fixed steps and reports the interpolation alpha after each frame.
struct FixedPhysics {
    steps: u32,
    last_alpha: f32,
}

impl System for FixedPhysics {
    fn interval(&self) -> Interval {
        Interval::Fixed { step: 0.05 }
    }

    fn on_tick(&mut self, _world: &mut World) {
        self.steps += 1;
        println!("    physics step {}", self.steps);
    }

    fn on_alpha(&mut self, _world: &mut World, alpha: f32) {
        self.last_alpha = alpha;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Ticks once per frame regardless of frame time.
struct FrameCounter {
    frames: u32,
}

impl System for FrameCounter {
    fn on_tick(&mut self, _world: &mut World) {
        self.frames += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn main() -> EcsResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Sparse ECS - Fixed Timestep Example");
    println!("===================================\n");

    let mut world = WorldBuilder::new()
        .system(|_| Ok(FixedPhysics { steps: 0, last_alpha: 0.0 }))
        .system(|_| Ok(FrameCounter { frames: 0 }))
        .build()?;

    // Irregular frame times, as a real main loop would produce.
    for (frame, dt) in [0.016f32, 0.12, 0.03, 0.07, 0.2].into_iter().enumerate() {
        println!("frame {} (dt = {dt}s):", frame + 1);
        world.update(dt);
        let physics = world.system::<FixedPhysics>()?;
        println!("    alpha after frame: {:.2}", physics.last_alpha);
    }

    let physics = world.system::<FixedPhysics>()?;
    let frames = world.system::<FrameCounter>()?.frames;
    println!("\n{frames} frames produced {} fixed steps", physics.steps);

    world.dispose();
    Ok(())
}
