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
//! Basic example demonstrating the world lifecycle
//!
//! This example builds a world with two component types and an iterating
//! movement system, spawns a few entities, and steps the simulation.

use sparse_ecs::{
    EcsResult, Entity, FamilyDef, FamilyHandle, IteratingSystem, World, WorldBuilder,
};

#[derive(Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Default)]
struct Frozen;

/// Applies velocity to position for every moving entity.
struct Movement {
    family: FamilyHandle,
}

impl IteratingSystem for Movement {
    fn family(&self) -> FamilyHandle {
        self.family
    }

    fn on_tick_entity(&mut self, world: &mut World, entity: Entity) {
        let (dx, dy) = {
            let vel = world.mapper::<Velocity>().unwrap().get(entity).unwrap();
            (vel.dx, vel.dy)
        };
        let dt = world.delta_time();
        let pos = world.mapper_mut::<Position>().unwrap().get_mut(entity).unwrap();
        pos.x += dx * dt;
        pos.y += dy * dt;
    }
}

fn main() -> EcsResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Sparse ECS - Basic Example");
    println!("==========================\n");

    let mut world = WorldBuilder::new()
        .entity_capacity(64)
        .register::<Position>()
        .register::<Velocity>()
        .register::<Frozen>()
        .system(|cx| {
            let family = cx.family(
                &FamilyDef::new()
                    .all::<Position>()
                    .all::<Velocity>()
                    .none::<Frozen>(),
            )?;
            Ok(Movement { family })
        })
        .build()?;

    let runner = world.entity(|e| {
        e.add::<Position>(|p| p.x = 0.0)?;
        e.add::<Velocity>(|v| v.dx = 2.0)
    })?;
    let drifter = world.entity(|e| {
        e.add::<Position>(|p| p.y = 10.0)?;
        e.add::<Velocity>(|v| v.dy = -1.0)
    })?;
    let statue = world.entity(|e| {
        e.add::<Position>(|p| p.x = 5.0)?;
        e.add::<Velocity>(|v| v.dx = 99.0)?;
        e.add::<Frozen>(|_| {})
    })?;

    println!("Spawned {} entities: {runner}, {drifter}, {statue}", world.num_entities());

    for frame in 1..=3 {
        world.update(0.5);
        println!("\nAfter frame {frame}:");
        let positions = world.mapper::<Position>()?;
        world.for_each(|e| {
            if let Some(pos) = positions.get_opt(e) {
                println!("  {e}: ({:.1}, {:.1})", pos.x, pos.y);
            }
        });
    }

    // The statue never moved: the movement family excludes Frozen.
    assert_eq!(world.mapper::<Position>()?.get(statue)?.x, 5.0);

    world.remove(drifter);
    println!("\nRemoved {drifter}; {} entities remain", world.num_entities());

    world.dispose();
    println!("World disposed");
    Ok(())
}
