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
//! System traits and the per-tick execution service
//!
//! Systems hold the behavior of a world and run in registration order on
//! every [`World::update`](crate::World::update). A system either ticks on
//! every frame or on a fixed timestep driven by an accumulator; iterating
//! systems additionally bind to a family and receive each member entity
//! per tick.

use std::any::{type_name, Any, TypeId};

use crate::entity::{Entity, EntityEdit};
use crate::error::{EcsError, EcsResult};
use crate::family::FamilyHandle;
use crate::world::World;

/// How often a system ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    /// Tick once per world update.
    EachFrame,
    /// Tick on a fixed timestep, decoupled from the update rate. The
    /// service accumulates `delta_time` and ticks the system once per
    /// elapsed `step`.
    Fixed {
        /// Step length in seconds.
        step: f32,
    },
}

/// A unit of per-tick behavior.
///
/// Systems are registered with the world builder and executed in
/// registration order. The fixed-timestep accumulator and the enabled flag
/// live in the world's system service, not in the system itself.
///
/// Types implementing [`IteratingSystem`] receive this trait through a
/// blanket implementation and must not implement it directly.
pub trait System: 'static {
    /// The tick cadence; captured once at registration.
    fn interval(&self) -> Interval {
        Interval::EachFrame
    }

    /// Called once per tick (once per update for
    /// [`Interval::EachFrame`], once per accumulated step for
    /// [`Interval::Fixed`]).
    fn on_tick(&mut self, world: &mut World);

    /// Called once per world update after ticking, with the interpolation
    /// fraction `accumulator / step`. Only invoked for fixed-interval
    /// systems.
    fn on_alpha(&mut self, world: &mut World, alpha: f32) {
        let _ = (world, alpha);
    }

    /// Called on world shutdown, in reverse registration order.
    fn on_dispose(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Upcast for typed lookup via [`World::system`](crate::World::system).
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed lookup.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A system bound to one family, ticked once per member entity.
///
/// A blanket implementation turns any `IteratingSystem` into a [`System`]
/// whose tick iterates the family with deferred structural mutation, so
/// member entities may be removed mid-iteration.
pub trait IteratingSystem: 'static {
    /// The family this system iterates; bound at construction via
    /// [`SystemContext::family`](crate::SystemContext::family).
    fn family(&self) -> FamilyHandle;

    /// The tick cadence; defaults to every frame.
    fn interval(&self) -> Interval {
        Interval::EachFrame
    }

    /// Called for each entity in the family, in ascending id order over
    /// the snapshot taken at iteration start.
    fn on_tick_entity(&mut self, world: &mut World, entity: Entity);

    /// See [`System::on_alpha`].
    fn on_alpha(&mut self, world: &mut World, alpha: f32) {
        let _ = (world, alpha);
    }

    /// See [`System::on_dispose`].
    fn on_dispose(&mut self, world: &mut World) {
        let _ = world;
    }

    /// Reconfigure an entity (add/remove components) from inside a tick.
    fn configure_entity<F>(&self, world: &mut World, entity: Entity, configure: F) -> EcsResult<()>
    where
        F: FnOnce(&mut EntityEdit<'_>) -> EcsResult<()>,
        Self: Sized,
    {
        world.configure(entity, configure)
    }
}

impl<S: IteratingSystem> System for S {
    fn interval(&self) -> Interval {
        IteratingSystem::interval(self)
    }

    fn on_tick(&mut self, world: &mut World) {
        let family = self.family();
        world.family_for_each(family, |world, entity| self.on_tick_entity(world, entity));
    }

    fn on_alpha(&mut self, world: &mut World, alpha: f32) {
        IteratingSystem::on_alpha(self, world, alpha);
    }

    fn on_dispose(&mut self, world: &mut World) {
        IteratingSystem::on_dispose(self, world);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registered system with its scheduling state. The slot is vacated
/// while the system runs so the world can be borrowed mutably alongside.
struct SystemEntry {
    system: Option<Box<dyn System>>,
    type_id: TypeId,
    type_name: &'static str,
    enabled: bool,
    interval: Interval,
    accumulator: f32,
}

/// A system temporarily taken out of its service slot for execution.
pub(crate) struct RunningSystem {
    pub(crate) system: Box<dyn System>,
    pub(crate) interval: Interval,
    pub(crate) accumulator: f32,
}

/// Ordered collection of systems; the world's per-tick driver walks it in
/// registration order.
pub struct SystemService {
    entries: Vec<SystemEntry>,
}

impl SystemService {
    pub(crate) fn new() -> Self {
        SystemService { entries: Vec::new() }
    }

    pub(crate) fn add(
        &mut self,
        system: Box<dyn System>,
        type_id: TypeId,
        type_name: &'static str,
        interval: Interval,
    ) -> EcsResult<()> {
        if self.entries.iter().any(|e| e.type_id == type_id) {
            return Err(EcsError::SystemAlreadyAdded(type_name));
        }
        tracing::debug!(system = type_name, ?interval, "system registered");
        self.entries.push(SystemEntry {
            system: Some(system),
            type_id,
            type_name,
            enabled: true,
            interval,
            accumulator: 0.0,
        });
        Ok(())
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no system is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vacate slot `index` for execution; `None` if the system is disabled
    /// or already running.
    pub(crate) fn take_for_run(&mut self, index: usize) -> Option<RunningSystem> {
        let entry = self.entries.get_mut(index)?;
        if !entry.enabled {
            return None;
        }
        Some(RunningSystem {
            system: entry.system.take()?,
            interval: entry.interval,
            accumulator: entry.accumulator,
        })
    }

    /// Vacate slot `index` regardless of the enabled flag (used during
    /// shutdown).
    pub(crate) fn take_any(&mut self, index: usize) -> Option<Box<dyn System>> {
        self.entries.get_mut(index)?.system.take()
    }

    pub(crate) fn restore(&mut self, index: usize, running: RunningSystem) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.system = Some(running.system);
            entry.accumulator = running.accumulator;
        }
    }

    /// Borrow the single system of type `S`.
    pub fn system<S: System>(&self) -> EcsResult<&S> {
        self.entries
            .iter()
            .find(|e| e.type_id == TypeId::of::<S>())
            .and_then(|e| e.system.as_ref())
            .and_then(|boxed| boxed.as_any().downcast_ref())
            .ok_or(EcsError::NoSuchSystem(type_name::<S>()))
    }

    /// Mutably borrow the single system of type `S`.
    pub fn system_mut<S: System>(&mut self) -> EcsResult<&mut S> {
        self.entries
            .iter_mut()
            .find(|e| e.type_id == TypeId::of::<S>())
            .and_then(|e| e.system.as_mut())
            .and_then(|boxed| boxed.as_any_mut().downcast_mut())
            .ok_or(EcsError::NoSuchSystem(type_name::<S>()))
    }

    /// Enable or disable the system of type `S`. Disabled systems are
    /// skipped by the driver but still disposed on shutdown.
    pub fn set_enabled<S: System>(&mut self, enabled: bool) -> EcsResult<()> {
        self.entries
            .iter_mut()
            .find(|e| e.type_id == TypeId::of::<S>())
            .map(|e| e.enabled = enabled)
            .ok_or(EcsError::NoSuchSystem(type_name::<S>()))
    }

    /// Check whether the system of type `S` is enabled.
    pub fn is_enabled<S: System>(&self) -> EcsResult<bool> {
        self.entries
            .iter()
            .find(|e| e.type_id == TypeId::of::<S>())
            .map(|e| e.enabled)
            .ok_or(EcsError::NoSuchSystem(type_name::<S>()))
    }

    pub(crate) fn dispose_log(&self, index: usize) {
        if let Some(entry) = self.entries.get(index) {
            tracing::debug!(system = entry.type_name, "system disposed");
        }
    }
}
