//! # Sparse ECS
//!
//! A sparse-set Entity-Component-System runtime for games and simulations.
//! Per-entity data lives in densely packed, component-indexed arrays, and
//! behavior is driven by systems iterating over families: cached sets of
//! entities matching declarative component predicates.
//!
//! ## Features
//!
//! - **Dense component storage**: one growable array per component type,
//!   indexed by entity id, with add/remove listeners
//! - **Reactive families**: `(all, none, any)` predicates kept consistent
//!   incrementally as entities mutate
//! - **Deterministic scheduling**: systems tick in registration order, per
//!   frame or on a fixed timestep, with structural mutations deferred
//!   during iteration
//!
//! ## Example
//!
//! ```rust
//! use sparse_ecs::WorldBuilder;
//!
//! #[derive(Default)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut world = WorldBuilder::new().register::<Position>().build().unwrap();
//! let entity = world.entity(|e| e.add::<Position>(|p| p.x = 5.0)).unwrap();
//! assert_eq!(world.mapper::<Position>().unwrap().get(entity).unwrap().x, 5.0);
//! ```

#![warn(missing_docs)]

/// Dense growable containers
pub mod bag;
/// Compact growable bitsets
pub mod bits;
/// Component storage and the mapper registry
pub mod component;
/// Entity handles and the entity service
pub mod entity;
/// Error types
pub mod error;
/// Reactive entity sets over component predicates
pub mod family;
/// System traits and per-tick execution
pub mod system;
/// The world façade and its builder
pub mod world;

pub use bag::Bag;
pub use bits::BitArray;
pub use component::{ComponentListener, ComponentMapper, ListenerId};
pub use entity::{Entity, EntityEdit};
pub use error::{EcsError, EcsResult};
pub use family::{FamilyDef, FamilyHandle};
pub use system::{Interval, IteratingSystem, System, SystemService};
pub use world::{SystemContext, World, WorldBuilder};
