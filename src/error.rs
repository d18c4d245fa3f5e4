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
//! Error types for world construction and entity/component operations
//!
//! All fallible operations in the crate return [`EcsResult`]. Each variant
//! carries the offending identifier (type name, entity handle, or injectable
//! name) so failures are actionable without a debugger attached.

use crate::entity::Entity;
use thiserror::Error;

/// Errors that can occur while building or operating on a world.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A component type was registered twice with the same world.
    #[error("component type '{0}' is already registered")]
    ComponentAlreadyAdded(&'static str),

    /// A mapper or family referenced a component type that was never
    /// registered with the world.
    #[error("component type '{0}' is not registered")]
    NoSuchComponent(&'static str),

    /// A component removal targeted an entity that does not carry that
    /// component.
    #[error("{entity} has no '{type_name}' component")]
    NoSuchEntityComponent {
        /// Name of the missing component type.
        type_name: &'static str,
        /// The entity the removal targeted.
        entity: Entity,
    },

    /// A system type was added twice to the same world.
    #[error("system '{0}' is already registered")]
    SystemAlreadyAdded(&'static str),

    /// A system lookup found no system of the requested type.
    #[error("no system of type '{0}'")]
    NoSuchSystem(&'static str),

    /// A family predicate was built with all three buckets empty. Such a
    /// family would match every entity; it is rejected at construction.
    #[error("family predicate is empty: allOf, noneOf and anyOf are all unset")]
    FamilyEmpty,

    /// An internal component removal addressed a slot past the end of the
    /// mapper's storage.
    #[error("{0} is out of bounds for component storage")]
    IndexOutOfBounds(Entity),

    /// No injectable with the given name (and requested type) was provided
    /// to the world builder.
    #[error("no injectable named '{0}' with the requested type")]
    InjectableNotFound(String),
}

/// Result type for world operations.
pub type EcsResult<T> = Result<T, EcsError>;
