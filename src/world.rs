//! World management
//!
//! The [`World`] is the central container composing the entity service, the
//! component registry, families, and the system service. Worlds are built
//! through [`WorldBuilder`]; registration order defines component ids and
//! system execution order.

use std::any::{type_name, Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use crate::component::{ComponentListener, ComponentMapper, ComponentService};
use crate::entity::{Entity, EntityEdit, EntityService};
use crate::error::{EcsError, EcsResult};
use crate::family::{family_handle, Family, FamilyDef, FamilyHandle};
use crate::system::{Interval, System, SystemService};

const DEFAULT_ENTITY_CAPACITY: usize = 512;

/// The main ECS container.
///
/// A world owns its entities, component storage, families, and systems,
/// and is driven by calling [`update`](World::update) once per frame.
/// All operations are synchronous and single-threaded; a world is owned
/// by one thread for its lifetime.
pub struct World {
    delta_time: f32,
    entities: EntityService,
    families: Vec<Family>,
    systems: SystemService,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World").finish_non_exhaustive()
    }
}

impl World {
    /// Start building a world.
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    /// Advance the world by `delta_time` seconds: run every enabled system
    /// in registration order. Fixed-interval systems accumulate time and
    /// tick once per elapsed step, then receive the interpolation alpha.
    pub fn update(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        for index in 0..self.systems.len() {
            let Some(mut running) = self.systems.take_for_run(index) else {
                continue;
            };
            match running.interval {
                Interval::EachFrame => running.system.on_tick(self),
                Interval::Fixed { step } => {
                    debug_assert!(step > 0.0, "fixed interval step must be positive");
                    running.accumulator += delta_time;
                    while step > 0.0 && running.accumulator >= step {
                        running.system.on_tick(self);
                        running.accumulator -= step;
                    }
                    let alpha = if step > 0.0 { running.accumulator / step } else { 0.0 };
                    running.system.on_alpha(self, alpha);
                }
            }
            self.systems.restore(index, running);
        }
    }

    /// The delta time of the update in progress (or the most recent one).
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Create an entity and configure it. The configure closure can attach
    /// components; families pick the entity up on their next refresh.
    ///
    /// Creation is immediate even while a family iteration is running;
    /// only removals are deferred.
    pub fn entity<F>(&mut self, configure: F) -> EcsResult<Entity>
    where
        F: FnOnce(&mut EntityEdit<'_>) -> EcsResult<()>,
    {
        let created = self.entities.create(configure);
        // A failing configure closure may still have attached components.
        self.mark_families_dirty();
        created
    }

    /// Reconfigure an existing entity (attach or detach components).
    pub fn configure<F>(&mut self, entity: Entity, configure: F) -> EcsResult<()>
    where
        F: FnOnce(&mut EntityEdit<'_>) -> EcsResult<()>,
    {
        let configured = self.entities.configure(entity, configure);
        self.mark_families_dirty();
        configured
    }

    /// Remove an entity, detaching all of its components (listeners fire)
    /// and recycling its id. During a family iteration the removal is
    /// deferred until the outermost iteration exits. Removing an inactive
    /// entity is a no-op.
    pub fn remove(&mut self, entity: Entity) {
        self.entities.remove(entity);
        self.mark_families_dirty();
    }

    /// Remove every entity in the world.
    pub fn remove_all(&mut self) {
        self.entities.remove_all();
        self.mark_families_dirty();
    }

    /// Visit every live entity in ascending id order.
    pub fn for_each(&self, f: impl FnMut(Entity)) {
        self.entities.for_each(f);
    }

    /// Check whether `entity` is currently live.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.is_active(entity)
    }

    /// Number of live entities.
    pub fn num_entities(&self) -> usize {
        self.entities.num_entities()
    }

    /// Current size of the backing storage (grows on demand).
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Borrow the component mapper for `T` (read access).
    pub fn mapper<T: 'static>(&self) -> EcsResult<&ComponentMapper<T>> {
        self.entities.components().mapper::<T>()
    }

    /// Mutably borrow the component mapper for `T`, for in-place value
    /// mutation and listener management. Attaching and detaching components
    /// goes through [`entity`](World::entity) / [`configure`](World::configure)
    /// so the entity's mask and family membership stay consistent.
    pub fn mapper_mut<T: 'static>(&mut self) -> EcsResult<&mut ComponentMapper<T>> {
        self.entities.components_mut().mapper_mut::<T>()
    }

    /// Borrow the single system of type `S`. Fails while `S` itself is
    /// ticking (its slot is vacated for the duration of the tick).
    pub fn system<S: System>(&self) -> EcsResult<&S> {
        self.systems.system::<S>()
    }

    /// Mutably borrow the single system of type `S`.
    pub fn system_mut<S: System>(&mut self) -> EcsResult<&mut S> {
        self.systems.system_mut::<S>()
    }

    /// Enable or disable the system of type `S`.
    pub fn set_system_enabled<S: System>(&mut self, enabled: bool) -> EcsResult<()> {
        self.systems.set_enabled::<S>(enabled)
    }

    /// Find or create the family for `def`. Families are deduplicated by
    /// predicate equality and live for the world's lifetime.
    pub fn family(&mut self, def: &FamilyDef) -> EcsResult<FamilyHandle> {
        family_handle(&mut self.families, self.entities.components(), def)
    }

    /// Iterate the family's entities in ascending id order.
    ///
    /// Membership is refreshed before iteration and then snapshotted, so
    /// structural changes made by `visit` (entity creation/removal,
    /// component attach/detach) become observable only after the outermost
    /// iteration exits; entity removals are queued and applied at that
    /// point. Nested iteration of the same or another family is permitted.
    /// The deferral is released and drained exactly once even if `visit`
    /// panics.
    pub fn family_for_each<F>(&mut self, handle: FamilyHandle, mut visit: F)
    where
        F: FnMut(&mut World, Entity),
    {
        let snapshot = {
            let Some(family) = self.families.get_mut(handle.index()) else {
                return;
            };
            family.update_if_dirty(&self.entities);
            family.snapshot()
        };

        self.entities.begin_deferral();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            for &entity in &snapshot {
                visit(self, entity);
            }
        }));
        let drained = self.entities.end_deferral();
        if drained > 0 {
            self.mark_families_dirty();
        }
        if let Err(payload) = outcome {
            resume_unwind(payload);
        }
    }

    /// Number of entities currently matching the family.
    pub fn family_size(&mut self, handle: FamilyHandle) -> usize {
        match self.families.get_mut(handle.index()) {
            Some(family) => {
                family.update_if_dirty(&self.entities);
                family.len()
            }
            None => 0,
        }
    }

    /// `true` if no entity matches the family.
    pub fn family_is_empty(&mut self, handle: FamilyHandle) -> bool {
        self.family_size(handle) == 0
    }

    /// Check whether `entity` currently matches the family.
    pub fn family_contains(&mut self, handle: FamilyHandle, entity: Entity) -> bool {
        match self.families.get_mut(handle.index()) {
            Some(family) => {
                family.update_if_dirty(&self.entities);
                family.contains(entity)
            }
            None => false,
        }
    }

    /// Shut the world down: dispose systems in reverse registration order
    /// (enabled or not), then remove every entity, firing listeners.
    pub fn dispose(mut self) {
        for index in (0..self.systems.len()).rev() {
            if let Some(mut system) = self.systems.take_any(index) {
                system.on_dispose(&mut self);
                self.systems.dispose_log(index);
            }
        }
        self.remove_all();
    }

    fn mark_families_dirty(&mut self) {
        for family in &mut self.families {
            family.mark_dirty();
        }
    }
}

/// Named injectables made available to system factories during world
/// construction. Values are stored type-erased and looked up by name and
/// type; each read marks the entry as used, and entries never read produce
/// a warning when the build finishes.
struct Injections {
    entries: HashMap<String, InjectEntry>,
}

struct InjectEntry {
    value: Box<dyn Any>,
    used: Cell<bool>,
}

impl Injections {
    fn new() -> Self {
        Injections { entries: HashMap::new() }
    }

    fn add(&mut self, name: String, value: Box<dyn Any>) {
        if self
            .entries
            .insert(name.clone(), InjectEntry { value, used: Cell::new(false) })
            .is_some()
        {
            tracing::debug!(name = name.as_str(), "injectable overwritten");
        }
    }

    fn get<T: 'static>(&self, name: &str) -> EcsResult<&T> {
        self.entries
            .get(name)
            .and_then(|entry| {
                entry.used.set(true);
                entry.value.downcast_ref::<T>()
            })
            .ok_or_else(|| EcsError::InjectableNotFound(name.to_string()))
    }

    fn warn_unused(&self) {
        for (name, entry) in &self.entries {
            if !entry.used.get() {
                tracing::warn!(name = name.as_str(), "injectable was never used");
            }
        }
    }
}

/// Construction context handed to system factories: named injectables and
/// family creation.
pub struct SystemContext<'a> {
    injections: &'a Injections,
    families: &'a mut Vec<Family>,
    components: &'a ComponentService,
}

impl SystemContext<'_> {
    /// Look up the injectable registered under `name` with type `T`.
    pub fn inject<T: 'static>(&self, name: &str) -> EcsResult<&T> {
        self.injections.get(name)
    }

    /// Find or create the family for `def`, for the system under
    /// construction to iterate.
    pub fn family(&mut self, def: &FamilyDef) -> EcsResult<FamilyHandle> {
        family_handle(self.families, self.components, def)
    }
}

type Registration = Box<dyn FnOnce(&mut ComponentService) -> EcsResult<()>>;
type SystemFactory =
    Box<dyn FnOnce(&mut SystemContext<'_>) -> EcsResult<(Box<dyn System>, TypeId, &'static str)>>;

/// Builder assembling a [`World`].
///
/// Component registration order defines component ids; system registration
/// order defines execution order.
///
/// # Examples
///
/// ```
/// use sparse_ecs::{
///     EcsResult, Entity, FamilyDef, FamilyHandle, IteratingSystem, World, WorldBuilder,
/// };
///
/// #[derive(Default)]
/// struct Position { x: f32 }
/// #[derive(Default)]
/// struct Velocity { dx: f32 }
///
/// struct Movement { family: FamilyHandle }
///
/// impl IteratingSystem for Movement {
///     fn family(&self) -> FamilyHandle {
///         self.family
///     }
///
///     fn on_tick_entity(&mut self, world: &mut World, entity: Entity) {
///         let dx = world.mapper::<Velocity>().unwrap().get(entity).unwrap().dx;
///         let dt = world.delta_time();
///         world.mapper_mut::<Position>().unwrap().get_mut(entity).unwrap().x += dx * dt;
///     }
/// }
///
/// fn main() -> EcsResult<()> {
///     let mut world = WorldBuilder::new()
///         .entity_capacity(64)
///         .register::<Position>()
///         .register::<Velocity>()
///         .system(|cx| {
///             let family = cx.family(&FamilyDef::new().all::<Position>().all::<Velocity>())?;
///             Ok(Movement { family })
///         })
///         .build()?;
///
///     let e = world.entity(|e| {
///         e.add::<Position>(|p| p.x = 1.0)?;
///         e.add::<Velocity>(|v| v.dx = 2.0)
///     })?;
///
///     world.update(0.5);
///     assert_eq!(world.mapper::<Position>()?.get(e)?.x, 2.0);
///     Ok(())
/// }
/// ```
pub struct WorldBuilder {
    entity_capacity: usize,
    registrations: Vec<Registration>,
    listener_hooks: Vec<Registration>,
    system_factories: Vec<SystemFactory>,
    injections: Injections,
}

impl WorldBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        WorldBuilder {
            entity_capacity: DEFAULT_ENTITY_CAPACITY,
            registrations: Vec::new(),
            listener_hooks: Vec::new(),
            system_factories: Vec::new(),
            injections: Injections::new(),
        }
    }

    /// Initial size of the backing arrays (default 512). Storage still
    /// grows on demand past this.
    pub fn entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Register component type `T` using `T::default` as its factory.
    /// Registration order assigns the component id.
    pub fn register<T: Default + 'static>(self) -> Self {
        self.register_with(T::default)
    }

    /// Register component type `T` with an explicit factory.
    pub fn register_with<T: 'static>(mut self, factory: impl Fn() -> T + 'static) -> Self {
        self.registrations
            .push(Box::new(move |components| components.register_with(factory).map(|_| ())));
        self
    }

    /// Attach a listener to component type `T`. The type must also be
    /// registered, in any order; listeners attach after all registrations.
    pub fn listener<T: 'static>(mut self, listener: impl ComponentListener<T>) -> Self {
        self.listener_hooks.push(Box::new(move |components| {
            components.mapper_mut::<T>()?.add_listener(Box::new(listener));
            Ok(())
        }));
        self
    }

    /// Provide a named injectable to system factories.
    pub fn inject<V: Any>(mut self, name: impl Into<String>, value: V) -> Self {
        self.injections.add(name.into(), Box::new(value));
        self
    }

    /// Add a system built by `factory` at [`build`](WorldBuilder::build)
    /// time. Factories run in registration order, which is also the
    /// execution order; each receives a [`SystemContext`] for injectables
    /// and family creation.
    pub fn system<S, F>(mut self, factory: F) -> Self
    where
        S: System,
        F: FnOnce(&mut SystemContext<'_>) -> EcsResult<S> + 'static,
    {
        self.system_factories.push(Box::new(move |cx| {
            let system = factory(cx)?;
            Ok((Box::new(system) as Box<dyn System>, TypeId::of::<S>(), type_name::<S>()))
        }));
        self
    }

    /// Assemble the world: register components, attach listeners, run the
    /// system factories, and warn about injectables nothing used.
    pub fn build(self) -> EcsResult<World> {
        let WorldBuilder {
            entity_capacity,
            registrations,
            listener_hooks,
            system_factories,
            injections,
        } = self;

        let mut components = ComponentService::new(entity_capacity);
        for registration in registrations {
            registration(&mut components)?;
        }
        for hook in listener_hooks {
            hook(&mut components)?;
        }

        let entities = EntityService::new(entity_capacity, components);
        let mut families: Vec<Family> = Vec::new();
        let mut systems = SystemService::new();
        {
            let mut cx = SystemContext {
                injections: &injections,
                families: &mut families,
                components: entities.components(),
            };
            for factory in system_factories {
                let (system, type_id, name) = factory(&mut cx)?;
                let interval = system.interval();
                systems.add(system, type_id, name, interval)?;
            }
        }
        injections.warn_unused();

        tracing::debug!(
            components = entities.components().len(),
            systems = systems.len(),
            families = families.len(),
            capacity = entity_capacity,
            "world constructed"
        );
        Ok(World {
            delta_time: 0.0,
            entities,
            families,
            systems,
        })
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}
