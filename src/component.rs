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
//! Component storage and the per-type mapper registry
//!
//! Every component type registered with a world gets a [`ComponentMapper`]:
//! a densely packed array indexed by entity id, plus the listeners notified
//! when components of that type are attached or detached. The
//! [`ComponentService`] owns one type-erased mapper per registered type and
//! assigns each a stable small-integer id in registration order.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::bits::BitArray;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Hooks invoked when a component of type `T` is attached to or detached
/// from an entity.
///
/// Listeners fire synchronously at the mutation site, in registration
/// order. `on_add` runs after the component is installed; `on_remove` runs
/// while the component is still in its slot.
pub trait ComponentListener<T>: 'static {
    /// Called after `component` was attached to `entity`.
    fn on_add(&mut self, entity: Entity, component: &T) {
        let _ = (entity, component);
    }

    /// Called before `component` is detached from `entity`.
    fn on_remove(&mut self, entity: Entity, component: &T) {
        let _ = (entity, component);
    }
}

/// Token identifying a registered listener, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

/// Densely packed store for one component type, indexed by entity id.
///
/// Slots grow by doubling whenever an entity id past the current length is
/// touched. Structural changes (attach/detach) go through the world's
/// entity-editing API so the entity's component mask stays in sync; the
/// mapper's public surface is read access, in-place value mutation, and
/// listener management.
pub struct ComponentMapper<T> {
    id: u16,
    slots: Vec<Option<T>>,
    factory: Box<dyn Fn() -> T>,
    listeners: Vec<(ListenerId, Box<dyn ComponentListener<T>>)>,
    next_listener_id: u32,
}

impl<T> std::fmt::Debug for ComponentMapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentMapper").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T: 'static> ComponentMapper<T> {
    pub(crate) fn new(id: u16, factory: Box<dyn Fn() -> T>, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        ComponentMapper {
            id,
            slots,
            factory,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// The stable id assigned to this component type at registration.
    pub fn component_id(&self) -> u16 {
        self.id
    }

    /// Attach a component to `entity`, building it from the registered
    /// factory and applying `configure` before it becomes visible.
    ///
    /// If the entity already carries the component, the slot is overwritten
    /// in place and listeners stay silent. Otherwise the component bit is
    /// set on `mask` and `on_add` listeners fire after installation.
    pub(crate) fn add(&mut self, entity: Entity, mask: &mut BitArray, configure: impl FnOnce(&mut T)) {
        let index = entity.id() as usize;
        self.ensure_slot(index);

        let mut value = (self.factory)();
        configure(&mut value);

        let occupied = self.slots[index].is_some();
        self.slots[index] = Some(value);
        if occupied {
            // In-place reconfiguration: no listener traffic.
            return;
        }

        mask.set(self.id as u32);
        if let Some(component) = &self.slots[index] {
            for (_, listener) in &mut self.listeners {
                listener.on_add(entity, component);
            }
        }
    }

    /// Detach the component from `entity`, firing `on_remove` listeners
    /// while the component is still in place, then clearing the slot and
    /// the component bit on `mask`.
    pub(crate) fn remove(&mut self, entity: Entity, mask: &mut BitArray) -> EcsResult<()> {
        let index = entity.id() as usize;
        if !matches!(self.slots.get(index), Some(Some(_))) {
            return Err(EcsError::NoSuchEntityComponent {
                type_name: type_name::<T>(),
                entity,
            });
        }

        if let Some(component) = &self.slots[index] {
            for (_, listener) in &mut self.listeners {
                listener.on_remove(entity, component);
            }
        }
        self.slots[index] = None;
        mask.clear(self.id as u32);
        Ok(())
    }

    /// Detach without an existence check and without touching the entity
    /// mask. Used while an entity is being torn down and its mask cleared
    /// in bulk. Fails only when the id addresses a slot past the end of
    /// storage.
    pub(crate) fn remove_internal(&mut self, entity: Entity) -> EcsResult<()> {
        let index = entity.id() as usize;
        if index >= self.slots.len() {
            return Err(EcsError::IndexOutOfBounds(entity));
        }

        if let Some(component) = &self.slots[index] {
            for (_, listener) in &mut self.listeners {
                listener.on_remove(entity, component);
            }
        }
        self.slots[index] = None;
        Ok(())
    }

    /// Borrow the component attached to `entity`.
    pub fn get(&self, entity: Entity) -> EcsResult<&T> {
        self.get_opt(entity).ok_or(EcsError::NoSuchEntityComponent {
            type_name: type_name::<T>(),
            entity,
        })
    }

    /// Borrow the component attached to `entity`, or `None`.
    pub fn get_opt(&self, entity: Entity) -> Option<&T> {
        self.slots.get(entity.id() as usize).and_then(Option::as_ref)
    }

    /// Mutably borrow the component attached to `entity` for in-place value
    /// mutation. Changes are observable immediately and never touch family
    /// membership.
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.slots
            .get_mut(entity.id() as usize)
            .and_then(Option::as_mut)
            .ok_or(EcsError::NoSuchEntityComponent {
                type_name: type_name::<T>(),
                entity,
            })
    }

    /// Check whether `entity` carries this component.
    pub fn contains(&self, entity: Entity) -> bool {
        matches!(self.slots.get(entity.id() as usize), Some(Some(_)))
    }

    /// Register a listener. Listeners fire in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn ComponentListener<T>>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Detach a previously registered listener. Returns `false` if the id
    /// is unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn ensure_slot(&mut self, index: usize) {
        if index >= self.slots.len() {
            let target = (self.slots.len() * 2).max(index + 1);
            self.slots.resize_with(target, || None);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Type-erased view of a [`ComponentMapper`], the seam that lets the
/// entity service tear components down by component id without knowing
/// their concrete type.
pub(crate) trait AnyMapper {
    fn component_id(&self) -> u16;
    fn type_name(&self) -> &'static str;
    fn remove_internal(&mut self, entity: Entity) -> EcsResult<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> AnyMapper for ComponentMapper<T> {
    fn component_id(&self) -> u16 {
        self.id
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn remove_internal(&mut self, entity: Entity) -> EcsResult<()> {
        ComponentMapper::remove_internal(self, entity)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registry of component mappers, one per registered type.
///
/// Component ids are assigned as the registry size at insertion and never
/// change afterwards; registration order is therefore semantically
/// significant for family predicates and mask layout.
pub struct ComponentService {
    by_type: HashMap<TypeId, usize>,
    mappers: Vec<Box<dyn AnyMapper>>,
    capacity: usize,
}

impl ComponentService {
    /// Create an empty registry; mappers pre-allocate `capacity` slots.
    pub(crate) fn new(capacity: usize) -> Self {
        ComponentService {
            by_type: HashMap::new(),
            mappers: Vec::new(),
            capacity,
        }
    }

    /// Register component type `T` with a factory producing its default
    /// value. The assigned id is the current registry size.
    pub(crate) fn register_with<T: 'static>(
        &mut self,
        factory: impl Fn() -> T + 'static,
    ) -> EcsResult<u16> {
        let key = TypeId::of::<T>();
        if self.by_type.contains_key(&key) {
            return Err(EcsError::ComponentAlreadyAdded(type_name::<T>()));
        }

        let id = self.mappers.len() as u16;
        self.by_type.insert(key, id as usize);
        self.mappers
            .push(Box::new(ComponentMapper::<T>::new(id, Box::new(factory), self.capacity)));
        tracing::debug!(component = type_name::<T>(), id, "component registered");
        Ok(id)
    }

    /// Look up the typed mapper for `T`.
    pub fn mapper<T: 'static>(&self) -> EcsResult<&ComponentMapper<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|&i| self.mappers[i].as_any().downcast_ref())
            .ok_or(EcsError::NoSuchComponent(type_name::<T>()))
    }

    /// Look up the typed mapper for `T`, mutably.
    pub fn mapper_mut<T: 'static>(&mut self) -> EcsResult<&mut ComponentMapper<T>> {
        let index = *self
            .by_type
            .get(&TypeId::of::<T>())
            .ok_or(EcsError::NoSuchComponent(type_name::<T>()))?;
        self.mappers[index]
            .as_any_mut()
            .downcast_mut()
            .ok_or(EcsError::NoSuchComponent(type_name::<T>()))
    }

    /// Look up a mapper by its stable component id.
    pub(crate) fn mapper_by_id(&mut self, id: u16) -> Option<&mut (dyn AnyMapper + '_)> {
        match self.mappers.get_mut(id as usize) {
            Some(m) => Some(m.as_mut()),
            None => None,
        }
    }

    /// The component id assigned to `T` at registration.
    pub fn id_of<T: 'static>(&self) -> EcsResult<u16> {
        self.id_by_type(TypeId::of::<T>(), type_name::<T>())
    }

    pub(crate) fn id_by_type(&self, key: TypeId, name: &'static str) -> EcsResult<u16> {
        self.by_type
            .get(&key)
            .map(|&i| i as u16)
            .ok_or(EcsError::NoSuchComponent(name))
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// `true` if no component type is registered.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default, PartialEq)]
    struct Health {
        points: i32,
    }

    #[derive(Debug, Default)]
    struct Stamina {
        points: i32,
    }

    fn service() -> ComponentService {
        let mut service = ComponentService::new(8);
        service.register_with(Health::default).unwrap();
        service.register_with(Stamina::default).unwrap();
        service
    }

    #[test]
    fn test_registration_assigns_sequential_ids() {
        let service = service();
        assert_eq!(service.id_of::<Health>().unwrap(), 0);
        assert_eq!(service.id_of::<Stamina>().unwrap(), 1);
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut service = service();
        let err = service.register_with(Health::default).unwrap_err();
        assert!(matches!(err, EcsError::ComponentAlreadyAdded(_)));
    }

    #[test]
    fn test_unregistered_lookup_fails() {
        let service = ComponentService::new(8);
        let err = service.mapper::<Health>().unwrap_err();
        assert_eq!(err, EcsError::NoSuchComponent(type_name::<Health>()));
    }

    #[test]
    fn test_add_and_get() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let entity = Entity::new(3);
        let mut mask = BitArray::new();

        mapper.add(entity, &mut mask, |h| h.points = 50);

        assert!(mapper.contains(entity));
        assert_eq!(mapper.get(entity).unwrap().points, 50);
        assert!(mask.get(0));
    }

    #[test]
    fn test_add_grows_by_doubling() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let mut mask = BitArray::new();

        assert_eq!(mapper.slot_count(), 8);
        mapper.add(Entity::new(8), &mut mask, |_| {});
        assert_eq!(mapper.slot_count(), 16);

        mapper.add(Entity::new(100), &mut mask, |_| {});
        assert_eq!(mapper.slot_count(), 101);
    }

    #[test]
    fn test_remove_missing_component_fails() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let entity = Entity::new(0);
        let mut mask = BitArray::new();

        let err = mapper.remove(entity, &mut mask).unwrap_err();
        assert_eq!(
            err,
            EcsError::NoSuchEntityComponent {
                type_name: type_name::<Health>(),
                entity,
            }
        );
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let entity = Entity::new(1);
        let mut mask = BitArray::new();

        mapper.add(entity, &mut mask, |h| h.points = 10);
        mapper.remove(entity, &mut mask).unwrap();

        assert!(!mapper.contains(entity));
        assert!(mask.is_empty());
        // A second removal is an error, not a silent no-op.
        assert!(mapper.remove(entity, &mut mask).is_err());
    }

    #[test]
    fn test_remove_internal_out_of_range() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let entity = Entity::new(10_000);

        let err = mapper.remove_internal(entity).unwrap_err();
        assert_eq!(err, EcsError::IndexOutOfBounds(entity));
    }

    #[test]
    fn test_remove_internal_skips_mask_and_existence_check() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();

        // Vacant but in-range slot: fine.
        mapper.remove_internal(Entity::new(2)).unwrap();
    }

    #[test]
    fn test_readd_overwrites_silently() {
        let mut service = service();
        let log = Rc::new(RefCell::new(Vec::new()));

        struct Recorder {
            log: Rc<RefCell<Vec<String>>>,
        }
        impl ComponentListener<Health> for Recorder {
            fn on_add(&mut self, _entity: Entity, component: &Health) {
                self.log.borrow_mut().push(format!("add {}", component.points));
            }
            fn on_remove(&mut self, _entity: Entity, component: &Health) {
                self.log.borrow_mut().push(format!("remove {}", component.points));
            }
        }

        let mapper = service.mapper_mut::<Health>().unwrap();
        mapper.add_listener(Box::new(Recorder { log: Rc::clone(&log) }));

        let entity = Entity::new(0);
        let mut mask = BitArray::new();
        mapper.add(entity, &mut mask, |h| h.points = 1);
        mapper.add(entity, &mut mask, |h| h.points = 2);

        assert_eq!(mapper.get(entity).unwrap().points, 2);
        assert_eq!(*log.borrow(), vec!["add 1".to_string()]);
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let mut service = service();
        let log = Rc::new(RefCell::new(Vec::new()));

        struct Tagged {
            tag: &'static str,
            log: Rc<RefCell<Vec<String>>>,
        }
        impl ComponentListener<Health> for Tagged {
            fn on_add(&mut self, entity: Entity, component: &Health) {
                self.log
                    .borrow_mut()
                    .push(format!("{}:add:{}:{}", self.tag, entity.id(), component.points));
            }
            fn on_remove(&mut self, entity: Entity, _component: &Health) {
                self.log.borrow_mut().push(format!("{}:remove:{}", self.tag, entity.id()));
            }
        }

        let mapper = service.mapper_mut::<Health>().unwrap();
        mapper.add_listener(Box::new(Tagged { tag: "first", log: Rc::clone(&log) }));
        let second = mapper.add_listener(Box::new(Tagged { tag: "second", log: Rc::clone(&log) }));

        let entity = Entity::new(4);
        let mut mask = BitArray::new();
        mapper.add(entity, &mut mask, |h| h.points = 9);

        assert_eq!(
            *log.borrow(),
            vec!["first:add:4:9".to_string(), "second:add:4:9".to_string()]
        );

        log.borrow_mut().clear();
        assert!(mapper.remove_listener(second));
        assert!(!mapper.remove_listener(second));

        mapper.remove(entity, &mut mask).unwrap();
        assert_eq!(*log.borrow(), vec!["first:remove:4".to_string()]);
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut service = service();
        let mapper = service.mapper_mut::<Health>().unwrap();
        let entity = Entity::new(0);
        let mut mask = BitArray::new();

        mapper.add(entity, &mut mask, |h| h.points = 5);
        mapper.get_mut(entity).unwrap().points += 10;
        assert_eq!(mapper.get(entity).unwrap().points, 15);
    }
}
