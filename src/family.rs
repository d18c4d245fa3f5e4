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
//! Reactive entity sets over component predicates
//!
//! A family caches the set of entities whose component mask satisfies a
//! composite predicate: all of `all_of`, none of `none_of`, and at least
//! one of `any_of`. Membership is recomputed lazily: structural mutations
//! mark families dirty, and the set is rebuilt the next time it is read or
//! iterated.

use std::any::{type_name, TypeId};

use crate::bag::Bag;
use crate::bits::BitArray;
use crate::component::ComponentService;
use crate::entity::{Entity, EntityService};
use crate::error::{EcsError, EcsResult};

/// Typed builder for a family predicate.
///
/// At least one bucket must name a component type; an entirely empty
/// predicate is rejected with [`EcsError::FamilyEmpty`] when the family is
/// created.
///
/// # Examples
///
/// ```no_run
/// use sparse_ecs::FamilyDef;
///
/// # #[derive(Default)] struct Position; #[derive(Default)] struct Velocity;
/// # #[derive(Default)] struct Frozen;
/// let def = FamilyDef::new()
///     .all::<Position>()
///     .all::<Velocity>()
///     .none::<Frozen>();
/// ```
#[derive(Debug, Clone, Default)]
pub struct FamilyDef {
    all: Vec<(TypeId, &'static str)>,
    none: Vec<(TypeId, &'static str)>,
    any: Vec<(TypeId, &'static str)>,
}

impl FamilyDef {
    /// Start an empty predicate.
    pub fn new() -> Self {
        FamilyDef::default()
    }

    /// Require component `T` to be present.
    pub fn all<T: 'static>(mut self) -> Self {
        self.all.push((TypeId::of::<T>(), type_name::<T>()));
        self
    }

    /// Require component `T` to be absent.
    pub fn none<T: 'static>(mut self) -> Self {
        self.none.push((TypeId::of::<T>(), type_name::<T>()));
        self
    }

    /// Require at least one of the `any`-bucket components to be present.
    pub fn any<T: 'static>(mut self) -> Self {
        self.any.push((TypeId::of::<T>(), type_name::<T>()));
        self
    }

    fn is_unconstrained(&self) -> bool {
        self.all.is_empty() && self.none.is_empty() && self.any.is_empty()
    }

    fn resolve(&self, components: &ComponentService) -> EcsResult<(BitArray, BitArray, BitArray)> {
        let resolve_bucket = |bucket: &[(TypeId, &'static str)]| -> EcsResult<BitArray> {
            let mut bits = BitArray::new();
            for &(key, name) in bucket {
                bits.set(components.id_by_type(key, name)? as u32);
            }
            Ok(bits)
        };
        Ok((
            resolve_bucket(&self.all)?,
            resolve_bucket(&self.none)?,
            resolve_bucket(&self.any)?,
        ))
    }
}

/// Token referring to a family owned by a world. Cheap to copy; obtained
/// from [`World::family`](crate::World::family) or
/// [`SystemContext::family`](crate::SystemContext::family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyHandle(usize);

impl FamilyHandle {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Cached set of entities matching a component predicate.
pub(crate) struct Family {
    all: BitArray,
    none: BitArray,
    any: BitArray,
    members: BitArray,
    member_list: Bag<Entity>,
    dirty: bool,
}

impl Family {
    fn new(all: BitArray, none: BitArray, any: BitArray) -> Self {
        Family {
            all,
            none,
            any,
            members: BitArray::new(),
            member_list: Bag::new(),
            // Starts dirty so the first read picks up pre-existing entities.
            dirty: true,
        }
    }

    pub(crate) fn matches(&self, mask: &BitArray) -> bool {
        predicate_matches(&self.all, &self.none, &self.any, mask)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuild membership by re-testing every active entity, if a mutation
    /// has happened since the last rebuild. The member list comes out in
    /// ascending id order.
    pub(crate) fn update_if_dirty(&mut self, entities: &EntityService) {
        if !self.dirty {
            return;
        }
        let Family { all, none, any, members, member_list, dirty } = self;
        members.clear_all();
        member_list.clear();
        entities.for_each_active(|id| {
            if let Some(mask) = entities.mask_at(id) {
                if predicate_matches(all, none, any, mask) {
                    members.set(id);
                    member_list.add(Entity::new(id));
                }
            }
        });
        *dirty = false;
    }

    pub(crate) fn contains(&self, entity: Entity) -> bool {
        self.members.get(entity.id())
    }

    pub(crate) fn len(&self) -> usize {
        self.member_list.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Entity> {
        self.member_list.as_slice().to_vec()
    }

    fn same_predicate(&self, all: &BitArray, none: &BitArray, any: &BitArray) -> bool {
        self.all == *all && self.none == *none && self.any == *any
    }
}

fn predicate_matches(all: &BitArray, none: &BitArray, any: &BitArray, mask: &BitArray) -> bool {
    (all.is_empty() || mask.contains(all))
        && (none.is_empty() || !mask.intersects(none))
        && (any.is_empty() || mask.intersects(any))
}

/// Find or create the family for `def`, deduplicating by predicate
/// equality.
pub(crate) fn family_handle(
    families: &mut Vec<Family>,
    components: &ComponentService,
    def: &FamilyDef,
) -> EcsResult<FamilyHandle> {
    if def.is_unconstrained() {
        return Err(EcsError::FamilyEmpty);
    }
    let (all, none, any) = def.resolve(components)?;

    if let Some(index) = families
        .iter()
        .position(|f| f.same_predicate(&all, &none, &any))
    {
        return Ok(FamilyHandle(index));
    }

    tracing::debug!(index = families.len(), "family created");
    families.push(Family::new(all, none, any));
    Ok(FamilyHandle(families.len() - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentService;

    #[derive(Debug, Default)]
    struct A;
    #[derive(Debug, Default)]
    struct B;
    #[derive(Debug, Default)]
    struct C;

    fn components() -> ComponentService {
        let mut service = ComponentService::new(4);
        service.register_with(A::default).unwrap(); // id 0
        service.register_with(B::default).unwrap(); // id 1
        service.register_with(C::default).unwrap(); // id 2
        service
    }

    fn mask(bits: &[u32]) -> BitArray {
        let mut mask = BitArray::new();
        for &b in bits {
            mask.set(b);
        }
        mask
    }

    #[test]
    fn test_empty_predicate_rejected() {
        let components = components();
        let mut families = Vec::new();
        let err = family_handle(&mut families, &components, &FamilyDef::new()).unwrap_err();
        assert_eq!(err, EcsError::FamilyEmpty);
    }

    #[test]
    fn test_unregistered_type_rejected() {
        let components = ComponentService::new(4);
        let mut families = Vec::new();
        let def = FamilyDef::new().all::<A>();
        let err = family_handle(&mut families, &components, &def).unwrap_err();
        assert!(matches!(err, EcsError::NoSuchComponent(_)));
    }

    #[test]
    fn test_predicate_truth_table() {
        let components = components();
        let mut families = Vec::new();
        let def = FamilyDef::new().all::<A>().none::<B>().any::<C>();
        let handle = family_handle(&mut families, &components, &def).unwrap();
        let family = &families[handle.index()];

        assert!(family.matches(&mask(&[0, 2])));
        assert!(!family.matches(&mask(&[0])), "any bucket unmet");
        assert!(!family.matches(&mask(&[0, 1, 2])), "none bucket violated");
        assert!(!family.matches(&mask(&[2])), "all bucket unmet");
    }

    #[test]
    fn test_all_only_predicate() {
        let components = components();
        let mut families = Vec::new();
        let def = FamilyDef::new().all::<A>().all::<B>();
        let handle = family_handle(&mut families, &components, &def).unwrap();
        let family = &families[handle.index()];

        assert!(family.matches(&mask(&[0, 1])));
        assert!(family.matches(&mask(&[0, 1, 2])));
        assert!(!family.matches(&mask(&[0])));
        assert!(!family.matches(&mask(&[])));
    }

    #[test]
    fn test_families_deduplicated_by_predicate() {
        let components = components();
        let mut families = Vec::new();

        let first = family_handle(
            &mut families,
            &components,
            &FamilyDef::new().all::<A>().none::<B>(),
        )
        .unwrap();
        // Same predicate, different construction order of buckets.
        let second = family_handle(
            &mut families,
            &components,
            &FamilyDef::new().none::<B>().all::<A>(),
        )
        .unwrap();
        let third =
            family_handle(&mut families, &components, &FamilyDef::new().all::<A>()).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(families.len(), 2);
    }
}
