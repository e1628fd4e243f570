#![allow(private_interfaces)]

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use crate::component::{Component, ComponentIndex};
use crate::entity::Entity;

/// Memoized query results, keyed by a single tag or an ordered tag tuple.
///
/// Invalidation is lazy: mutations only set the dirty flag, and the stored
/// entries are wiped on the next read. The cache holds entity lists (the
/// intersection work); value references are materialized per call.
pub(crate) struct QueryCache {
    single: HashMap<TypeId, Vec<Entity>>,
    multi: HashMap<Box<[TypeId]>, Vec<Entity>>,
    dirty: bool,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            single: HashMap::new(),
            multi: HashMap::new(),
            dirty: false,
        }
    }

    /// Mark every stored result stale.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Drop all stored results immediately. Safe when nothing is cached.
    pub fn clear(&mut self) {
        self.single.clear();
        self.multi.clear();
        self.dirty = false;
    }

    fn sweep(&mut self) {
        if self.dirty {
            self.clear();
        }
    }

    pub fn single_or_insert_with(
        &mut self,
        tag: TypeId,
        compute: impl FnOnce() -> Vec<Entity>,
    ) -> &[Entity] {
        self.sweep();
        self.single.entry(tag).or_insert_with(compute)
    }

    pub fn multi_or_insert_with(
        &mut self,
        tags: &[TypeId],
        compute: impl FnOnce() -> Vec<Entity>,
    ) -> &[Entity] {
        self.sweep();
        if !self.multi.contains_key(tags) {
            self.multi.insert(tags.into(), compute());
        }
        &self.multi[tags]
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.multi.is_empty()
    }
}

/// Index of the smallest set, used as the iteration base for intersections.
pub(crate) fn smallest_index(sets: &[&HashSet<Entity>]) -> Option<usize> {
    sets.iter()
        .enumerate()
        .min_by_key(|(_, set)| set.len())
        .map(|(index, _)| index)
}

/// Entities present in every membership set for `tags`.
///
/// Candidates are taken from the smallest set and probed against the others,
/// so a query mixing one rare tag with several common ones costs proportional
/// to the rare set's size. A tag with no membership set yields no matches.
pub(crate) fn intersect(index: &ComponentIndex, tags: &[TypeId]) -> Vec<Entity> {
    let mut sets = Vec::with_capacity(tags.len());
    for tag in tags {
        match index.members(*tag) {
            Some(set) => sets.push(set),
            None => return Vec::new(),
        }
    }
    let Some(base) = smallest_index(&sets) else {
        return Vec::new();
    };
    sets[base]
        .iter()
        .copied()
        .filter(|entity| {
            sets.iter()
                .enumerate()
                .all(|(i, set)| i == base || set.contains(entity))
        })
        .collect()
}

/// A tuple of component types fetched together by multi-type queries.
///
/// Implemented for tuples of up to eight component types. The fetched
/// references are aligned with the tuple's declaration order.
pub trait ComponentTuple {
    /// Aligned references, in the tuple's declaration order.
    type Refs<'w>;

    /// The type tags this tuple reads, in declaration order.
    fn type_ids() -> Vec<TypeId>;

    /// Fetch aligned references for one entity, or `None` if any component
    /// is absent.
    fn fetch(index: &ComponentIndex, entity: Entity) -> Option<Self::Refs<'_>>;
}

macro_rules! impl_component_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Component),+> ComponentTuple for ($($name,)+) {
            type Refs<'w> = ($(&'w $name,)+);

            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$name>()),+]
            }

            fn fetch(index: &ComponentIndex, entity: Entity) -> Option<Self::Refs<'_>> {
                Some(($(
                    index
                        .get(entity, TypeId::of::<$name>())?
                        .downcast_ref::<$name>()?,
                )+))
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
impl_component_tuple!(A, B, C, D, E, F);
impl_component_tuple!(A, B, C, D, E, F, G);
impl_component_tuple!(A, B, C, D, E, F, G, H);
