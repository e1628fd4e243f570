#![allow(private_interfaces)]

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::error::EcsError;

/// Marker trait for types that can be attached to entities.
pub trait Component: 'static + Send + Sync {}

/// Blanket implementation: any `'static + Send + Sync` type is a valid component.
impl<T: 'static + Send + Sync> Component for T {}

pub(crate) type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Dual-table component storage: per-tag membership sets, and per-entity
/// attribute maps that own the component values.
///
/// Invariants:
/// - a membership set present in the table is never empty;
/// - an entity is in tag T's membership set iff its attribute map has key T;
/// - the entity table may hold an empty attribute map — a zero-component
///   entity is still materialized, and existence is defined by presence in
///   this table alone.
pub(crate) struct ComponentIndex {
    /// Tag -> ids of all entities holding a component under that tag.
    members: HashMap<TypeId, HashSet<Entity>>,
    /// Entity -> (tag -> owned component value).
    entities: HashMap<Entity, HashMap<TypeId, BoxedComponent>>,
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    /// Insert an empty attribute map for a freshly allocated entity.
    pub fn materialize(&mut self, entity: Entity) {
        self.entities.entry(entity).or_default();
    }

    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of materialized entities, dead-pending ones included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Insert or replace the value stored under `tag` for `entity`.
    ///
    /// Fails before touching either table if the entity is not materialized,
    /// so a failed insert leaves no partial state behind.
    pub fn insert(
        &mut self,
        entity: Entity,
        tag: TypeId,
        value: BoxedComponent,
    ) -> Result<(), EcsError> {
        let map = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        map.insert(tag, value);
        self.members.entry(tag).or_default().insert(entity);
        Ok(())
    }

    /// Remove and return the value stored under `tag` for `entity`.
    ///
    /// `type_name` is only used to label the error when the tag is absent.
    pub fn remove(
        &mut self,
        entity: Entity,
        tag: TypeId,
        type_name: &'static str,
    ) -> Result<BoxedComponent, EcsError> {
        let map = self
            .entities
            .get_mut(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        let Some(value) = map.remove(&tag) else {
            return Err(EcsError::MissingComponent(entity, type_name));
        };
        if let Some(set) = self.members.get_mut(&tag) {
            set.remove(&entity);
            if set.is_empty() {
                self.members.remove(&tag);
            }
        }
        Ok(value)
    }

    pub fn get(&self, entity: Entity, tag: TypeId) -> Option<&BoxedComponent> {
        self.entities.get(&entity).and_then(|map| map.get(&tag))
    }

    pub fn get_mut(&mut self, entity: Entity, tag: TypeId) -> Option<&mut BoxedComponent> {
        self.entities
            .get_mut(&entity)
            .and_then(|map| map.get_mut(&tag))
    }

    pub fn attributes(&self, entity: Entity) -> Option<&HashMap<TypeId, BoxedComponent>> {
        self.entities.get(&entity)
    }

    pub fn members(&self, tag: TypeId) -> Option<&HashSet<Entity>> {
        self.members.get(&tag)
    }

    /// Unlink an entity from every membership set it belongs to and drop its
    /// attribute map. Returns whether the entity was materialized.
    pub fn unlink(&mut self, entity: Entity) -> bool {
        let Some(map) = self.entities.remove(&entity) else {
            return false;
        };
        for tag in map.keys() {
            if let Some(set) = self.members.get_mut(tag) {
                set.remove(&entity);
                if set.is_empty() {
                    self.members.remove(tag);
                }
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.entities.clear();
    }
}

/// A tuple of components that can be attached to an entity in one call.
///
/// Implemented for tuples of up to eight components; each element is stored
/// under its own concrete type tag.
pub trait Bundle {
    fn attach(self, index: &mut ComponentIndex, entity: Entity) -> Result<(), EcsError>;
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn attach(self, index: &mut ComponentIndex, entity: Entity) -> Result<(), EcsError> {
                let ($($name,)+) = self;
                $(index.insert(entity, TypeId::of::<$name>(), Box::new($name))?;)+
                Ok(())
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
