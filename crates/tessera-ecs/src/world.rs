use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;

use tracing::debug;

use crate::component::{Bundle, Component, ComponentIndex};
use crate::entity::{Entity, EntityAllocator};
use crate::error::EcsError;
use crate::query::{intersect, ComponentTuple, QueryCache};

/// The entity-component database: id allocation, component storage, deferred
/// deletion, and memoized queries.
///
/// All operations are synchronous and single-threaded; queries return
/// materialized snapshots, never live views into internal structures.
pub struct World {
    allocator: EntityAllocator,
    index: ComponentIndex,
    dead: HashSet<Entity>,
    cache: QueryCache,
}

impl World {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            index: ComponentIndex::new(),
            dead: HashSet::new(),
            cache: QueryCache::new(),
        }
    }

    // ---- Entity lifecycle ----

    /// Create a new entity with no components.
    ///
    /// The entity is materialized immediately: it exists, can be queried for
    /// (zero) components, and can be deleted, even before anything is
    /// attached to it.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.index.materialize(entity);
        entity
    }

    /// Create a new entity with an initial tuple of components.
    pub fn spawn_with<B: Bundle>(&mut self, components: B) -> Entity {
        let entity = self.spawn();
        components
            .attach(&mut self.index, entity)
            .expect("freshly spawned entity is materialized");
        self.cache.invalidate();
        entity
    }

    /// Delete an entity and all of its components.
    ///
    /// With `immediate` set, the entity is unlinked from every membership set
    /// right away. Otherwise it is only recorded in the dead set: it stops
    /// existing for [`World::entity_exists`], but its data stays queryable
    /// until the next [`World::clear_dead_entities`] call. Queueing the same
    /// entity twice is harmless.
    pub fn delete_entity(&mut self, entity: Entity, immediate: bool) -> Result<(), EcsError> {
        if !self.index.contains_entity(entity) {
            return Err(EcsError::UnknownEntity(entity));
        }
        if immediate {
            self.index.unlink(entity);
            self.cache.invalidate();
        } else {
            self.dead.insert(entity);
        }
        Ok(())
    }

    /// Check whether an entity exists: materialized and not queued for
    /// deletion. A never-created id returns `false`.
    pub fn entity_exists(&self, entity: Entity) -> bool {
        self.index.contains_entity(entity) && !self.dead.contains(&entity)
    }

    /// Finalize deletion of every entity queued by a deferred
    /// [`World::delete_entity`] call. No-op when nothing is queued.
    pub fn clear_dead_entities(&mut self) {
        if self.dead.is_empty() {
            return;
        }
        let count = self.dead.len();
        for entity in std::mem::take(&mut self.dead) {
            // an interleaved immediate delete may have unlinked it already
            self.index.unlink(entity);
        }
        self.cache.invalidate();
        debug!(count, "purged dead entities");
    }

    /// Number of existing entities (dead-pending ones excluded).
    pub fn entity_count(&self) -> usize {
        self.index.entity_count()
            - self
                .dead
                .iter()
                .filter(|entity| self.index.contains_entity(**entity))
                .count()
    }

    // ---- Component management ----

    /// Attach a component to an entity, replacing any existing component of
    /// the same type.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<(), EcsError> {
        self.index
            .insert(entity, TypeId::of::<T>(), Box::new(component))?;
        self.cache.invalidate();
        Ok(())
    }

    /// Attach a component under an alias type distinct from its concrete
    /// type, for querying a family of components by one common tag.
    ///
    /// The value is converted into the alias type (typically an enum or a
    /// boxed trait object) and stored under the alias tag only: lookups and
    /// queries see it as an `A`, not as its original type.
    pub fn add_component_as<A: Component>(
        &mut self,
        entity: Entity,
        component: impl Into<A>,
    ) -> Result<(), EcsError> {
        self.index
            .insert(entity, TypeId::of::<A>(), Box::new(component.into()))?;
        self.cache.invalidate();
        Ok(())
    }

    /// Detach and return a component from an entity, by type.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, EcsError> {
        let boxed = self
            .index
            .remove(entity, TypeId::of::<T>(), type_name::<T>())?;
        self.cache.invalidate();
        let value = boxed.downcast::<T>().expect("component type mismatch");
        Ok(*value)
    }

    /// Get a reference to a component on an entity.
    pub fn component_for_entity<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        if !self.index.contains_entity(entity) {
            return Err(EcsError::UnknownEntity(entity));
        }
        self.index
            .get(entity, TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .ok_or(EcsError::MissingComponent(entity, type_name::<T>()))
    }

    /// Get a mutable reference to a component on an entity. Mutating a value
    /// in place does not invalidate cached query results.
    pub fn component_for_entity_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, EcsError> {
        if !self.index.contains_entity(entity) {
            return Err(EcsError::UnknownEntity(entity));
        }
        self.index
            .get_mut(entity, TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
            .ok_or(EcsError::MissingComponent(entity, type_name::<T>()))
    }

    /// Snapshot of all component values currently attached to an entity.
    pub fn components_for_entity(&self, entity: Entity) -> Result<Vec<&dyn Any>, EcsError> {
        let map = self
            .index
            .attributes(entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        Ok(map.values().map(|boxed| boxed.as_ref() as &dyn Any).collect())
    }

    /// Check whether an entity has a component of the given type.
    pub fn has_component<T: Component>(&self, entity: Entity) -> Result<bool, EcsError> {
        let map = self
            .index
            .attributes(entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        Ok(map.contains_key(&TypeId::of::<T>()))
    }

    /// Check whether an entity has every component type in the tuple.
    pub fn has_components<Tup: ComponentTuple>(&self, entity: Entity) -> Result<bool, EcsError> {
        let map = self
            .index
            .attributes(entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        Ok(Tup::type_ids().iter().all(|tag| map.contains_key(tag)))
    }

    /// Like [`World::component_for_entity`], but absent entities and absent
    /// components both yield `None` instead of an error.
    pub fn try_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.index.get(entity, TypeId::of::<T>())?.downcast_ref()
    }

    /// Mutable variant of [`World::try_component`].
    pub fn try_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.index.get_mut(entity, TypeId::of::<T>())?.downcast_mut()
    }

    /// Fetch a tuple of components for one entity, or `None` if the entity
    /// or any of the components is absent.
    pub fn try_components<Tup: ComponentTuple>(&self, entity: Entity) -> Option<Tup::Refs<'_>> {
        Tup::fetch(&self.index, entity)
    }

    // ---- Queries ----

    /// All entities holding a component of the given type, with their values.
    ///
    /// Served from the cache when no mutation happened since the last query;
    /// otherwise computed from the membership set and stored. The order is
    /// unspecified but stable for a given unmutated state. Entities queued
    /// for deferred deletion are still returned until the next purge.
    pub fn get_component<T: Component>(&mut self) -> Vec<(Entity, &T)> {
        let tag = TypeId::of::<T>();
        let Self { index, cache, .. } = self;
        let entities = cache.single_or_insert_with(tag, || {
            index
                .members(tag)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        });
        entities
            .iter()
            .map(|&entity| {
                let value = index
                    .get(entity, tag)
                    .and_then(|boxed| boxed.downcast_ref::<T>())
                    .expect("cached entity lost its component");
                (entity, value)
            })
            .collect()
    }

    /// All entities holding every component type in the tuple, with their
    /// values aligned in the tuple's declaration order.
    ///
    /// The intersection iterates the smallest membership set and probes the
    /// others, so mixing one rare type with several common ones costs
    /// proportional to the rare set's size. A type no entity has ever held
    /// yields an empty result, not an error.
    pub fn get_components<Tup: ComponentTuple>(&mut self) -> Vec<(Entity, Tup::Refs<'_>)> {
        let tags = Tup::type_ids();
        let Self { index, cache, .. } = self;
        let entities = cache.multi_or_insert_with(&tags, || intersect(index, &tags));
        entities
            .iter()
            .map(|&entity| {
                let refs = Tup::fetch(index, entity).expect("cached entity lost a component");
                (entity, refs)
            })
            .collect()
    }

    /// Dynamic-tag variant of [`World::get_components`]: the ids of all
    /// entities holding every listed tag. Errors on an empty tag list.
    pub fn entities_with(&mut self, tags: &[TypeId]) -> Result<Vec<Entity>, EcsError> {
        if tags.is_empty() {
            return Err(EcsError::EmptyQuery);
        }
        let Self { index, cache, .. } = self;
        Ok(cache
            .multi_or_insert_with(tags, || intersect(index, tags))
            .to_vec())
    }

    // ---- Cache & database control ----

    /// Drop all cached query results. Safe to call at any time.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Remove every entity and component, empty the dead set, restart the id
    /// sequence from 1, and invalidate the cache. Does not touch anything
    /// outside the database (processors, event handlers).
    pub fn clear_database(&mut self) {
        self.allocator.reset();
        self.index.clear();
        self.dead.clear();
        self.cache.clear();
        debug!("entity component database cleared");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);

    #[derive(Debug, PartialEq)]
    struct Circle {
        radius: f32,
    }

    #[derive(Debug, PartialEq)]
    struct Square {
        side: f32,
    }

    #[derive(Debug, PartialEq)]
    enum Shape {
        Circle(Circle),
        Square(Square),
    }

    impl From<Circle> for Shape {
        fn from(circle: Circle) -> Self {
            Shape::Circle(circle)
        }
    }

    impl From<Square> for Shape {
        fn from(square: Square) -> Self {
            Shape::Square(square)
        }
    }

    fn pos(x: f32) -> Position {
        Position { x, y: 0.0 }
    }

    fn vel(dx: f32) -> Velocity {
        Velocity { dx, dy: 0.0 }
    }

    #[test]
    fn spawned_ids_are_monotonic() {
        let mut world = World::new();
        let mut previous = world.spawn();
        assert_eq!(previous.id(), 1);
        for _ in 0..50 {
            let next = world.spawn();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn clear_database_restarts_id_sequence() {
        let mut world = World::new();
        world.spawn();
        let second = world.spawn_with((pos(1.0),));
        assert_eq!(second.id(), 2);

        world.clear_database();
        assert!(!world.entity_exists(second));
        assert_eq!(world.spawn().id(), 1);
        assert!(world.get_component::<Position>().is_empty());
    }

    #[test]
    fn spawn_with_attaches_components() {
        // scenario A from the contract
        let mut world = World::new();
        let e1 = world.spawn_with((pos(0.0),));
        let e2 = world.spawn_with((vel(1.0), Name("two".into())));

        assert!(world.has_component::<Position>(e1).unwrap());
        assert!(!world.has_component::<Position>(e2).unwrap());
        assert!(world.has_component::<Name>(e2).unwrap());
    }

    #[test]
    fn add_replaces_value_of_same_type() {
        let mut world = World::new();
        let e = world.spawn();
        world.add_component(e, pos(1.0)).unwrap();
        world.add_component(e, pos(2.0)).unwrap();

        assert_eq!(world.component_for_entity::<Position>(e).unwrap().x, 2.0);
        assert_eq!(world.get_component::<Position>().len(), 1);
    }

    #[test]
    fn add_to_unknown_entity_fails() {
        let mut world = World::new();
        let ghost = Entity::from_raw(999);
        let err = world.add_component(ghost, pos(0.0)).unwrap_err();
        assert_eq!(err, EcsError::UnknownEntity(ghost));
        // the failed add must leave no trace in the membership sets
        assert!(world.get_component::<Position>().is_empty());
    }

    #[test]
    fn remove_component_returns_value() {
        let mut world = World::new();
        let e = world.spawn_with((Name("keep".into()), pos(3.0)));

        let removed = world.remove_component::<Position>(e).unwrap();
        assert_eq!(removed, pos(3.0));
        assert!(!world.has_component::<Position>(e).unwrap());
        assert!(world.has_component::<Name>(e).unwrap());
    }

    #[test]
    fn remove_missing_component_fails_but_try_is_silent() {
        // scenario D from the contract
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0),));

        let err = world.remove_component::<Velocity>(e).unwrap_err();
        assert!(matches!(err, EcsError::MissingComponent(entity, _) if entity == e));
        assert_eq!(world.try_component::<Velocity>(e), None);
    }

    #[test]
    fn existence_is_independent_of_component_count() {
        let mut world = World::new();
        let empty = world.spawn();
        assert!(world.entity_exists(empty));

        let e = world.spawn_with((pos(0.0),));
        world.remove_component::<Position>(e).unwrap();
        assert!(world.entity_exists(e));
        assert!(!world.has_component::<Position>(e).unwrap());
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn lookups_on_unknown_entity_fail() {
        let world = World::new();
        let ghost = Entity::from_raw(42);

        assert_eq!(
            world.component_for_entity::<Position>(ghost).unwrap_err(),
            EcsError::UnknownEntity(ghost)
        );
        assert_eq!(
            world.has_component::<Position>(ghost).unwrap_err(),
            EcsError::UnknownEntity(ghost)
        );
        assert_eq!(
            world.has_components::<(Position, Velocity)>(ghost).unwrap_err(),
            EcsError::UnknownEntity(ghost)
        );
        assert_eq!(
            world.components_for_entity(ghost).err(),
            Some(EcsError::UnknownEntity(ghost))
        );
        // the try_* family stays silent for both failure kinds
        assert_eq!(world.try_component::<Position>(ghost), None);
        assert!(world.try_components::<(Position, Velocity)>(ghost).is_none());
    }

    #[test]
    fn mutation_through_handle_is_visible() {
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0),));

        world.component_for_entity_mut::<Position>(e).unwrap().x = 9.0;
        assert_eq!(world.try_component::<Position>(e).unwrap().x, 9.0);
    }

    #[test]
    fn components_for_entity_snapshots_all_values() {
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0), vel(1.0), Name("n".into())));
        assert_eq!(world.components_for_entity(e).unwrap().len(), 3);

        let empty = world.spawn();
        assert!(world.components_for_entity(empty).unwrap().is_empty());
    }

    #[test]
    fn has_components_requires_all() {
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0), vel(1.0)));

        assert!(world.has_components::<(Position, Velocity)>(e).unwrap());
        assert!(!world.has_components::<(Position, Name)>(e).unwrap());
    }

    #[test]
    fn try_components_aligns_values() {
        let mut world = World::new();
        let e = world.spawn_with((pos(5.0), vel(7.0)));

        let (p, v) = world.try_components::<(Position, Velocity)>(e).unwrap();
        assert_eq!(p.x, 5.0);
        assert_eq!(v.dx, 7.0);
        assert!(world.try_components::<(Position, Name)>(e).is_none());
    }

    #[test]
    fn deferred_delete_hides_entity_until_purge() {
        // scenario B from the contract
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0),));

        world.delete_entity(e, false).unwrap();
        assert!(!world.entity_exists(e));
        // an already-held handle can still dereference its data
        assert!(world.component_for_entity::<Position>(e).is_ok());
        // queueing twice is harmless
        world.delete_entity(e, false).unwrap();

        world.clear_dead_entities();
        assert_eq!(
            world.component_for_entity::<Position>(e).unwrap_err(),
            EcsError::UnknownEntity(e)
        );
    }

    #[test]
    fn dead_pending_entities_still_appear_in_queries() {
        let mut world = World::new();
        let e1 = world.spawn_with((pos(1.0),));
        let e2 = world.spawn_with((pos(2.0),));

        world.delete_entity(e2, false).unwrap();
        // membership sets are untouched until the purge
        assert_eq!(world.get_component::<Position>().len(), 2);

        world.clear_dead_entities();
        let remaining = world.get_component::<Position>();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, e1);
    }

    #[test]
    fn immediate_delete_updates_queries() {
        // scenario C from the contract
        let mut world = World::new();
        let _e1 = world.spawn_with((pos(1.0), vel(1.0)));
        let e2 = world.spawn_with((pos(2.0), vel(2.0), Name("extra".into())));

        assert_eq!(world.get_components::<(Position, Velocity)>().len(), 2);
        world.delete_entity(e2, true).unwrap();
        assert_eq!(world.get_components::<(Position, Velocity)>().len(), 1);
    }

    #[test]
    fn delete_unknown_entity_fails() {
        let mut world = World::new();
        let ghost = Entity::from_raw(7);
        assert_eq!(
            world.delete_entity(ghost, false).unwrap_err(),
            EcsError::UnknownEntity(ghost)
        );
        assert_eq!(
            world.delete_entity(ghost, true).unwrap_err(),
            EcsError::UnknownEntity(ghost)
        );
    }

    #[test]
    fn purge_survives_interleaved_immediate_delete() {
        let mut world = World::new();
        let e = world.spawn_with((pos(0.0),));
        world.delete_entity(e, false).unwrap();
        world.delete_entity(e, true).unwrap();
        // e is queued and already unlinked; the purge must skip it quietly
        world.clear_dead_entities();
        assert!(!world.entity_exists(e));
    }

    #[test]
    fn clear_dead_entities_is_noop_when_empty() {
        let mut world = World::new();
        world.clear_dead_entities();
        let e = world.spawn_with((pos(0.0),));
        world.clear_dead_entities();
        assert!(world.entity_exists(e));
    }

    #[test]
    fn queries_reflect_mutations_immediately() {
        let mut world = World::new();
        let e1 = world.spawn_with((pos(1.0),));
        assert_eq!(world.get_component::<Position>().len(), 1);

        let e2 = world.spawn_with((pos(2.0),));
        // the cached result from before the spawn must not be served
        assert_eq!(world.get_component::<Position>().len(), 2);

        world.remove_component::<Position>(e1).unwrap();
        assert_eq!(world.get_component::<Position>().len(), 1);

        world.add_component(e1, vel(1.0)).unwrap();
        world.add_component(e2, vel(2.0)).unwrap();
        assert_eq!(world.get_components::<(Position, Velocity)>().len(), 1);
    }

    #[test]
    fn query_order_is_stable_between_mutations() {
        let mut world = World::new();
        for i in 0..10 {
            world.spawn_with((pos(i as f32),));
        }
        let first: Vec<Entity> = world
            .get_component::<Position>()
            .into_iter()
            .map(|(entity, _)| entity)
            .collect();
        let second: Vec<Entity> = world
            .get_component::<Position>()
            .into_iter()
            .map(|(entity, _)| entity)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn query_matches_has_components() {
        let mut world = World::new();
        let e1 = world.spawn_with((pos(1.0), vel(1.0)));
        let e2 = world.spawn_with((pos(2.0),));
        let e3 = world.spawn_with((vel(3.0), Name("three".into())));

        let found: Vec<Entity> = world
            .get_components::<(Position, Velocity)>()
            .into_iter()
            .map(|(entity, _)| entity)
            .collect();
        for entity in [e1, e2, e3] {
            assert_eq!(
                found.contains(&entity),
                world.has_components::<(Position, Velocity)>(entity).unwrap()
            );
        }
        assert_eq!(found, vec![e1]);
    }

    #[test]
    fn query_values_align_with_input_order() {
        let mut world = World::new();
        world.spawn_with((pos(4.0), vel(8.0)));

        let results = world.get_components::<(Velocity, Position)>();
        let (_, (v, p)) = results[0];
        assert_eq!(v.dx, 8.0);
        assert_eq!(p.x, 4.0);
    }

    #[test]
    fn query_with_unregistered_type_is_empty() {
        let mut world = World::new();
        world.spawn_with((pos(0.0),));
        assert!(world.get_component::<Name>().is_empty());
        assert!(world.get_components::<(Position, Name)>().is_empty());
    }

    #[test]
    fn entities_with_rejects_empty_tag_list() {
        let mut world = World::new();
        assert_eq!(world.entities_with(&[]).unwrap_err(), EcsError::EmptyQuery);

        let e = world.spawn_with((pos(0.0), vel(0.0)));
        let found = world
            .entities_with(&[TypeId::of::<Position>(), TypeId::of::<Velocity>()])
            .unwrap();
        assert_eq!(found, vec![e]);
    }

    #[test]
    fn clear_cache_is_safe_and_transparent() {
        let mut world = World::new();
        world.clear_cache();

        let e = world.spawn_with((pos(1.0),));
        let before = world.get_component::<Position>().len();
        world.clear_cache();
        assert_eq!(world.get_component::<Position>().len(), before);
        assert!(world.entity_exists(e));
    }

    #[test]
    fn alias_components_live_under_the_alias_tag() {
        let mut world = World::new();
        let e1 = world.spawn();
        let e2 = world.spawn();
        world
            .add_component_as::<Shape>(e1, Circle { radius: 1.0 })
            .unwrap();
        world
            .add_component_as::<Shape>(e2, Square { side: 2.0 })
            .unwrap();

        assert!(world.has_component::<Shape>(e1).unwrap());
        assert!(!world.has_component::<Circle>(e1).unwrap());
        assert_eq!(world.get_component::<Shape>().len(), 2);

        let removed = world.remove_component::<Shape>(e1).unwrap();
        assert_eq!(removed, Shape::Circle(Circle { radius: 1.0 }));
        assert_eq!(world.get_component::<Shape>().len(), 1);
    }

    #[test]
    fn entity_count_tracks_lifecycle() {
        let mut world = World::new();
        assert_eq!(world.entity_count(), 0);
        let e1 = world.spawn();
        let _e2 = world.spawn_with((pos(0.0),));
        assert_eq!(world.entity_count(), 2);

        world.delete_entity(e1, false).unwrap();
        assert_eq!(world.entity_count(), 1);
        world.clear_dead_entities();
        assert_eq!(world.entity_count(), 1);
    }
}
