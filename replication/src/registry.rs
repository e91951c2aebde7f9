//! Mapping between network ids and local entities.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::Entity;
use protocol::{EntityKind, NetworkId};

use crate::error::{ReplicationError, ReplicationResult};

#[derive(Debug, Clone)]
struct Record {
    entity: Entity,
    kind: EntityKind,
}

/// Two-way map between [`NetworkId`]s and local entities.
///
/// On the server ids come from [`EntityRegistry::allocate`]; a client only
/// ever [`insert`](EntityRegistry::insert)s ids it received in a snapshot.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    next_id: u32,
    by_id: BTreeMap<NetworkId, Record>,
    by_entity: HashMap<Entity, NetworkId>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a fresh id to `entity`, or returns the id it already has.
    ///
    /// Ids are never reused, even after the entity is removed.
    pub fn allocate(&mut self, entity: Entity, kind: EntityKind) -> ReplicationResult<NetworkId> {
        if let Some(id) = self.by_entity.get(&entity) {
            return Ok(*id);
        }
        let next = self
            .next_id
            .checked_add(1)
            .ok_or(ReplicationError::IdsExhausted)?;
        let id = NetworkId::new(next).ok_or(ReplicationError::IdsExhausted)?;
        self.next_id = next;
        self.by_id.insert(id, Record { entity, kind });
        self.by_entity.insert(entity, id);
        Ok(id)
    }

    /// Records an id assigned by the remote side. Returns the entity it
    /// previously mapped to, if any.
    pub fn insert(&mut self, id: NetworkId, entity: Entity, kind: EntityKind) -> Option<Entity> {
        let previous = self.by_id.insert(id, Record { entity, kind });
        if let Some(previous) = &previous {
            self.by_entity.remove(&previous.entity);
        }
        self.by_entity.insert(entity, id);
        self.next_id = self.next_id.max(id.raw());
        previous.map(|record| record.entity)
    }

    pub fn remove(&mut self, id: NetworkId) -> Option<Entity> {
        let record = self.by_id.remove(&id)?;
        self.by_entity.remove(&record.entity);
        Some(record.entity)
    }

    #[must_use]
    pub fn entity(&self, id: NetworkId) -> Option<Entity> {
        self.by_id.get(&id).map(|record| record.entity)
    }

    #[must_use]
    pub fn network_id(&self, entity: Entity) -> Option<NetworkId> {
        self.by_entity.get(&entity).copied()
    }

    #[must_use]
    pub fn kind(&self, id: NetworkId) -> Option<&EntityKind> {
        self.by_id.get(&id).map(|record| &record.kind)
    }

    #[must_use]
    pub fn contains(&self, id: NetworkId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterates entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, Entity, &EntityKind)> {
        self.by_id
            .iter()
            .map(|(id, record)| (*id, record.entity, &record.kind))
    }

    /// Forgets every mapping. The id counter keeps its value.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_entity.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    #[test]
    fn allocate_is_monotonic_and_stable() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let mut registry = EntityRegistry::new();

        let id_a = registry.allocate(a, "player1".into()).unwrap();
        let id_b = registry.allocate(b, "player2".into()).unwrap();
        assert_eq!(id_a.raw(), 1);
        assert_eq!(id_b.raw(), 2);
        assert_eq!(registry.allocate(a, "player1".into()).unwrap(), id_a);
    }

    #[test]
    fn ids_are_not_reused_after_remove() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let mut registry = EntityRegistry::new();
        let first = registry.allocate(a, "enemy".into()).unwrap();
        registry.remove(first);

        let b = world.spawn_empty().id();
        let second = registry.allocate(b, "enemy".into()).unwrap();
        assert!(second > first);
    }

    #[test]
    fn lookups_both_ways() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let id = NetworkId::new(40).unwrap();
        let mut registry = EntityRegistry::new();

        assert_eq!(registry.insert(id, entity, "bullet".into()), None);
        assert_eq!(registry.entity(id), Some(entity));
        assert_eq!(registry.network_id(entity), Some(id));
        assert_eq!(registry.kind(id).map(EntityKind::as_str), Some("bullet"));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove(id), Some(entity));
        assert!(registry.network_id(entity).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn insert_replaces_previous_entity() {
        let mut world = World::new();
        let old = world.spawn_empty().id();
        let new = world.spawn_empty().id();
        let id = NetworkId::new(1).unwrap();
        let mut registry = EntityRegistry::new();

        registry.insert(id, old, "enemy".into());
        assert_eq!(registry.insert(id, new, "enemy".into()), Some(old));
        assert!(registry.network_id(old).is_none());
        assert_eq!(registry.entity(id), Some(new));
    }

    #[test]
    fn iter_in_id_order() {
        let mut world = World::new();
        let mut registry = EntityRegistry::new();
        for raw in [5, 2, 9] {
            let entity = world.spawn_empty().id();
            registry.insert(NetworkId::new(raw).unwrap(), entity, "enemy".into());
        }
        let ids: Vec<u32> = registry.iter().map(|(id, _, _)| id.raw()).collect();
        assert_eq!(ids, vec![2, 5, 9]);

        registry.clear();
        assert!(registry.is_empty());
    }
}
