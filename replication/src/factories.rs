//! Per-kind entity constructors.

use std::collections::BTreeMap;

use bevy_ecs::prelude::{Entity, World};
use protocol::{EntityKind, EntityState};

use crate::components::write_state;
use crate::error::{ReplicationError, ReplicationResult};

/// Builds the local entity for one kind. Attaches whatever kind-specific
/// components the game needs; replicated state is written afterwards.
pub type Factory = fn(&mut World, &EntityState) -> Entity;

/// Explicit kind-to-factory table, filled at startup.
#[derive(Debug, Clone, Default)]
pub struct Factories {
    by_kind: BTreeMap<EntityKind, Factory>,
}

impl Factories {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `kind`, replacing any earlier one.
    pub fn register(&mut self, kind: impl Into<EntityKind>, factory: Factory) -> &mut Self {
        self.by_kind.insert(kind.into(), factory);
        self
    }

    #[must_use]
    pub fn with(mut self, kind: impl Into<EntityKind>, factory: Factory) -> Self {
        self.register(kind, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, kind: &EntityKind) -> bool {
        self.by_kind.contains_key(kind)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &EntityKind> {
        self.by_kind.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    /// Builds an entity of `kind` carrying `state`.
    pub fn build(
        &self,
        world: &mut World,
        kind: &EntityKind,
        state: &EntityState,
    ) -> ReplicationResult<Entity> {
        let factory = self
            .by_kind
            .get(kind)
            .ok_or_else(|| ReplicationError::UnknownKind(kind.clone()))?;
        let entity = factory(world, state);
        write_state(world, entity, state);
        Ok(entity)
    }
}
