//! ECS components carrying replicated state.

use bevy_ecs::prelude::{Component, Entity, World};
use protocol::{EntityKind, EntityState, NetworkId, Vec2};

#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

/// Network identity of a replicated entity.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntity {
    pub id: NetworkId,
    pub kind: EntityKind,
    pub owner: Option<NetworkId>,
}

/// Marks a local copy of an entity owned by the remote side.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mirrored;

/// Reads the replicated state of `entity`.
///
/// Returns `None` if the entity has no `Position`. A missing `Velocity`
/// reads as zero.
#[must_use]
pub fn read_state(world: &World, entity: Entity) -> Option<EntityState> {
    let position = world.get::<Position>(entity)?.0;
    let velocity = world.get::<Velocity>(entity).map_or(Vec2::ZERO, |v| v.0);
    Some(EntityState { position, velocity })
}

/// Overwrites the replicated state of `entity`, inserting the components if
/// needed. Returns `false` if the entity does not exist.
pub fn write_state(world: &mut World, entity: Entity, state: &EntityState) -> bool {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return false;
    };
    entity_mut.insert((Position(state.position), Velocity(state.velocity)));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_requires_position() {
        let mut world = World::new();
        let bare = world.spawn(Velocity(Vec2::new(1.0, 0.0))).id();
        assert_eq!(read_state(&world, bare), None);

        let placed = world.spawn(Position(Vec2::new(3.0, 4.0))).id();
        assert_eq!(
            read_state(&world, placed),
            Some(EntityState::at(Vec2::new(3.0, 4.0)))
        );
    }

    #[test]
    fn write_then_read() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let state = EntityState::at(Vec2::new(150.0, 150.0)).with_velocity(Vec2::new(0.0, -300.0));
        assert!(write_state(&mut world, entity, &state));
        assert_eq!(read_state(&world, entity), Some(state));
    }

    #[test]
    fn write_to_despawned_entity_fails() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        world.despawn(entity);
        assert!(!write_state(&mut world, entity, &EntityState::default()));
    }
}
