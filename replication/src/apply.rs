//! Routing received world traffic to the spawn and state replicators.

use bevy_ecs::prelude::World;
use log::{trace, warn};
use protocol::Message;

use crate::error::{ReplicationError, ReplicationResult};
use crate::factories::Factories;
use crate::registry::EntityRegistry;
use crate::session::Inbound;
use crate::spawn::{on_despawn, on_snapshot};
use crate::state::on_delta;

/// Applies one received spawn, delta or despawn to the local world.
///
/// Other messages are ignored. Errors are returned as-is; see
/// [`apply_inbound`] for the forgiving variant.
pub fn apply_message(
    world: &mut World,
    registry: &mut EntityRegistry,
    factories: &Factories,
    message: &Message,
) -> ReplicationResult<()> {
    match message {
        Message::Spawn(snapshot) => on_snapshot(world, registry, factories, snapshot).map(|_| ()),
        Message::Delta(delta) => on_delta(world, registry, delta),
        Message::Despawn { id } => on_despawn(world, registry, *id),
        _ => Ok(()),
    }
}

/// Applies a batch from [`crate::SessionManager::poll`].
///
/// Stale references are dropped silently and unknown kinds are logged; the
/// connection stays open either way. Returns the number of messages that
/// took effect.
pub fn apply_inbound(
    world: &mut World,
    registry: &mut EntityRegistry,
    factories: &Factories,
    inbound: &[Inbound],
) -> usize {
    let mut applied = 0;
    for item in inbound {
        match apply_message(world, registry, factories, &item.message) {
            Ok(()) => applied += 1,
            Err(ReplicationError::StaleReference(id)) => {
                trace!("{}: stale reference to {id} dropped", item.connection);
            }
            Err(err) => warn!("{}: {:?} dropped: {err}", item.connection, item.message.tag()),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::read_state;
    use crate::session::ConnectionId;
    use bevy_ecs::prelude::Entity;
    use protocol::{EntityDelta, EntityKind, EntitySnapshot, EntityState, NetworkId, Vec2};

    fn plain(world: &mut World, _state: &EntityState) -> Entity {
        world.spawn_empty().id()
    }

    fn inbound(message: Message) -> Inbound {
        Inbound {
            connection: ConnectionId(1),
            message,
        }
    }

    #[test]
    fn spawn_delta_despawn_sequence() {
        let factories = Factories::new().with("enemy", plain);
        let mut world = World::new();
        let mut registry = EntityRegistry::new();
        let id = NetworkId::new(5).unwrap();
        let start = EntityState::at(Vec2::new(650.0, 200.0));
        let moved = EntityState::at(Vec2::new(649.0, 200.0));

        let batch = vec![
            inbound(Message::Spawn(EntitySnapshot {
                id,
                kind: EntityKind::from("enemy"),
                owner: None,
                state: start,
            })),
            inbound(Message::Delta(EntityDelta::between(id, &start, &moved).unwrap())),
        ];
        assert_eq!(apply_inbound(&mut world, &mut registry, &factories, &batch), 2);
        let entity = registry.entity(id).unwrap();
        assert_eq!(read_state(&world, entity), Some(moved));

        let batch = vec![
            inbound(Message::Despawn { id }),
            inbound(Message::Delta(EntityDelta::between(id, &moved, &start).unwrap())),
        ];
        assert_eq!(apply_inbound(&mut world, &mut registry, &factories, &batch), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let factories = Factories::new().with("enemy", plain);
        let mut world = World::new();
        let mut registry = EntityRegistry::new();
        let batch = vec![inbound(Message::Spawn(EntitySnapshot {
            id: NetworkId::new(1).unwrap(),
            kind: EntityKind::from("dragon"),
            owner: None,
            state: EntityState::default(),
        }))];
        assert_eq!(apply_inbound(&mut world, &mut registry, &factories, &batch), 0);
        assert!(registry.is_empty());
    }
}
