//! Spawn and despawn replication.
//!
//! The authoritative side gives each entity a [`NetworkId`] and sends a
//! snapshot once per connection; the receiving side rebuilds it through
//! [`Factories`]. A connection's known set is updated at send time, which
//! is what lets the state replicator diff only entities the peer has seen.

use bevy_ecs::prelude::{Entity, With, World};
use log::{debug, trace};
use protocol::{EntityKind, EntitySnapshot, Message, NetworkId};

use crate::components::{read_state, write_state, Mirrored, NetworkEntity};
use crate::error::{ReplicationError, ReplicationResult};
use crate::factories::Factories;
use crate::registry::EntityRegistry;
use crate::session::{ConnectionId, SessionManager};

/// Gives `entity` a network id (if it has none) and tags it with
/// [`NetworkEntity`].
pub fn register(
    world: &mut World,
    registry: &mut EntityRegistry,
    entity: Entity,
    kind: EntityKind,
    owner: Option<NetworkId>,
) -> ReplicationResult<NetworkId> {
    if let Some(id) = registry.network_id(entity) {
        return Ok(id);
    }
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return Err(ReplicationError::MissingState(entity));
    };
    let id = registry.allocate(entity, kind.clone())?;
    entity_mut.insert(NetworkEntity { id, kind, owner });
    Ok(id)
}

/// Captures the snapshot of a registered entity.
pub fn snapshot(
    world: &World,
    registry: &EntityRegistry,
    id: NetworkId,
) -> ReplicationResult<EntitySnapshot> {
    let entity = registry
        .entity(id)
        .ok_or(ReplicationError::StaleReference(id))?;
    let kind = registry
        .kind(id)
        .cloned()
        .ok_or(ReplicationError::StaleReference(id))?;
    let state = read_state(world, entity).ok_or(ReplicationError::MissingState(entity))?;
    let owner = world
        .get::<NetworkEntity>(entity)
        .and_then(|network| network.owner);
    Ok(EntitySnapshot {
        id,
        kind,
        owner,
        state,
    })
}

/// Sends `entity` to one connection.
///
/// Registers the entity first if needed. Sending an entity the connection
/// already knows is a no-op.
pub fn spawn(
    session: &mut SessionManager,
    connection: ConnectionId,
    world: &mut World,
    registry: &mut EntityRegistry,
    entity: Entity,
    kind: &EntityKind,
) -> ReplicationResult<NetworkId> {
    let id = register(world, registry, entity, kind.clone(), None)?;
    send_snapshot(session, connection, world, registry, id)?;
    Ok(id)
}

/// Sends `entity` to every open connection.
pub fn spawn_all(
    session: &mut SessionManager,
    world: &mut World,
    registry: &mut EntityRegistry,
    entity: Entity,
    kind: &EntityKind,
) -> ReplicationResult<NetworkId> {
    let id = register(world, registry, entity, kind.clone(), None)?;
    for connection in session.open_connections() {
        if let Err(err) = send_snapshot(session, connection, world, registry, id) {
            debug!("{connection}: spawn of {id} not sent: {err}");
        }
    }
    Ok(id)
}

/// Sends every registered entity the connection does not know yet, in id
/// order. Used when a peer joins after the world is populated.
pub fn spawn_existing(
    session: &mut SessionManager,
    connection: ConnectionId,
    world: &World,
    registry: &EntityRegistry,
) -> ReplicationResult<usize> {
    let ids: Vec<NetworkId> = registry.iter().map(|(id, _, _)| id).collect();
    let mut sent = 0;
    for id in ids {
        if session.knows(connection, id) {
            continue;
        }
        send_snapshot(session, connection, world, registry, id)?;
        sent += 1;
    }
    Ok(sent)
}

fn send_snapshot(
    session: &mut SessionManager,
    connection: ConnectionId,
    world: &World,
    registry: &EntityRegistry,
    id: NetworkId,
) -> ReplicationResult<()> {
    if session.knows(connection, id) {
        return Ok(());
    }
    let snapshot = snapshot(world, registry, id)?;
    let state = snapshot.state;
    session.send(connection, &Message::Spawn(snapshot))?;
    session.set_baseline(connection, id, state);
    trace!("{connection}: spawned {id}");
    Ok(())
}

/// Builds the mirror for a received snapshot.
///
/// A snapshot for an id that is already mirrored refreshes its state
/// instead of building a second entity.
pub fn on_snapshot(
    world: &mut World,
    registry: &mut EntityRegistry,
    factories: &Factories,
    snapshot: &EntitySnapshot,
) -> ReplicationResult<Entity> {
    if let Some(entity) = registry.entity(snapshot.id) {
        debug!("duplicate spawn for {}, refreshing state", snapshot.id);
        write_state(world, entity, &snapshot.state);
        return Ok(entity);
    }
    let entity = factories.build(world, &snapshot.kind, &snapshot.state)?;
    if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
        entity_mut.insert((
            Mirrored,
            NetworkEntity {
                id: snapshot.id,
                kind: snapshot.kind.clone(),
                owner: snapshot.owner,
            },
        ));
    }
    registry.insert(snapshot.id, entity, snapshot.kind.clone());
    trace!("mirrored {} as {entity:?}", snapshot.id);
    Ok(entity)
}

/// Removes a local entity and tells every connection that knows it.
/// Returns `false` if the id was not registered.
pub fn despawn(
    session: &mut SessionManager,
    world: &mut World,
    registry: &mut EntityRegistry,
    id: NetworkId,
) -> bool {
    let Some(entity) = registry.remove(id) else {
        return false;
    };
    world.despawn(entity);
    for connection in session.forget_everywhere(id) {
        if let Err(err) = session.send(connection, &Message::Despawn { id }) {
            debug!("{connection}: despawn of {id} not sent: {err}");
        }
    }
    true
}

/// Removes the mirror for a received despawn.
pub fn on_despawn(
    world: &mut World,
    registry: &mut EntityRegistry,
    id: NetworkId,
) -> ReplicationResult<()> {
    let entity = registry
        .remove(id)
        .ok_or(ReplicationError::StaleReference(id))?;
    world.despawn(entity);
    Ok(())
}

/// Despawns every mirrored entity and empties the registry. Returns the
/// number of entities removed.
pub fn clear_mirrors(world: &mut World, registry: &mut EntityRegistry) -> usize {
    let mirrored: Vec<Entity> = world
        .query_filtered::<Entity, With<Mirrored>>()
        .iter(world)
        .collect();
    for entity in &mirrored {
        world.despawn(*entity);
    }
    registry.clear();
    mirrored.len()
}
