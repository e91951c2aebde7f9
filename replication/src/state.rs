//! Per-tick state replication.

use bevy_ecs::prelude::World;
use log::debug;
use protocol::{EntityDelta, Message};

use crate::components::{read_state, write_state};
use crate::error::{ReplicationError, ReplicationResult};
use crate::registry::EntityRegistry;
use crate::session::SessionManager;

/// Sends one delta per changed entity per open connection.
///
/// Each connection is diffed against the state last sent on it, so an
/// entity spawned mid-tick on one connection never skips a change on
/// another. Returns the number of deltas sent.
pub fn tick(session: &mut SessionManager, world: &World, registry: &EntityRegistry) -> usize {
    let mut sent = 0;
    for connection in session.open_connections() {
        for (id, baseline) in session.baselines(connection) {
            let Some(entity) = registry.entity(id) else {
                continue;
            };
            let Some(current) = read_state(world, entity) else {
                continue;
            };
            let Some(delta) = EntityDelta::between(id, &baseline, &current) else {
                continue;
            };
            if let Err(err) = session.send(connection, &Message::Delta(delta)) {
                debug!("{connection}: stopping deltas this tick: {err}");
                break;
            }
            session.set_baseline(connection, id, current);
            sent += 1;
        }
    }
    sent
}

/// Applies a received delta to its mirror.
pub fn on_delta(
    world: &mut World,
    registry: &EntityRegistry,
    delta: &EntityDelta,
) -> ReplicationResult<()> {
    let entity = registry
        .entity(delta.id)
        .ok_or(ReplicationError::StaleReference(delta.id))?;
    let mut state = read_state(world, entity).ok_or(ReplicationError::MissingState(entity))?;
    delta.apply_to(&mut state);
    write_state(world, entity, &state);
    Ok(())
}
