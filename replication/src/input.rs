//! Input replication.
//!
//! Clients send begin/end edges for a fixed set of logical actions. The
//! server routes each edge to the entity bound to the sending connection,
//! tracking held actions per `(connection, action)` so one client's key-up
//! can never release another client's key.

use std::collections::{BTreeSet, HashMap};

use bevy_ecs::prelude::{Entity, World};
use log::{debug, trace};
use protocol::{EntityKind, EntityState, InputEdge, InputEvent, Message, NetworkId};

use crate::error::ReplicationResult;
use crate::registry::EntityRegistry;
use crate::session::{ConnectionId, SessionManager};

/// An entity the game wants spawned in response to an input.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub kind: EntityKind,
    pub state: EntityState,
    pub owner: Option<NetworkId>,
}

/// Game-side handler for dispatched inputs.
pub trait InputSink {
    /// An action started on `entity`. May ask for entities to be spawned.
    fn action_begin(
        &mut self,
        world: &mut World,
        entity: Entity,
        target: NetworkId,
        action: &str,
    ) -> Vec<SpawnRequest>;

    /// An action stopped on `entity`.
    fn action_end(&mut self, world: &mut World, entity: Entity, target: NetworkId, action: &str);
}

/// Client side: turns local action edges into `Input` messages.
#[derive(Debug, Clone)]
pub struct InputSender {
    connection: ConnectionId,
    actions: BTreeSet<String>,
    held: BTreeSet<String>,
}

impl InputSender {
    pub fn new<I, S>(connection: ConnectionId, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            connection,
            actions: actions.into_iter().map(Into::into).collect(),
            held: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        self.connection
    }

    #[must_use]
    pub fn is_held(&self, action: &str) -> bool {
        self.held.contains(action)
    }

    /// Sends a begin edge. Returns `Ok(false)` if the action is unknown or
    /// already held.
    pub fn begin(&mut self, session: &mut SessionManager, action: &str) -> ReplicationResult<bool> {
        self.edge(session, action, InputEdge::Begin)
    }

    /// Sends an end edge. Returns `Ok(false)` if the action is unknown or
    /// not held.
    pub fn end(&mut self, session: &mut SessionManager, action: &str) -> ReplicationResult<bool> {
        self.edge(session, action, InputEdge::End)
    }

    pub fn edge(
        &mut self,
        session: &mut SessionManager,
        action: &str,
        edge: InputEdge,
    ) -> ReplicationResult<bool> {
        if !self.actions.contains(action) {
            trace!("ignoring unknown action `{action}`");
            return Ok(false);
        }
        let changed = match edge {
            InputEdge::Begin => !self.held.contains(action),
            InputEdge::End => self.held.contains(action),
        };
        if !changed {
            return Ok(false);
        }
        session.send(
            self.connection,
            &Message::Input(InputEvent {
                action: action.to_owned(),
                edge,
            }),
        )?;
        match edge {
            InputEdge::Begin => self.held.insert(action.to_owned()),
            InputEdge::End => self.held.remove(action),
        };
        Ok(true)
    }

    /// Sends a begin immediately followed by an end.
    pub fn press(&mut self, session: &mut SessionManager, action: &str) -> ReplicationResult<bool> {
        let began = self.begin(session, action)?;
        self.end(session, action)?;
        Ok(began)
    }

    /// Ends every held action.
    pub fn release_all(&mut self, session: &mut SessionManager) -> ReplicationResult<()> {
        let held: Vec<String> = self.held.iter().cloned().collect();
        for action in held {
            self.end(session, &action)?;
        }
        Ok(())
    }
}

/// Server side: dispatches received edges to the bound entity.
#[derive(Debug, Clone)]
pub struct InputReceiver {
    actions: BTreeSet<String>,
    bindings: HashMap<ConnectionId, NetworkId>,
    held: BTreeSet<(ConnectionId, String)>,
}

impl InputReceiver {
    /// Creates a receiver that accepts only `actions`.
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            bindings: HashMap::new(),
            held: BTreeSet::new(),
        }
    }

    /// Routes inputs from `connection` to the entity with id `target`.
    pub fn bind(&mut self, connection: ConnectionId, target: NetworkId) {
        self.bindings.insert(connection, target);
    }

    #[must_use]
    pub fn target(&self, connection: ConnectionId) -> Option<NetworkId> {
        self.bindings.get(&connection).copied()
    }

    #[must_use]
    pub fn is_held(&self, connection: ConnectionId, action: &str) -> bool {
        self.held.contains(&(connection, action.to_owned()))
    }

    /// Dispatches one edge. Undeclared actions, unbound connections, missing
    /// targets, repeated begins and stray ends are dropped.
    pub fn on_input(
        &mut self,
        world: &mut World,
        registry: &EntityRegistry,
        sink: &mut dyn InputSink,
        connection: ConnectionId,
        event: &InputEvent,
    ) -> Vec<SpawnRequest> {
        if !self.actions.contains(&event.action) {
            trace!("{connection}: undeclared action `{}` dropped", event.action);
            return Vec::new();
        }
        let Some(target) = self.target(connection) else {
            trace!("{connection}: input from unbound connection dropped");
            return Vec::new();
        };
        let Some(entity) = registry.entity(target) else {
            trace!("{connection}: input target {target} is gone");
            return Vec::new();
        };
        let key = (connection, event.action.clone());
        match event.edge {
            InputEdge::Begin => {
                if !self.held.insert(key) {
                    return Vec::new();
                }
                sink.action_begin(world, entity, target, &event.action)
            }
            InputEdge::End => {
                if !self.held.remove(&key) {
                    return Vec::new();
                }
                sink.action_end(world, entity, target, &event.action);
                Vec::new()
            }
        }
    }

    /// Ends every action `connection` still holds, then unbinds it.
    pub fn release_connection(
        &mut self,
        world: &mut World,
        registry: &EntityRegistry,
        sink: &mut dyn InputSink,
        connection: ConnectionId,
    ) {
        let held: Vec<String> = self
            .held
            .iter()
            .filter(|(owner, _)| *owner == connection)
            .map(|(_, action)| action.clone())
            .collect();
        let entity = self
            .target(connection)
            .and_then(|target| registry.entity(target).map(|entity| (target, entity)));
        for action in held {
            self.held.remove(&(connection, action.clone()));
            if let Some((target, entity)) = entity {
                sink.action_end(world, entity, target, &action);
            }
        }
        if self.bindings.remove(&connection).is_some() {
            debug!("{connection}: input released");
        }
    }
}
