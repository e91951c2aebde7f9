//! Connection lifecycle and per-connection subscription state.
//!
//! A connection moves `Connecting -> Open -> Closing -> Closed`. The
//! handshake is a single `Hello` from the client answered by `Welcome` or
//! `Reject` from the server. Everything is driven from [`SessionManager::poll`]
//! on the simulation thread; link reader threads only fill queues.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, trace, warn};
use protocol::{decode_message, encode_message, EntityState, Message, NetworkId};
use transport::Link;
use wire::{Limits, WIRE_VERSION};

use crate::error::{ReplicationError, ReplicationResult};

/// Locally assigned handle for one connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Which side of the handshake a connection plays locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We dialed out: send `Hello`, expect `Welcome`, receive world state.
    Client,
    /// We accepted: expect `Hello`, receive inputs.
    Server,
}

/// Session settings shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub limits: Limits,
    /// Must match the peer's hash for the handshake to succeed.
    pub protocol_hash: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn new(protocol_hash: u64) -> Self {
        Self {
            limits: Limits::default(),
            protocol_hash,
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Lifecycle notifications, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
}

/// A replication message and the connection it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub connection: ConnectionId,
    pub message: Message,
}

type Hook = Box<dyn FnMut(ConnectionId) + Send>;

struct Connection {
    link: Box<dyn Link>,
    role: Role,
    state: ConnectionState,
    /// Entities spawned on this connection with the state last sent.
    known: BTreeMap<NetworkId, EntityState>,
}

/// Owns every connection and its subscription state.
pub struct SessionManager {
    config: SessionConfig,
    connections: BTreeMap<ConnectionId, Connection>,
    next_id: u32,
    events: Vec<SessionEvent>,
    connected_hooks: Vec<Hook>,
    disconnected_hooks: Vec<Hook>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("connections", &self.connections.len())
            .field("pending_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            connections: BTreeMap::new(),
            next_id: 0,
            events: Vec::new(),
            connected_hooks: Vec::new(),
            disconnected_hooks: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers a callback run once for every connection that opens.
    pub fn on_connected(&mut self, hook: impl FnMut(ConnectionId) + Send + 'static) {
        self.connected_hooks.push(Box::new(hook));
    }

    /// Registers a callback run once for every connection that closes,
    /// including ones that never finished the handshake.
    pub fn on_disconnected(&mut self, hook: impl FnMut(ConnectionId) + Send + 'static) {
        self.disconnected_hooks.push(Box::new(hook));
    }

    /// Takes the lifecycle events recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Starts tracking `link`. A client connection sends `Hello` right away.
    pub fn add_link(&mut self, link: Box<dyn Link>, role: Role) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        debug!("{id}: tracking {role:?} link to `{}`", link.peer());
        self.connections.insert(
            id,
            Connection {
                link,
                role,
                state: ConnectionState::Connecting,
                known: BTreeMap::new(),
            },
        );
        if role == Role::Client {
            let hello = Message::Hello {
                version: WIRE_VERSION,
                protocol_hash: self.config.protocol_hash,
            };
            if let Err(err) = self.send_raw(id, &hello) {
                warn!("{id}: failed to send hello: {err}");
                self.set_state(id, ConnectionState::Closing);
            }
        }
        id
    }

    /// Drains every link and returns replication traffic in arrival order
    /// per connection. Connections that fail or close during the poll are
    /// finished before it returns. Traffic that arrived ahead of the close
    /// is still returned; nothing behind it is read.
    pub fn poll(&mut self) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.drain(id, &mut inbound);
        }

        let closing: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.state == ConnectionState::Closing)
            .map(|(id, _)| *id)
            .collect();
        for id in closing {
            self.finish(id);
        }
        inbound
    }

    /// Encodes and queues `message`. Fails unless the connection is open.
    pub fn send(&mut self, connection: ConnectionId, message: &Message) -> ReplicationResult<()> {
        if !self.is_open(connection) {
            return Err(ReplicationError::NotOpen(connection));
        }
        self.send_raw(connection, message)
    }

    /// Says goodbye and closes the link. The connection reaches `Closed` on
    /// the next [`poll`](Self::poll). Returns `false` if it was already
    /// closing.
    pub fn close(&mut self, connection: ConnectionId) -> bool {
        let Some(conn) = self.connections.get(&connection) else {
            return false;
        };
        if !matches!(
            conn.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return false;
        }
        let _ = self.send_raw(connection, &Message::Goodbye);
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.link.close();
            conn.state = ConnectionState::Closing;
        }
        debug!("{connection}: closing");
        true
    }

    /// Closes every connection.
    pub fn close_all(&mut self) {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    /// Current state; untracked ids report `Closed`.
    #[must_use]
    pub fn state(&self, connection: ConnectionId) -> ConnectionState {
        self.connections
            .get(&connection)
            .map_or(ConnectionState::Closed, |conn| conn.state)
    }

    #[must_use]
    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.state(connection) == ConnectionState::Open
    }

    #[must_use]
    pub fn role(&self, connection: ConnectionId) -> Option<Role> {
        self.connections.get(&connection).map(|conn| conn.role)
    }

    /// Open connections in id order.
    #[must_use]
    pub fn open_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, conn)| conn.state == ConnectionState::Open)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of tracked connections that are not yet closed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns `true` if `id` has been spawned on `connection`.
    #[must_use]
    pub fn knows(&self, connection: ConnectionId, id: NetworkId) -> bool {
        self.connections
            .get(&connection)
            .is_some_and(|conn| conn.known.contains_key(&id))
    }

    /// Entities spawned on `connection`, in id order.
    #[must_use]
    pub fn known_entities(&self, connection: ConnectionId) -> Vec<NetworkId> {
        self.connections
            .get(&connection)
            .map(|conn| conn.known.keys().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn baselines(&self, connection: ConnectionId) -> Vec<(NetworkId, EntityState)> {
        self.connections
            .get(&connection)
            .map(|conn| {
                conn.known
                    .iter()
                    .map(|(id, state)| (*id, *state))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Records `state` as last sent for `id`, adding it to the known set.
    pub(crate) fn set_baseline(&mut self, connection: ConnectionId, id: NetworkId, state: EntityState) {
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.known.insert(id, state);
        }
    }

    /// Removes `id` from every known set, returning the open connections that
    /// had it.
    pub(crate) fn forget_everywhere(&mut self, id: NetworkId) -> Vec<ConnectionId> {
        self.connections
            .iter_mut()
            .filter_map(|(connection, conn)| {
                let knew = conn.known.remove(&id).is_some();
                (knew && conn.state == ConnectionState::Open).then_some(*connection)
            })
            .collect()
    }

    fn drain(&mut self, id: ConnectionId, out: &mut Vec<Inbound>) {
        loop {
            let Some(conn) = self.connections.get_mut(&id) else {
                return;
            };
            if !matches!(
                conn.state,
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                return;
            }
            let payload = match conn.link.try_receive() {
                Ok(Some(payload)) => payload,
                Ok(None) => return,
                Err(err) => {
                    debug!("{id}: link ended: {err}");
                    conn.state = ConnectionState::Closing;
                    return;
                }
            };
            let message = match decode_message(&payload, &self.config.limits) {
                Ok(message) => message,
                Err(err) => {
                    warn!("{id}: dropping connection after undecodable message: {err}");
                    conn.state = ConnectionState::Closing;
                    return;
                }
            };
            trace!("{id}: received {:?}", message.tag());
            self.handle(id, message, out);
        }
    }

    fn handle(&mut self, id: ConnectionId, message: Message, out: &mut Vec<Inbound>) {
        let Some(conn) = self.connections.get(&id) else {
            return;
        };
        let (state, role) = (conn.state, conn.role);
        match (state, role, message) {
            (ConnectionState::Connecting, Role::Server, Message::Hello {
                version,
                protocol_hash,
            }) => {
                if version == WIRE_VERSION && protocol_hash == self.config.protocol_hash {
                    match self.send_raw(id, &Message::Welcome) {
                        Ok(()) => self.open(id),
                        Err(err) => {
                            debug!("{id}: failed to send welcome: {err}");
                            self.set_state(id, ConnectionState::Closing);
                        }
                    }
                } else {
                    let reason = format!(
                        "protocol mismatch: version {version} hash {protocol_hash:#018x}, expected version {WIRE_VERSION} hash {:#018x}",
                        self.config.protocol_hash
                    );
                    warn!("{id}: rejecting peer: {reason}");
                    let _ = self.send_raw(id, &Message::Reject { reason });
                    self.set_state(id, ConnectionState::Closing);
                }
            }
            (ConnectionState::Connecting, Role::Client, Message::Welcome) => self.open(id),
            (ConnectionState::Connecting, Role::Client, Message::Reject { reason }) => {
                warn!("{id}: server rejected handshake: {reason}");
                self.set_state(id, ConnectionState::Closing);
            }
            (_, _, Message::Goodbye) => {
                debug!("{id}: peer said goodbye");
                self.set_state(id, ConnectionState::Closing);
            }
            (ConnectionState::Open, Role::Server, message @ Message::Input(_))
            | (
                ConnectionState::Open,
                Role::Client,
                message @ (Message::Spawn(_) | Message::Delta(_) | Message::Despawn { .. }),
            ) => out.push(Inbound {
                connection: id,
                message,
            }),
            (state, role, message) => {
                warn!(
                    "{id}: unexpected {:?} for {role:?} connection in state {state:?}",
                    message.tag()
                );
                self.set_state(id, ConnectionState::Closing);
            }
        }
    }

    fn send_raw(&mut self, id: ConnectionId, message: &Message) -> ReplicationResult<()> {
        let bytes = encode_message(message, &self.config.limits)?;
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(ReplicationError::NotOpen(id))?;
        match conn.link.send(&bytes) {
            Ok(()) => {
                trace!("{id}: sent {:?}", message.tag());
                Ok(())
            }
            Err(err) => {
                if err.is_fatal() && conn.state != ConnectionState::Closed {
                    debug!("{id}: send failed, closing: {err}");
                    conn.state = ConnectionState::Closing;
                }
                Err(err.into())
            }
        }
    }

    fn set_state(&mut self, id: ConnectionId, state: ConnectionState) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.state = state;
        }
    }

    fn open(&mut self, id: ConnectionId) {
        self.set_state(id, ConnectionState::Open);
        debug!("{id}: open");
        self.events.push(SessionEvent::Connected(id));
        for hook in &mut self.connected_hooks {
            hook(id);
        }
    }

    fn finish(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.remove(&id) else {
            return;
        };
        conn.link.close();
        debug!("{id}: closed ({} known entities dropped)", conn.known.len());
        self.events.push(SessionEvent::Disconnected(id));
        for hook in &mut self.disconnected_hooks {
            hook(id);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
