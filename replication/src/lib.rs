//! Entity and input replication for mpnet.
//!
//! The authoritative side owns a `bevy_ecs::World`, gives every replicated
//! entity a [`protocol::NetworkId`], and pushes spawns, per-tick deltas and
//! despawns to each open connection. Clients mirror that state into their
//! own world and send input edges back.
//!
//! The pieces are deliberately separate so a game can drive them from its
//! own loop:
//!
//! - [`SessionManager`]: handshake, lifecycle, per-connection known sets.
//! - [`EntityRegistry`] and [`Factories`]: id mapping and per-kind builders.
//! - [`spawn`], [`state`]: the spawn and state replicators.
//! - [`InputSender`], [`InputReceiver`], [`InputSink`]: input replication.
//!
//! All of it runs on the simulation thread.

mod apply;
mod components;
mod error;
mod factories;
mod input;
mod registry;
mod session;

pub mod spawn;
pub mod state;

pub use apply::{apply_inbound, apply_message};
pub use components::{read_state, write_state, Mirrored, NetworkEntity, Position, Velocity};
pub use error::{ReplicationError, ReplicationResult};
pub use factories::{Factories, Factory};
pub use input::{InputReceiver, InputSender, InputSink, SpawnRequest};
pub use registry::EntityRegistry;
pub use session::{
    ConnectionId, ConnectionState, Inbound, Role, SessionConfig, SessionEvent, SessionManager,
};
