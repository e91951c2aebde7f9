//! Replication messages for mpnet.
//!
//! This crate defines what travels between a server and its clients: entity
//! snapshots created at spawn time, per-field deltas produced every tick,
//! despawns, input edges, and the handshake. It builds on the `wire` crate
//! for framing and byte cursors.
//!
//! # Example
//!
//! ```
//! use protocol::{decode_message, encode_message, EntityDelta, EntityState, Message, NetworkId, Vec2};
//! use wire::Limits;
//!
//! let id = NetworkId::new(1).unwrap();
//! let old = EntityState::at(Vec2::new(150.0, 150.0));
//! let new = EntityState::at(Vec2::new(150.0, 145.0));
//! let delta = EntityDelta::between(id, &old, &new).unwrap();
//!
//! let limits = Limits::default();
//! let bytes = encode_message(&Message::Delta(delta.clone()), &limits).unwrap();
//! assert_eq!(decode_message(&bytes, &limits).unwrap(), Message::Delta(delta));
//! ```

mod delta;
mod error;
mod hash;
mod input;
mod message;
mod types;

pub use delta::{EntityDelta, Field, FieldMask};
pub use error::{ProtocolError, ProtocolResult};
pub use hash::protocol_hash;
pub use input::{InputEdge, InputEvent};
pub use message::{decode_message, encode_message, EntitySnapshot, Message};
pub use types::{EntityKind, EntityState, NetworkId, Vec2};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        let _ = Field::ALL;
        let _ = FieldMask::EMPTY;
        let _ = InputEdge::Begin;
        let _ = Vec2::ZERO;
        let _: ProtocolResult<()> = Ok(());
        let _ = protocol_hash([], []);
    }

    #[test]
    fn message_tags_match_variants() {
        assert_eq!(Message::Welcome.tag(), wire::MessageTag::Welcome);
        assert_eq!(
            Message::Input(InputEvent::begin("Shoot")).tag(),
            wire::MessageTag::Input
        );
    }
}
