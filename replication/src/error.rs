//! Error types for replication.

use std::fmt;

use bevy_ecs::prelude::Entity;
use protocol::{EntityKind, NetworkId, ProtocolError};
use transport::TransportError;

use crate::session::ConnectionId;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors raised while replicating entities and inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationError {
    /// No factory is registered for this kind. The spawn is dropped.
    UnknownKind(EntityKind),

    /// A message named an id with no local entity. Dropped silently.
    StaleReference(NetworkId),

    /// The entity has no `Position` component to replicate.
    MissingState(Entity),

    /// The connection is not open (or no longer exists).
    NotOpen(ConnectionId),

    /// Every network id has been handed out.
    IdsExhausted,

    /// Message encoding failed.
    Protocol(ProtocolError),

    /// The link failed.
    Transport(TransportError),
}

impl ReplicationError {
    /// Returns `true` for errors that are expected in normal operation and
    /// should not be reported.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::StaleReference(_))
    }
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(kind) => write!(f, "no factory registered for kind `{kind}`"),
            Self::StaleReference(id) => write!(f, "no local entity for network id {id}"),
            Self::MissingState(entity) => write!(f, "entity {entity:?} has no replicated state"),
            Self::NotOpen(connection) => write!(f, "connection {connection} is not open"),
            Self::IdsExhausted => write!(f, "network ids exhausted"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for ReplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ReplicationError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<TransportError> for ReplicationError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_display() {
        let err = ReplicationError::UnknownKind(EntityKind::from("dragon"));
        assert!(err.to_string().contains("`dragon`"));
    }

    #[test]
    fn only_stale_references_are_silent() {
        let id = NetworkId::new(3).unwrap();
        assert!(ReplicationError::StaleReference(id).is_silent());
        assert!(!ReplicationError::UnknownKind(EntityKind::from("x")).is_silent());
        assert!(!ReplicationError::IdsExhausted.is_silent());
    }
}
