//! Error types for transport operations.

use std::{fmt, io};

use wire::{DecodeError, EncodeError};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by links, listeners and `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote address could not be reached. Not retried.
    Connect { addr: String, kind: io::ErrorKind },

    /// The link is closed, locally or by the peer.
    Disconnected,

    /// Socket setup or accept failed.
    Io { kind: io::ErrorKind },

    /// The peer sent a frame that could not be decoded. Fatal to the link.
    Malformed(DecodeError),

    /// An outbound payload could not be framed.
    Encode(EncodeError),
}

impl TransportError {
    /// Returns `true` if the link this error came from can no longer be used.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { addr, kind } => write!(f, "failed to connect to {addr}: {kind}"),
            Self::Disconnected => write!(f, "link disconnected"),
            Self::Io { kind } => write!(f, "socket error: {kind}"),
            Self::Malformed(err) => write!(f, "malformed frame: {err}"),
            Self::Encode(err) => write!(f, "cannot frame payload: {err}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io { kind: err.kind() }
    }
}

impl From<EncodeError> for TransportError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}
