//! Error types for protocol operations.

use std::fmt;

use wire::{DecodeError, EncodeError};

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding replication messages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Frame-level or field-level decode error.
    Wire(DecodeError),

    /// Encode error from the wire layer.
    Encode(EncodeError),

    /// Field mask has reserved bits set.
    InvalidMask { raw: u8 },

    /// Delta value count does not match the mask popcount.
    ValueCountMismatch { expected: usize, actual: usize },

    /// A network ID of zero appeared where a real ID was required.
    InvalidNetworkId,

    /// Input edge byte was neither begin nor end.
    InvalidEdge { raw: u8 },

    /// Owner flag byte was neither 0 nor 1.
    InvalidOwnerFlag { raw: u8 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(err) => write!(f, "wire error: {err}"),
            Self::Encode(err) => write!(f, "encode error: {err}"),
            Self::InvalidMask { raw } => write!(f, "invalid field mask: {raw:#010b}"),
            Self::ValueCountMismatch { expected, actual } => {
                write!(f, "delta carries {actual} values, mask expects {expected}")
            }
            Self::InvalidNetworkId => write!(f, "network id 0 is reserved"),
            Self::InvalidEdge { raw } => write!(f, "invalid input edge: {raw}"),
            Self::InvalidOwnerFlag { raw } => write!(f, "invalid owner flag: {raw}"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for ProtocolError {
    fn from(err: DecodeError) -> Self {
        Self::Wire(err)
    }
}

impl From<EncodeError> for ProtocolError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_mask() {
        let err = ProtocolError::InvalidMask { raw: 0x10 };
        assert!(err.to_string().contains("0b00010000"));
    }

    #[test]
    fn wire_error_has_source() {
        let err: ProtocolError = DecodeError::InvalidUtf8.into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn value_count_display() {
        let err = ProtocolError::ValueCountMismatch {
            expected: 2,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('2'));
        assert!(msg.contains('3'));
    }
}
