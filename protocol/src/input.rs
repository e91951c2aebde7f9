//! Logical input edges.

use crate::error::{ProtocolError, ProtocolResult};

/// Whether an action started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputEdge {
    Begin,
    End,
}

impl InputEdge {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Begin => 0,
            Self::End => 1,
        }
    }

    pub const fn from_u8(raw: u8) -> ProtocolResult<Self> {
        match raw {
            0 => Ok(Self::Begin),
            1 => Ok(Self::End),
            _ => Err(ProtocolError::InvalidEdge { raw }),
        }
    }
}

/// An input edge for a named action, as sent by a client.
///
/// The receiving side knows which connection it arrived on, so the source is
/// not part of the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputEvent {
    pub action: String,
    pub edge: InputEdge,
}

impl InputEvent {
    #[must_use]
    pub fn begin(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            edge: InputEdge::Begin,
        }
    }

    #[must_use]
    pub fn end(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            edge: InputEdge::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_byte_roundtrip() {
        for edge in [InputEdge::Begin, InputEdge::End] {
            assert_eq!(InputEdge::from_u8(edge.to_u8()).unwrap(), edge);
        }
    }

    #[test]
    fn edge_rejects_unknown_byte() {
        assert!(matches!(
            InputEdge::from_u8(2),
            Err(ProtocolError::InvalidEdge { raw: 2 })
        ));
    }

    #[test]
    fn event_constructors() {
        assert_eq!(InputEvent::begin("Shoot").edge, InputEdge::Begin);
        assert_eq!(InputEvent::end("MoveUp").action, "MoveUp");
    }
}
