//! Message envelope: the two bytes at the start of every frame payload.

use crate::bytes::ByteWriter;
use crate::error::{DecodeError, WireResult};

/// Current wire format version.
///
/// Peers exchange it in the handshake; a frame carrying any other version is
/// rejected rather than guessed at.
pub const WIRE_VERSION: u8 = 1;

/// Envelope size in bytes (version + tag).
pub const ENVELOPE_SIZE: usize = 2;

/// Message tags for version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    Hello = 1,
    Welcome = 2,
    Reject = 3,
    Spawn = 4,
    Delta = 5,
    Despawn = 6,
    Input = 7,
    Goodbye = 8,
}

impl MessageTag {
    /// Parses a message tag from a raw byte.
    pub fn parse(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(Self::Hello),
            2 => Ok(Self::Welcome),
            3 => Ok(Self::Reject),
            4 => Ok(Self::Spawn),
            5 => Ok(Self::Delta),
            6 => Ok(Self::Despawn),
            7 => Ok(Self::Input),
            8 => Ok(Self::Goodbye),
            _ => Err(DecodeError::UnknownTag { tag }),
        }
    }

    /// Returns `true` for tags that only appear during the handshake.
    #[must_use]
    pub const fn is_handshake(self) -> bool {
        matches!(self, Self::Hello | Self::Welcome | Self::Reject)
    }
}

/// A decoded envelope together with the message body that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub version: u8,
    pub tag: MessageTag,
    pub body: &'a [u8],
}

/// Writes the envelope for `tag` at the current writer position.
pub fn encode_envelope(tag: MessageTag, writer: &mut ByteWriter) {
    writer.write_u8(WIRE_VERSION);
    writer.write_u8(tag as u8);
}

/// Splits a frame payload into envelope and body.
pub fn decode_envelope(payload: &[u8]) -> WireResult<Envelope<'_>> {
    if payload.len() < ENVELOPE_SIZE {
        return Err(DecodeError::PayloadTooSmall {
            actual: payload.len(),
            required: ENVELOPE_SIZE,
        });
    }
    let version = payload[0];
    if version != WIRE_VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }
    let tag = MessageTag::parse(payload[1])?;
    Ok(Envelope {
        version,
        tag,
        body: &payload[ENVELOPE_SIZE..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parse_roundtrip() {
        for raw in 1u8..=8 {
            let tag = MessageTag::parse(raw).unwrap();
            assert_eq!(tag as u8, raw);
        }
    }

    #[test]
    fn tag_parse_rejects_unknown() {
        assert!(matches!(
            MessageTag::parse(0),
            Err(DecodeError::UnknownTag { tag: 0 })
        ));
        assert!(matches!(
            MessageTag::parse(9),
            Err(DecodeError::UnknownTag { tag: 9 })
        ));
    }

    #[test]
    fn handshake_tags() {
        assert!(MessageTag::Hello.is_handshake());
        assert!(MessageTag::Reject.is_handshake());
        assert!(!MessageTag::Spawn.is_handshake());
        assert!(!MessageTag::Goodbye.is_handshake());
    }

    #[test]
    fn envelope_roundtrip() {
        let mut writer = ByteWriter::new();
        encode_envelope(MessageTag::Delta, &mut writer);
        writer.write_u8(0xAA);
        let bytes = writer.finish();

        let envelope = decode_envelope(&bytes).unwrap();
        assert_eq!(envelope.version, WIRE_VERSION);
        assert_eq!(envelope.tag, MessageTag::Delta);
        assert_eq!(envelope.body, &[0xAA]);
    }

    #[test]
    fn envelope_rejects_short_payload() {
        let err = decode_envelope(&[WIRE_VERSION]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::PayloadTooSmall {
                actual: 1,
                required: 2
            }
        ));
    }

    #[test]
    fn envelope_rejects_other_version() {
        let err = decode_envelope(&[2, MessageTag::Spawn as u8]).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion { found: 2 }));
    }
}
