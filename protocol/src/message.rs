//! Replication messages and their body encoding.
//!
//! Every message is one frame payload: the wire envelope followed by a
//! tag-specific body. Bodies must be consumed exactly; leftover bytes are a
//! decode error.

use wire::{
    decode_envelope, encode_envelope, ByteReader, ByteWriter, LimitKind, Limits, MessageTag,
};

use crate::delta::{EntityDelta, FieldMask};
use crate::error::{ProtocolError, ProtocolResult};
use crate::input::{InputEdge, InputEvent};
use crate::types::{EntityKind, EntityState, NetworkId, Vec2};

/// Everything needed to build a mirror of an entity on the receiving side.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntitySnapshot {
    pub id: NetworkId,
    pub kind: EntityKind,
    /// Entity that caused this one to exist (a bullet's shooter).
    pub owner: Option<NetworkId>,
    pub state: EntityState,
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Message {
    /// Client greeting.
    Hello { version: u8, protocol_hash: u64 },
    /// Server accepted the handshake.
    Welcome,
    /// Server refused the handshake.
    Reject { reason: String },
    Spawn(EntitySnapshot),
    Delta(EntityDelta),
    Despawn { id: NetworkId },
    Input(InputEvent),
    /// Orderly close.
    Goodbye,
}

impl Message {
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::Hello { .. } => MessageTag::Hello,
            Self::Welcome => MessageTag::Welcome,
            Self::Reject { .. } => MessageTag::Reject,
            Self::Spawn(_) => MessageTag::Spawn,
            Self::Delta(_) => MessageTag::Delta,
            Self::Despawn { .. } => MessageTag::Despawn,
            Self::Input(_) => MessageTag::Input,
            Self::Goodbye => MessageTag::Goodbye,
        }
    }
}

/// Encodes `message` into a frame payload (envelope plus body).
pub fn encode_message(message: &Message, limits: &Limits) -> ProtocolResult<Vec<u8>> {
    let mut writer = ByteWriter::with_capacity(32);
    encode_envelope(message.tag(), &mut writer);
    match message {
        Message::Hello {
            version,
            protocol_hash,
        } => {
            writer.write_u8(*version);
            writer.write_u64(*protocol_hash);
        }
        Message::Welcome | Message::Goodbye => {}
        Message::Reject { reason } => {
            writer.write_str(reason, limits.max_text_len, LimitKind::TextLength)?;
        }
        Message::Spawn(snapshot) => {
            writer.write_varu32(snapshot.id.raw());
            writer.write_str(
                snapshot.kind.as_str(),
                limits.max_kind_len,
                LimitKind::KindLength,
            )?;
            match snapshot.owner {
                Some(owner) => {
                    writer.write_u8(1);
                    writer.write_varu32(owner.raw());
                }
                None => writer.write_u8(0),
            }
            write_vec2(&mut writer, snapshot.state.position);
            write_vec2(&mut writer, snapshot.state.velocity);
        }
        Message::Delta(delta) => {
            writer.write_varu32(delta.id.raw());
            writer.write_u8(delta.mask().raw());
            for value in delta.values() {
                writer.write_f32(*value);
            }
        }
        Message::Despawn { id } => writer.write_varu32(id.raw()),
        Message::Input(event) => {
            writer.write_str(&event.action, limits.max_action_len, LimitKind::ActionLength)?;
            writer.write_u8(event.edge.to_u8());
        }
    }
    Ok(writer.finish())
}

/// Decodes a frame payload produced by [`encode_message`].
pub fn decode_message(payload: &[u8], limits: &Limits) -> ProtocolResult<Message> {
    let envelope = decode_envelope(payload)?;
    let mut reader = ByteReader::new(envelope.body);
    let message = match envelope.tag {
        MessageTag::Hello => Message::Hello {
            version: reader.read_u8()?,
            protocol_hash: reader.read_u64()?,
        },
        MessageTag::Welcome => Message::Welcome,
        MessageTag::Reject => Message::Reject {
            reason: reader
                .read_str(limits.max_text_len, LimitKind::TextLength)?
                .to_owned(),
        },
        MessageTag::Spawn => {
            let id = read_id(&mut reader)?;
            let kind = EntityKind::new(reader.read_str(limits.max_kind_len, LimitKind::KindLength)?);
            let owner = match reader.read_u8()? {
                0 => None,
                1 => Some(read_id(&mut reader)?),
                raw => return Err(ProtocolError::InvalidOwnerFlag { raw }),
            };
            let position = read_vec2(&mut reader)?;
            let velocity = read_vec2(&mut reader)?;
            Message::Spawn(EntitySnapshot {
                id,
                kind,
                owner,
                state: EntityState { position, velocity },
            })
        }
        MessageTag::Delta => {
            let id = read_id(&mut reader)?;
            let mask = FieldMask::from_raw(reader.read_u8()?)?;
            let mut values = Vec::with_capacity(mask.len());
            for _ in 0..mask.len() {
                values.push(reader.read_f32()?);
            }
            Message::Delta(EntityDelta::new(id, mask, values)?)
        }
        MessageTag::Despawn => Message::Despawn {
            id: read_id(&mut reader)?,
        },
        MessageTag::Input => {
            let action = reader
                .read_str(limits.max_action_len, LimitKind::ActionLength)?
                .to_owned();
            let edge = InputEdge::from_u8(reader.read_u8()?)?;
            Message::Input(InputEvent { action, edge })
        }
        MessageTag::Goodbye => Message::Goodbye,
    };
    reader.finish()?;
    Ok(message)
}

fn read_id(reader: &mut ByteReader<'_>) -> ProtocolResult<NetworkId> {
    NetworkId::new(reader.read_varu32()?).ok_or(ProtocolError::InvalidNetworkId)
}

fn write_vec2(writer: &mut ByteWriter, value: Vec2) {
    writer.write_f32(value.x);
    writer.write_f32(value.y);
}

fn read_vec2(reader: &mut ByteReader<'_>) -> ProtocolResult<Vec2> {
    Ok(Vec2::new(reader.read_f32()?, reader.read_f32()?))
}
