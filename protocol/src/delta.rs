//! Per-field change masks and entity deltas.

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{EntityState, NetworkId};

/// A replicated field of [`EntityState`], in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Field {
    PositionX = 0,
    PositionY = 1,
    VelocityX = 2,
    VelocityY = 3,
}

impl Field {
    /// All fields in wire order.
    pub const ALL: [Self; 4] = [
        Self::PositionX,
        Self::PositionY,
        Self::VelocityX,
        Self::VelocityY,
    ];

    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    #[must_use]
    pub const fn get(self, state: &EntityState) -> f32 {
        match self {
            Self::PositionX => state.position.x,
            Self::PositionY => state.position.y,
            Self::VelocityX => state.velocity.x,
            Self::VelocityY => state.velocity.y,
        }
    }

    pub fn set(self, state: &mut EntityState, value: f32) {
        match self {
            Self::PositionX => state.position.x = value,
            Self::PositionY => state.position.y = value,
            Self::VelocityX => state.velocity.x = value,
            Self::VelocityY => state.velocity.y = value,
        }
    }
}

/// Set of changed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldMask(u8);

impl FieldMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b1111);

    /// Reserved bits mask (must be zero).
    const RESERVED_MASK: u8 = !0b1111;

    /// Creates a mask from raw bits, rejecting reserved bits.
    pub const fn from_raw(raw: u8) -> ProtocolResult<Self> {
        if raw & Self::RESERVED_MASK != 0 {
            return Err(ProtocolError::InvalidMask { raw });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates set fields in wire order.
    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL.into_iter().filter(move |field| self.contains(*field))
    }
}

/// Changed fields of one entity since the last state sent on a connection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntityDelta {
    pub id: NetworkId,
    mask: FieldMask,
    /// One value per set mask bit, in field order.
    values: Vec<f32>,
}

impl EntityDelta {
    /// Creates a delta, checking that `values` matches the mask.
    pub fn new(id: NetworkId, mask: FieldMask, values: Vec<f32>) -> ProtocolResult<Self> {
        if values.len() != mask.len() {
            return Err(ProtocolError::ValueCountMismatch {
                expected: mask.len(),
                actual: values.len(),
            });
        }
        Ok(Self { id, mask, values })
    }

    /// Diffs two states. Returns `None` when nothing changed.
    ///
    /// Fields compare by bit pattern so a NaN does not produce a delta every
    /// tick.
    #[must_use]
    pub fn between(id: NetworkId, old: &EntityState, new: &EntityState) -> Option<Self> {
        let mut mask = FieldMask::EMPTY;
        let mut values = Vec::new();
        for field in Field::ALL {
            let value = field.get(new);
            if field.get(old).to_bits() != value.to_bits() {
                mask.insert(field);
                values.push(value);
            }
        }
        if mask.is_empty() {
            return None;
        }
        Some(Self { id, mask, values })
    }

    #[must_use]
    pub const fn mask(&self) -> FieldMask {
        self.mask
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterates `(field, value)` pairs in wire order.
    pub fn changes(&self) -> impl Iterator<Item = (Field, f32)> + '_ {
        self.mask.iter().zip(self.values.iter().copied())
    }

    /// Overwrites the changed fields of `state`.
    pub fn apply_to(&self, state: &mut EntityState) {
        for (field, value) in self.changes() {
            field.set(state, value);
        }
    }
}
