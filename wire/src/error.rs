//! Error types for wire format operations.

use std::fmt;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors that can occur while decoding frames, envelopes or field data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Attempted to read past the end of the buffer.
    UnexpectedEof { requested: usize, available: usize },

    /// Varint did not terminate within 5 bytes.
    InvalidVarint,

    /// String bytes were not valid UTF-8.
    InvalidUtf8,

    /// Payload is too small to contain the message envelope.
    PayloadTooSmall { actual: usize, required: usize },

    /// Unsupported wire version in the envelope.
    UnsupportedVersion { found: u8 },

    /// Unknown message tag in the envelope.
    UnknownTag { tag: u8 },

    /// Bytes left over after the message body was fully parsed.
    TrailingBytes { remaining: usize },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    FrameBytes,
    KindLength,
    ActionLength,
    TextLength,
}

/// Errors that can occur during encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A length did not fit in its wire representation.
    LengthOverflow { length: usize },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} bytes but only {available} bytes available"
                )
            }
            Self::InvalidVarint => write!(f, "invalid varint"),
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
            Self::PayloadTooSmall { actual, required } => {
                write!(
                    f,
                    "payload too small: {actual} bytes, need at least {required}"
                )
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported wire version: {found}")
            }
            Self::UnknownTag { tag } => write!(f, "unknown message tag: {tag}"),
            Self::TrailingBytes { remaining } => {
                write!(f, "{remaining} trailing bytes after message body")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FrameBytes => "frame bytes",
            Self::KindLength => "entity kind length",
            Self::ActionLength => "action name length",
            Self::TextLength => "text length",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthOverflow { length } => {
                write!(f, "length overflow: {length}")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl std::error::Error for EncodeError {}
