//! Wire framing and message envelope for mpnet.
//!
//! This crate handles the binary wire format: the length-prefixed frames
//! carried by a byte stream, the version/tag envelope at the start of each
//! frame payload, the byte cursors used by message bodies, and limit
//! enforcement. It does not know what entities or inputs are, only how
//! frames are laid out.
//!
//! # Design Principles
//!
//! - **Stable wire format** - The envelope carries a version byte and tags never change meaning.
//! - **Bounded decoding** - All length fields are validated against limits before allocation.
//! - **No domain knowledge** - This crate handles framing, not game logic.
//!
//! # Example
//!
//! ```
//! use wire::{encode_frame, FrameDecoder, Limits};
//!
//! let limits = Limits::default();
//! let frame = encode_frame(&[1, 2, 3], &limits).unwrap();
//!
//! let mut decoder = FrameDecoder::new(limits);
//! decoder.push(&frame);
//! assert_eq!(decoder.next_frame().unwrap(), Some(vec![1, 2, 3]));
//! ```

mod bytes;
mod error;
mod frame;
mod header;
mod limits;

pub use bytes::{ByteReader, ByteWriter, VARINT_MAX_BYTES};
pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use frame::{encode_frame, FrameDecoder, FRAME_PREFIX_SIZE};
pub use header::{
    decode_envelope, encode_envelope, Envelope, MessageTag, ENVELOPE_SIZE, WIRE_VERSION,
};
pub use limits::Limits;
