//! Length-prefixed framing for byte streams.
//!
//! Each frame is `{u32 little-endian payload length}{payload}`. The decoder
//! is incremental: feed it whatever the socket returned and pull out whole
//! frames as they complete.

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::limits::Limits;

/// Size of the length prefix in bytes.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Prepends the length prefix to `payload`.
pub fn encode_frame(payload: &[u8], limits: &Limits) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > limits.max_frame_bytes {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::FrameBytes,
            limit: limits.max_frame_bytes,
            actual: payload.len(),
        });
    }
    let len = u32::try_from(payload.len()).map_err(|_| EncodeError::LengthOverflow {
        length: payload.len(),
    })?;
    let mut out = Vec::with_capacity(FRAME_PREFIX_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Incremental frame decoder.
///
/// Once a frame length exceeds the limits the decoder is poisoned: every
/// later call returns the same error, since the stream can no longer be
/// resynchronised.
#[derive(Debug)]
pub struct FrameDecoder {
    limits: Limits,
    buf: Vec<u8>,
    poisoned: Option<DecodeError>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            buf: Vec::new(),
            poisoned: None,
        }
    }

    /// Appends raw stream bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.poisoned.is_none() {
            self.buf.extend_from_slice(bytes);
        }
    }

    /// Returns the number of buffered bytes not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete frame payload, if one is available.
    pub fn next_frame(&mut self) -> WireResult<Option<Vec<u8>>> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        if self.buf.len() < FRAME_PREFIX_SIZE {
            return Ok(None);
        }
        let mut prefix = [0u8; FRAME_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buf[..FRAME_PREFIX_SIZE]);
        let len = u32::from_le_bytes(prefix) as usize;
        if len > self.limits.max_frame_bytes {
            let err = DecodeError::LimitsExceeded {
                kind: LimitKind::FrameBytes,
                limit: self.limits.max_frame_bytes,
                actual: len,
            };
            self.buf.clear();
            self.poisoned = Some(err.clone());
            return Err(err);
        }
        let total = FRAME_PREFIX_SIZE + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let payload = self.buf[FRAME_PREFIX_SIZE..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(payload))
    }
}
