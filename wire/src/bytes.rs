//! Byte-level cursors for message bodies.
//!
//! All multi-byte integers are little-endian. Lengths and counts use LEB128
//! varints. The reader is bounds-checked and never panics on malformed input.

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};

/// Maximum encoded size of a `u32` varint.
pub const VARINT_MAX_BYTES: usize = 5;

/// A growable writer for encoding message bodies.
#[derive(Debug, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    /// Creates a new empty `ByteWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `ByteWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes the IEEE-754 bit pattern of `value`.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes a LEB128 varint.
    pub fn write_varu32(&mut self, mut value: u32) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.bytes.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Writes a varint length prefix followed by the UTF-8 bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::LimitsExceeded`] if `value` is longer than `max_len`.
    pub fn write_str(
        &mut self,
        value: &str,
        max_len: usize,
        kind: LimitKind,
    ) -> Result<(), EncodeError> {
        if value.len() > max_len {
            return Err(EncodeError::LimitsExceeded {
                kind,
                limit: max_len,
                actual: value.len(),
            });
        }
        let len = u32::try_from(value.len()).map_err(|_| EncodeError::LengthOverflow {
            length: value.len(),
        })?;
        self.write_varu32(len);
        self.bytes.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// A bounds-checked reader over a message body.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a new `ByteReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> WireResult<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> WireResult<u16> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> WireResult<u64> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    pub fn read_f32(&mut self) -> WireResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads a LEB128 varint of at most five bytes.
    pub fn read_varu32(&mut self) -> WireResult<u32> {
        let mut result = 0u32;
        for index in 0..VARINT_MAX_BYTES {
            let byte = self.read_u8()?;
            let shift = 7 * index as u32;
            // The fifth byte may only carry the top four bits.
            if index == VARINT_MAX_BYTES - 1 && byte & 0xF0 != 0 {
                return Err(DecodeError::InvalidVarint);
            }
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::InvalidVarint)
    }

    /// Reads a varint-prefixed UTF-8 string of at most `max_len` bytes.
    pub fn read_str(&mut self, max_len: usize, kind: LimitKind) -> WireResult<&'a str> {
        let len = self.read_varu32()? as usize;
        if len > max_len {
            return Err(DecodeError::LimitsExceeded {
                kind,
                limit: max_len,
                actual: len,
            });
        }
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Fails if any unread bytes remain.
    pub fn finish(&self) -> WireResult<()> {
        if self.remaining() != 0 {
            return Err(DecodeError::TrailingBytes {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn ensure(&self, len: usize) -> WireResult<()> {
        let available = self.remaining();
        if len > available {
            return Err(DecodeError::UnexpectedEof {
                requested: len,
                available,
            });
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}
