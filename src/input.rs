// ABOUTME: Position-tracked byte source used by value codecs.
// ABOUTME: Uses trailing_zeros on the inverted header byte to size varints.

#![allow(clippy::cast_possible_truncation)]

use crate::error::{Error, Result};
use crate::types::limits;

/// Validate and convert bytes to a UTF-8 string.
/// Uses simdutf8 for SIMD-accelerated validation when the feature is enabled.
#[cfg(feature = "simd-utf8")]
#[inline]
fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

/// Limits applied while reading primitive data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Maximum string length in bytes
    pub max_string_length: usize,
    /// Allow NUL characters in strings
    pub allow_nul: bool,
    /// Allow bytes after the root value
    pub allow_trailing_bytes: bool,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_string_length: limits::MAX_STRING_LENGTH,
            allow_nul: false,
            allow_trailing_bytes: false,
        }
    }
}

/// A reader over a byte slice.
pub struct Input<'a> {
    data: &'a [u8],
    pos: usize,
    limits: ReadLimits,
}

impl<'a> Input<'a> {
    /// Create a new input over `data` with default limits.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, ReadLimits::default())
    }

    /// Create a new input with custom limits.
    #[must_use]
    pub fn with_limits(data: &'a [u8], limits: ReadLimits) -> Self {
        Self {
            data,
            pos: 0,
            limits,
        }
    }

    /// Get the current position in the input.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the remaining bytes.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Check if we've reached the end of input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get the read limits.
    #[must_use]
    pub fn limits(&self) -> &ReadLimits {
        &self.limits
    }

    /// Read a single byte, advancing position.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::Truncated);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Read exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Truncated)?;
        if end > self.data.len() {
            return Err(Error::Truncated);
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a boolean byte.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::InvalidData(format!("boolean byte 0x{b:02x}"))),
        }
    }

    /// Read an unsigned variable-length integer.
    pub fn read_varint(&mut self) -> Result<u64> {
        let header = self.read_u8()?;

        // 0xff means a full 8-byte payload follows
        if header == 0xff {
            let bytes = self.read_bytes(8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            return Ok(u64::from_le_bytes(buf));
        }

        // Count trailing 1s (which is trailing 0s of inverted header) + 1
        let count = ((!header).trailing_zeros() + 1) as usize;

        let extra_bytes = count - 1;
        let mut buf = [0u8; 8];
        buf[0] = header;
        if extra_bytes > 0 {
            let bytes = self.read_bytes(extra_bytes)?;
            buf[1..=extra_bytes].copy_from_slice(bytes);
        }

        Ok(u64::from_le_bytes(buf) >> count)
    }

    /// Read a signed variable-length integer.
    #[inline]
    pub fn read_varint_signed(&mut self) -> Result<i64> {
        self.read_varint().map(zigzag_decode)
    }

    /// Read a varint used as a length or count, checked against `max`.
    pub fn read_len(&mut self, max: usize, exceeded: Error) -> Result<usize> {
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(len) if len <= max => Ok(len),
            _ => Err(exceeded),
        }
    }

    /// Read a little-endian 32-bit float.
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian 64-bit float.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_len(self.limits.max_string_length, Error::MaxStringLengthExceeded)?;
        let bytes = self.read_bytes(len)?;
        let s = validate_utf8(bytes)?;
        if !self.limits.allow_nul && memchr::memchr(0, bytes).is_some() {
            return Err(Error::NulCharacter);
        }
        Ok(s)
    }

    /// Check that the whole input was consumed.
    pub fn finish(&self) -> Result<()> {
        if !self.limits.allow_trailing_bytes && self.pos < self.data.len() {
            return Err(Error::TrailingBytes);
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
