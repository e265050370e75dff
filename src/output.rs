// ABOUTME: Position-tracked byte sink used by value codecs.
// ABOUTME: Varints use a trailing-ones header whose length is found with leading_zeros.

use crate::error::{Error, Result};
use crate::types::limits;
use std::io::Write;

/// A staging buffer that codecs append to.
///
/// The buffer grows on demand unless a maximum size is set, in which case a
/// write that would exceed it fails with [`Error::BufferExhausted`]. Nothing
/// reaches a destination writer until [`Output::flush_to`] is called.
#[derive(Debug, Clone)]
pub struct Output {
    buf: Vec<u8>,
    max_size: Option<usize>,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a growable output.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(limits::OUTPUT_CAPACITY)
    }

    /// Create a growable output with the given initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::bounded(capacity, None)
    }

    /// Create an output that never holds more than `max_size` bytes.
    #[must_use]
    pub fn fixed(max_size: usize) -> Self {
        Self::bounded(max_size, Some(max_size))
    }

    /// Create an output with an initial capacity and an optional maximum size.
    #[must_use]
    pub fn bounded(capacity: usize, max_size: Option<usize>) -> Self {
        let capacity = max_size.map_or(capacity, |max| capacity.min(max));
        Self {
            buf: Vec::with_capacity(capacity),
            max_size,
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// The bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the output and return the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Discard all written bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Discard everything written after `position`.
    pub fn truncate(&mut self, position: usize) {
        self.buf.truncate(position);
    }

    /// Write all staged bytes to `writer`, flush it, and empty the buffer.
    ///
    /// Returns the number of bytes written.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> Result<usize> {
        writer.write_all(&self.buf)?;
        writer.flush()?;
        let written = self.buf.len();
        self.buf.clear();
        Ok(written)
    }

    #[inline]
    fn require(&self, additional: usize) -> Result<()> {
        match self.max_size {
            Some(max) if self.buf.len() + additional > max => Err(Error::BufferExhausted),
            _ => Ok(()),
        }
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, byte: u8) -> Result<()> {
        self.require(1)?;
        self.buf.push(byte);
        Ok(())
    }

    /// Write a run of raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.require(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a boolean as a single byte (0 or 1).
    #[inline]
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Write an unsigned variable-length integer.
    ///
    /// The header byte carries one trailing 1 bit per extra byte, terminated
    /// by a 0 bit; the value follows in the remaining bits, little-endian.
    /// Values wider than 56 bits use a `0xff` header followed by 8 bytes.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        if value > 0x00ff_ffff_ffff_ffff {
            self.write_u8(0xff)?;
            return self.write_bytes(&value.to_le_bytes());
        }

        let extra_bytes = varint_extra_bytes(value);
        let shifted = (value << (1 + extra_bytes)) | ((1u64 << extra_bytes) - 1);
        let bytes = shifted.to_le_bytes();
        self.write_bytes(&bytes[..=extra_bytes])
    }

    /// Write a signed variable-length integer (zigzag, then varint).
    #[inline]
    pub fn write_varint_signed(&mut self, value: i64) -> Result<()> {
        self.write_varint(zigzag_encode(value))
    }

    /// Write a little-endian 32-bit float.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian 64-bit float.
    #[inline]
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a string as a varint byte length followed by UTF-8 bytes.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.write_varint(bytes.len() as u64)?;
        self.write_bytes(bytes)
    }
}

// =============================================================================
// Utility functions
// =============================================================================

/// Extra bytes needed after the header byte. Each byte carries 7 payload bits.
#[inline]
fn varint_extra_bytes(value: u64) -> usize {
    if value == 0 {
        return 0;
    }
    let highest_bit = 63 - value.leading_zeros() as usize;
    highest_bit / 7
}

#[inline]
pub(crate) fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}
