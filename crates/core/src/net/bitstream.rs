//! Bit-granular stream
//!
//! One type serves both directions: a message's `serialize` walks its fields
//! once and the stream either writes them or reads into them, depending on
//! its mode. Bits are packed LSB first; multi-byte values are little-endian.
//! When the cursor sits on a byte boundary, whole values are copied with
//! `byteorder` instead of bit by bit.

use byteorder::{ByteOrder, LittleEndian};

/// Error type for stream reads and writes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Stream truncated: needed {needed} bits, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unknown message tag {0:#04x}")]
    UnknownTag(u8),

    #[error("{0} trailing bits after message")]
    TrailingBits(usize),

    #[error("String of {len} bytes exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    #[error("String is not valid UTF-8")]
    InvalidUtf8,
}

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Symmetric bit reader/writer
#[derive(Debug, Clone)]
pub struct BitStream {
    mode: Mode,
    buffer: Vec<u8>,
    /// Bits written (write mode) or consumed (read mode)
    cursor: usize,
}

impl BitStream {
    /// Empty stream in write mode
    pub fn writer() -> Self {
        Self {
            mode: Mode::Write,
            buffer: Vec::with_capacity(64),
            cursor: 0,
        }
    }

    /// Stream in read mode over a copy of `bytes`
    pub fn reader(bytes: &[u8]) -> Self {
        Self {
            mode: Mode::Read,
            buffer: bytes.to_vec(),
            cursor: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn is_writing(&self) -> bool {
        self.mode == Mode::Write
    }

    #[inline]
    fn is_aligned(&self) -> bool {
        self.cursor % 8 == 0
    }

    /// Bit position of the cursor
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Unread bits (read mode)
    pub fn remaining_bits(&self) -> usize {
        (self.buffer.len() * 8).saturating_sub(self.cursor)
    }

    /// Written bytes, last byte zero-padded
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn need(&self, bits: usize) -> Result<(), StreamError> {
        let remaining = self.remaining_bits();
        if bits > remaining {
            Err(StreamError::Truncated {
                needed: bits,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    fn put_bit(&mut self, bit: bool) {
        let index = self.cursor / 8;
        if index == self.buffer.len() {
            self.buffer.push(0);
        }
        if bit {
            self.buffer[index] |= 1 << (self.cursor % 8);
        }
        self.cursor += 1;
    }

    fn take_bit(&mut self) -> Result<bool, StreamError> {
        self.need(1)?;
        let bit = self.buffer[self.cursor / 8] >> (self.cursor % 8) & 1 != 0;
        self.cursor += 1;
        Ok(bit)
    }

    fn put_bits(&mut self, value: u64, count: u32) {
        for i in 0..count {
            self.put_bit(value >> i & 1 != 0);
        }
    }

    fn take_bits(&mut self, count: u32) -> Result<u64, StreamError> {
        self.need(count as usize)?;
        let mut value = 0u64;
        for i in 0..count {
            if self.take_bit()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    fn put_uint(&mut self, value: u64, nbytes: usize) {
        if self.is_aligned() {
            let start = self.buffer.len();
            self.buffer.resize(start + nbytes, 0);
            LittleEndian::write_uint(&mut self.buffer[start..], value, nbytes);
            self.cursor += nbytes * 8;
        } else {
            self.put_bits(value, nbytes as u32 * 8);
        }
    }

    fn take_uint(&mut self, nbytes: usize) -> Result<u64, StreamError> {
        if self.is_aligned() {
            self.need(nbytes * 8)?;
            let start = self.cursor / 8;
            let value = LittleEndian::read_uint(&self.buffer[start..start + nbytes], nbytes);
            self.cursor += nbytes * 8;
            Ok(value)
        } else {
            self.take_bits(nbytes as u32 * 8)
        }
    }

    fn serialize_uint(&mut self, value: u64, nbytes: usize) -> Result<u64, StreamError> {
        match self.mode {
            Mode::Write => {
                self.put_uint(value, nbytes);
                Ok(value)
            }
            Mode::Read => self.take_uint(nbytes),
        }
    }

    pub fn serialize_bool(&mut self, value: &mut bool) -> Result<(), StreamError> {
        match self.mode {
            Mode::Write => self.put_bit(*value),
            Mode::Read => *value = self.take_bit()?,
        }
        Ok(())
    }

    /// Low `count` bits of `value` (at most 32)
    pub fn serialize_bits(&mut self, value: &mut u32, count: u32) -> Result<(), StreamError> {
        let count = count.min(32);
        match self.mode {
            Mode::Write => self.put_bits(*value as u64, count),
            Mode::Read => *value = self.take_bits(count)? as u32,
        }
        Ok(())
    }

    pub fn serialize_u8(&mut self, value: &mut u8) -> Result<(), StreamError> {
        *value = self.serialize_uint(*value as u64, 1)? as u8;
        Ok(())
    }

    pub fn serialize_u16(&mut self, value: &mut u16) -> Result<(), StreamError> {
        *value = self.serialize_uint(*value as u64, 2)? as u16;
        Ok(())
    }

    pub fn serialize_u32(&mut self, value: &mut u32) -> Result<(), StreamError> {
        *value = self.serialize_uint(*value as u64, 4)? as u32;
        Ok(())
    }

    pub fn serialize_u64(&mut self, value: &mut u64) -> Result<(), StreamError> {
        *value = self.serialize_uint(*value, 8)?;
        Ok(())
    }

    pub fn serialize_i32(&mut self, value: &mut i32) -> Result<(), StreamError> {
        *value = self.serialize_uint(*value as u32 as u64, 4)? as u32 as i32;
        Ok(())
    }

    /// Raw IEEE-754 bits, so NaN payloads and signed zeros survive
    pub fn serialize_f32(&mut self, value: &mut f32) -> Result<(), StreamError> {
        *value = f32::from_bits(self.serialize_uint(value.to_bits() as u64, 4)? as u32);
        Ok(())
    }

    /// `[u16 length][UTF-8 bytes]`
    pub fn serialize_string_u16(&mut self, value: &mut String, max: usize) -> Result<(), StreamError> {
        let max = max.min(u16::MAX as usize);
        match self.mode {
            Mode::Write => {
                let len = value.len();
                if len > max {
                    return Err(StreamError::StringTooLong { len, max });
                }
                self.put_uint(len as u64, 2);
                for &byte in value.as_bytes() {
                    self.put_uint(byte as u64, 1);
                }
            }
            Mode::Read => {
                let len = self.take_uint(2)? as usize;
                if len > max {
                    return Err(StreamError::StringTooLong { len, max });
                }
                self.need(len * 8)?;
                let mut bytes = Vec::with_capacity(len);
                for _ in 0..len {
                    bytes.push(self.take_uint(1)? as u8);
                }
                *value = String::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8)?;
            }
        }
        Ok(())
    }

    /// Fail unless every bit has been consumed, allowing zero padding in the
    /// last byte
    pub fn finish(&self) -> Result<(), StreamError> {
        let remaining = self.remaining_bits();
        if remaining >= 8 {
            return Err(StreamError::TrailingBits(remaining));
        }
        if remaining > 0 {
            let last = self.buffer[self.buffer.len() - 1];
            if last >> (8 - remaining) != 0 {
                return Err(StreamError::TrailingBits(remaining));
            }
        }
        Ok(())
    }
}
