//! # Binary Encoding
//!
//! Compact little-endian encoding with variable-length integer prefixes.
//!
//! ## Variable-length integers
//!
//! | Value range | Encoding |
//! |-------------|----------|
//! | `< 0xFD` | 1 byte |
//! | `<= 0xFFFF` | `0xFD` + u16 |
//! | `<= 0xFFFF_FFFF` | `0xFE` + u32 |
//! | otherwise | `0xFF` + u64 |
//!
//! Decoding rejects non-canonical prefixes so that every value has exactly
//! one encoding (content hashes depend on it).

use thiserror::Error;

/// Errors raised while decoding a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input ended before a field was complete.
    #[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A variable-length integer used a longer prefix than required.
    #[error("Non-canonical variable-length integer")]
    NonCanonicalVarInt,

    /// A declared length exceeds the permitted maximum.
    #[error("Length {len} exceeds maximum {max}")]
    LengthTooLarge { len: u64, max: u64 },

    /// Bytes remained after the last expected field.
    #[error("{count} trailing bytes after message")]
    TrailingBytes { count: usize },

    /// A field held a value outside its domain.
    #[error("Invalid value for {field}")]
    InvalidValue { field: &'static str },
}

/// Number of bytes `value` occupies as a variable-length integer.
pub fn var_int_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Append `value` as a variable-length integer.
pub fn write_var_int(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => buf.push(value as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Append a length-prefixed byte string.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Size of a length-prefixed byte string.
pub fn var_bytes_size(len: usize) -> usize {
    var_int_size(len as u64) + len
}

/// Cursor over an input buffer.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consume a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Consume a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Consume a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Consume a variable-length integer no larger than `max`.
    pub fn read_var_int(&mut self, max: u64) -> Result<u64, DecodeError> {
        let prefix = self.read_u8()?;
        let value = match prefix {
            0xFD => {
                let v = u16::from_le_bytes(self.read_array::<2>()?) as u64;
                if v < 0xFD {
                    return Err(DecodeError::NonCanonicalVarInt);
                }
                v
            }
            0xFE => {
                let v = u32::from_le_bytes(self.read_array::<4>()?) as u64;
                if v <= 0xFFFF {
                    return Err(DecodeError::NonCanonicalVarInt);
                }
                v
            }
            0xFF => {
                let v = self.read_u64()?;
                if v <= 0xFFFF_FFFF {
                    return Err(DecodeError::NonCanonicalVarInt);
                }
                v
            }
            small => small as u64,
        };
        if value > max {
            return Err(DecodeError::LengthTooLarge { len: value, max });
        }
        Ok(value)
    }

    /// Consume a length-prefixed byte string of at most `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<&'a [u8], DecodeError> {
        let len = self.read_var_int(max as u64)? as usize;
        self.read_bytes(len)
    }

    /// Succeeds only if every byte was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { count }),
        }
    }
}
