//! VarInt encoding (LEB128) for frame length prefixes.
//!
//! Variable-length encoding where small values use fewer bytes:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes
//! - etc.

use crate::error::{MocapError, Result};

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Write a variable-length integer to a Vec<u8>
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a variable-length integer from the front of `data`.
///
/// Returns `(value, bytes_consumed)`, or `None` if `data` ends before the
/// integer does.
pub fn read_varint(data: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (pos, &byte) in data.iter().enumerate() {
        if pos >= MAX_VARINT_LEN {
            return Err(MocapError::Codec("VarInt overflow".to_string()));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(Some((result, pos + 1)));
        }

        shift += 7;
    }

    if data.len() >= MAX_VARINT_LEN {
        return Err(MocapError::Codec("VarInt overflow".to_string()));
    }
    Ok(None)
}

/// Calculate the number of bytes needed to encode a value as VarInt
pub fn varint_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    (bits + 6) / 7 // Ceiling division by 7
}
