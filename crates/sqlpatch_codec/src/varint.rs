//! Variable-length and fixed-width integer primitives.
//!
//! Varints are big-endian groups of 7 bits with the high bit of each byte
//! signalling that another byte follows. The ninth byte, if reached,
//! contributes all 8 of its bits, which is what lets nine bytes carry a full
//! `u64`.

use crate::error::{CodecError, CodecResult};
use bytes::BufMut;

/// Longest possible varint encoding.
pub const MAX_VARINT_LEN: usize = 9;

/// Values at or above this need the nine-byte form.
const NINE_BYTE_THRESHOLD: u64 = 1 << 56;

/// Returns `len` bytes starting at `offset`, or a truncation error.
#[inline]
pub(crate) fn take(buf: &[u8], offset: usize, len: usize) -> CodecResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| CodecError::truncated(offset.min(buf.len()), len))
}

/// Returns the byte at `offset`, or a truncation error.
#[inline]
pub(crate) fn byte_at(buf: &[u8], offset: usize) -> CodecResult<u8> {
    buf.get(offset)
        .copied()
        .ok_or_else(|| CodecError::truncated(offset.min(buf.len()), 1))
}

/// Decodes a varint starting at `offset`.
///
/// Returns the value and the number of bytes it occupied (1 to 9).
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] if the buffer ends before the
/// terminating byte.
pub fn decode_varint(buf: &[u8], offset: usize) -> CodecResult<(u64, usize)> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN - 1 {
        let byte = byte_at(buf, offset + i)?;
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    let last = byte_at(buf, offset + MAX_VARINT_LEN - 1)?;
    Ok(((value << 8) | u64::from(last), MAX_VARINT_LEN))
}

/// Appends the shortest varint encoding of `value` to `out`.
///
/// Returns the number of bytes written.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_varint<B: BufMut>(out: &mut B, value: u64) -> usize {
    if value >= NINE_BYTE_THRESHOLD {
        let mut bytes = [0u8; MAX_VARINT_LEN];
        bytes[8] = value as u8;
        let mut rest = value >> 8;
        for byte in bytes[..8].iter_mut().rev() {
            *byte = (rest as u8 & 0x7f) | 0x80;
            rest >>= 7;
        }
        out.put_slice(&bytes);
        return MAX_VARINT_LEN;
    }

    // Collect groups least-significant first, then emit them reversed.
    let mut groups = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest as u8 & 0x7f) | 0x80;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    groups[0] &= 0x7f;
    for byte in groups[..len].iter().rev() {
        out.put_u8(*byte);
    }
    len
}

/// Number of bytes [`encode_varint`] would write for `value`.
pub fn varint_len(value: u64) -> usize {
    if value >= NINE_BYTE_THRESHOLD {
        return MAX_VARINT_LEN;
    }
    let bits = (64 - value.leading_zeros()) as usize;
    bits.div_ceil(7).max(1)
}

/// Reads exactly 8 bytes at `offset` as a big-endian signed integer.
///
/// FLOAT payloads use the same bytes reinterpreted with [`f64::from_bits`].
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] if fewer than 8 bytes remain.
pub fn decode_fixed64(buf: &[u8], offset: usize) -> CodecResult<i64> {
    let bytes = take(buf, offset, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_be_bytes(raw))
}
