//! Column values carried by changeset instructions.

use crate::error::{CodecError, CodecResult};
use crate::varint::{byte_at, decode_fixed64, decode_varint, encode_varint, take};
use bytes::BufMut;
use serde::Serialize;
use std::fmt;

/// Wire tag identifying the type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ValueType {
    /// The slot carries no value.
    Unchanged = 0,
    /// 64-bit signed integer.
    Integer = 1,
    /// 64-bit IEEE-754 float.
    Float = 2,
    /// Text bytes.
    Text = 3,
    /// Binary blob.
    Blob = 4,
    /// SQL NULL.
    Null = 5,
}

impl ValueType {
    /// Converts a tag byte to a value type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Unchanged),
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::Text),
            4 => Some(Self::Blob),
            5 => Some(Self::Null),
            _ => None,
        }
    }

    /// Converts the value type to its tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single column value.
///
/// Text and blob payloads borrow from the changeset buffer they were decoded
/// from; decoding never copies them.
///
/// `Unchanged` and `Null` are distinct: `Null` assigns or matches SQL NULL,
/// while `Unchanged` means the slot is left out of the generated statement
/// entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// The slot carries no value.
    Unchanged,
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// Text bytes (normally UTF-8, not validated).
    Text(&'a [u8]),
    /// Binary blob.
    Blob(&'a [u8]),
}

impl<'a> Value<'a> {
    /// Text value from a string slice.
    pub fn text(s: &'a str) -> Self {
        Value::Text(s.as_bytes())
    }

    /// Returns the wire type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Unchanged => ValueType::Unchanged,
            Value::Null => ValueType::Null,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::Blob(_) => ValueType::Blob,
        }
    }

    /// Whether this slot is the "no value" marker.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Value::Unchanged)
    }

    /// Returns the text as a string slice when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::Text(bytes) => std::str::from_utf8(*bytes).ok(),
            _ => None,
        }
    }

    /// Number of bytes this value occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Value::Unchanged | Value::Null => 0,
            Value::Integer(_) | Value::Float(_) => 8,
            Value::Text(b) | Value::Blob(b) => {
                crate::varint::varint_len(b.len() as u64) + b.len()
            }
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unchanged => f.write_str("-"),
            Value::Null => f.write_str("NULL"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Text(bytes) => write!(f, "'{}'", String::from_utf8_lossy(bytes)),
            Value::Blob(bytes) => {
                f.write_str("x'")?;
                for b in bytes.iter() {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// Decodes one value starting at `offset`.
///
/// Returns the value and the number of bytes consumed, tag included.
///
/// # Errors
///
/// - [`CodecError::Corrupt`] for an unknown tag byte
/// - [`CodecError::Truncated`] if the payload runs past the buffer
pub fn decode_value(buf: &[u8], offset: usize) -> CodecResult<(Value<'_>, usize)> {
    let tag = byte_at(buf, offset)?;
    let ty = ValueType::from_byte(tag)
        .ok_or_else(|| CodecError::corrupt(offset, format!("unknown value type tag {tag:#04x}")))?;
    let payload = offset + 1;

    match ty {
        ValueType::Unchanged => Ok((Value::Unchanged, 1)),
        ValueType::Null => Ok((Value::Null, 1)),
        ValueType::Integer => Ok((Value::Integer(decode_fixed64(buf, payload)?), 9)),
        ValueType::Float => {
            let bits = decode_fixed64(buf, payload)?;
            Ok((Value::Float(f64::from_bits(bits as u64)), 9))
        }
        ValueType::Text | ValueType::Blob => {
            let (len, len_size) = decode_varint(buf, payload)?;
            let start = payload + len_size;
            let len = usize::try_from(len)
                .map_err(|_| CodecError::truncated(start.min(buf.len()), usize::MAX))?;
            let bytes = take(buf, start, len)?;
            let value = if ty == ValueType::Text {
                Value::Text(bytes)
            } else {
                Value::Blob(bytes)
            };
            Ok((value, 1 + len_size + len))
        }
    }
}

/// Appends the wire encoding of `value` to `out`.
pub fn encode_value<B: BufMut>(out: &mut B, value: &Value<'_>) {
    out.put_u8(value.value_type().as_byte());
    match value {
        Value::Unchanged | Value::Null => {}
        Value::Integer(n) => out.put_i64(*n),
        Value::Float(x) => out.put_u64(x.to_bits()),
        Value::Text(bytes) | Value::Blob(bytes) => {
            encode_varint(out, bytes.len() as u64);
            out.put_slice(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: Value<'_>) {
        let mut buf = Vec::new();
        encode_value(&mut buf, &value);
        assert_eq!(buf.len(), value.encoded_len());
        let (decoded, used) = decode_value(&buf, 0).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn payloadless_tags_are_one_byte() {
        assert_eq!(decode_value(&[0], 0).unwrap(), (Value::Unchanged, 1));
        assert_eq!(decode_value(&[5], 0).unwrap(), (Value::Null, 1));
    }

    #[test]
    fn integer_layout() {
        let buf = [1, 0, 0, 0, 0, 0, 0, 0, 2];
        assert_eq!(decode_value(&buf, 0).unwrap(), (Value::Integer(2), 9));
    }

    #[test]
    fn float_reinterprets_bits() {
        let mut buf = vec![2];
        buf.extend_from_slice(&1.5f64.to_bits().to_be_bytes());
        assert_eq!(decode_value(&buf, 0).unwrap(), (Value::Float(1.5), 9));
    }

    #[test]
    fn text_borrows_from_buffer() {
        let buf = [3, 5, b'O', b'r', b'a', b'n', b'g', 0xff];
        let (value, used) = decode_value(&buf, 0).unwrap();
        assert_eq!(used, 7);
        assert_eq!(value.as_str(), Some("Orang"));
        assert_eq!(value, Value::text("Orang"));
    }

    #[test]
    fn roundtrips() {
        roundtrip(Value::Unchanged);
        roundtrip(Value::Null);
        roundtrip(Value::Integer(i64::MIN));
        roundtrip(Value::Float(-0.25));
        roundtrip(Value::text("Gälb"));
        roundtrip(Value::Blob(&[0u8; 300]));
    }

    #[test]
    fn unknown_tag_is_corrupt() {
        assert!(matches!(
            decode_value(&[9], 0),
            Err(CodecError::Corrupt { offset: 0, .. })
        ));
        assert!(matches!(
            decode_value(&[0, 6], 1),
            Err(CodecError::Corrupt { offset: 1, .. })
        ));
    }

    #[test]
    fn truncated_payloads() {
        assert!(matches!(
            decode_value(&[1, 0, 0], 0),
            Err(CodecError::Truncated { .. })
        ));
        // Declares 10 bytes of text, provides 2.
        assert!(matches!(
            decode_value(&[3, 10, b'h', b'i'], 0),
            Err(CodecError::Truncated { offset: 2, wanted: 10 })
        ));
        // Length varint itself cut short.
        assert!(matches!(
            decode_value(&[4, 0x81], 0),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Unchanged.to_string(), "-");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::text("a").to_string(), "'a'");
        assert_eq!(Value::Blob(&[0xca, 0xfe]).to_string(), "x'cafe'");
    }

    proptest! {
        #[test]
        fn any_value_roundtrips(
            tag in 0u8..6,
            n in any::<i64>(),
            x in any::<f64>().prop_filter("NaN never compares equal", |x| !x.is_nan()),
            bytes in prop::collection::vec(any::<u8>(), 0..200),
        ) {
            let value = match tag {
                0 => Value::Unchanged,
                1 => Value::Integer(n),
                2 => Value::Float(x),
                3 => Value::Text(&bytes),
                4 => Value::Blob(&bytes),
                _ => Value::Null,
            };
            let mut buf = Vec::new();
            encode_value(&mut buf, &value);
            let (decoded, used) = decode_value(&buf, 0).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(used, buf.len());
        }
    }
}
