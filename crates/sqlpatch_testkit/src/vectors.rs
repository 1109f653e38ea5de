//! Wire-format test vectors.
//!
//! Vectors are hex-encoded inputs with their expected decoding, so other
//! producers of the format can check themselves against the same bytes.

use serde::{Deserialize, Serialize};
use sqlpatch_codec::{decode_changeset, decode_value, decode_varint, CodecError, StreamError};
use std::convert::Infallible;

/// A test vector that can be shared with other implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded).
    pub input_hex: String,
    /// Expected decoding, one line per item.
    pub expected: Vec<String>,
    /// Expected error kind (if this should fail).
    pub expected_error: Option<String>,
}

impl TestVector {
    fn ok(id: &str, description: &str, input_hex: &str, expected: &[&str]) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_hex: input_hex.into(),
            expected: expected.iter().map(|s| (*s).to_string()).collect(),
            expected_error: None,
        }
    }

    fn err(id: &str, description: &str, input_hex: &str, error: &str) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_hex: input_hex.into(),
            expected: Vec::new(),
            expected_error: Some(error.into()),
        }
    }

    /// Decoded input bytes.
    pub fn input(&self) -> Vec<u8> {
        hex_decode(&self.input_hex)
    }
}

/// Varint test vectors.
pub fn varint_vectors() -> Vec<TestVector> {
    vec![
        TestVector::ok("varint_0", "Zero", "00", &["0"]),
        TestVector::ok("varint_127", "Largest 1-byte", "7f", &["127"]),
        TestVector::ok("varint_128", "Smallest 2-byte", "8100", &["128"]),
        TestVector::ok("varint_16383", "Largest 2-byte", "ff7f", &["16383"]),
        TestVector::ok("varint_16384", "Smallest 3-byte", "818000", &["16384"]),
        TestVector::ok(
            "varint_2_56",
            "Smallest 9-byte, last byte carries 8 bits",
            "80c080808080808000",
            &["72057594037927936"],
        ),
        TestVector::ok(
            "varint_max",
            "u64::MAX",
            "ffffffffffffffffff",
            &["18446744073709551615"],
        ),
        TestVector::err("varint_truncated", "Continuation bit at end", "8180", "truncated"),
    ]
}

/// Value test vectors.
pub fn value_vectors() -> Vec<TestVector> {
    vec![
        TestVector::ok("value_unchanged", "Unchanged marker", "00", &["-"]),
        TestVector::ok("value_null", "NULL", "05", &["NULL"]),
        TestVector::ok("value_int_neg2", "Integer -2", "01fffffffffffffffe", &["-2"]),
        TestVector::ok("value_float", "Float 1.5", "023ff8000000000000", &["1.5"]),
        TestVector::ok("value_text", "Text 'Hello'", "030548656c6c6f", &["'Hello'"]),
        TestVector::ok("value_text_empty", "Empty text", "0300", &["''"]),
        TestVector::ok("value_blob", "Blob 01 02 03", "0403010203", &["x'010203'"]),
        TestVector::ok(
            "value_text_overlong_len",
            "Text 'hi' with a two-byte length varint",
            "0380026869",
            &["'hi'"],
        ),
        TestVector::err("value_bad_tag", "Unknown type tag", "06", "corrupt"),
        TestVector::err("value_short_text", "Text shorter than its length", "0305414243", "truncated"),
        TestVector::err("value_short_int", "Integer with 3 payload bytes", "01000000", "truncated"),
    ]
}

/// Changeset stream test vectors.
pub fn changeset_vectors() -> Vec<TestVector> {
    const ENTRIES: &str = "5403010000456e747269657300";
    const T1: &str = "5401017400";

    vec![
        TestVector::ok("changeset_empty", "Empty stream", "", &[]),
        TestVector::ok(
            "changeset_insert",
            "Insert (2, 'Clementine', 'Orange') into Entries",
            &format!(
                "{ENTRIES}1200010000000000000002030a436c656d656e74696e6503064f72616e6765"
            ),
            &["Entries INSERT 2,'Clementine','Orange'"],
        ),
        TestVector::ok(
            "changeset_update",
            "Update Banane from Gälb to Gelb, Farbe only",
            &format!("{ENTRIES}170000030642616e616e65030547c3a46c620000030447656c62"),
            &["Entries UPDATE -,'Banane','Gälb',-,-,'Gelb'"],
        ),
        TestVector::ok(
            "changeset_delete",
            "Delete by integer key",
            &format!("{T1}0900010000000000000007"),
            &["t DELETE 7"],
        ),
        TestVector::ok(
            "changeset_empty_block",
            "Table block without instructions before another block",
            &format!("5401016500{T1}0900010000000000000007"),
            &["t DELETE 7"],
        ),
        TestVector::err("changeset_bad_marker", "Block opens with 'X'", "5801017400", "corrupt"),
        TestVector::err("changeset_zero_columns", "Zero column count", "54007400", "corrupt"),
        TestVector::err(
            "changeset_short_flags",
            "Header declares 3 columns, 1 flag present",
            "540301",
            "truncated",
        ),
        TestVector::err(
            "changeset_unknown_kind",
            "Instruction kind 7",
            &format!("{T1}070005"),
            "instruction_corrupt",
        ),
        TestVector::err(
            "changeset_short_value",
            "Text value cut short inside an instruction",
            &format!("{T1}120003054142"),
            "instruction_corrupt",
        ),
        TestVector::err(
            "changeset_missing_reserved",
            "Instruction without its reserved byte",
            &format!("{T1}12"),
            "truncated",
        ),
    ]
}

/// Decodes a changeset into one line per instruction:
/// `<table> <KIND> <v1>,<v2>,...`.
///
/// # Errors
///
/// Returns the error kind name (see [`error_kind`]).
pub fn describe_changeset(data: &[u8]) -> Result<Vec<String>, String> {
    let mut lines = Vec::new();
    let result = decode_changeset(data, |instr| {
        let values: Vec<String> = instr.values.iter().map(ToString::to_string).collect();
        lines.push(format!(
            "{} {} {}",
            instr.table.name,
            instr.kind.name(),
            values.join(",")
        ));
        Ok::<_, Infallible>(())
    });
    match result {
        Ok(()) => Ok(lines),
        Err(StreamError::Codec(e)) => Err(error_kind(&e).to_string()),
        Err(StreamError::Callback { source, .. }) => match source {},
        Err(StreamError::Io(e)) => Err(e.to_string()),
    }
}

/// Snake-case name of a codec error's kind.
pub fn error_kind(err: &CodecError) -> &'static str {
    match err {
        CodecError::Truncated { .. } => "truncated",
        CodecError::Corrupt { .. } => "corrupt",
        CodecError::InstructionCorrupt { .. } => "instruction_corrupt",
        CodecError::EncodingFailed { .. } => "encoding_failed",
    }
}

/// Checks one vector with `decode`, returning a description of any mismatch.
pub fn check_vector<F>(vector: &TestVector, decode: F) -> Result<(), String>
where
    F: FnOnce(&[u8]) -> Result<Vec<String>, String>,
{
    let actual = decode(&vector.input());
    let expected = match &vector.expected_error {
        Some(kind) => Err(kind.clone()),
        None => Ok(vector.expected.clone()),
    };
    if actual == expected {
        Ok(())
    } else {
        Err(format!(
            "vector {} ({}): expected {expected:?}, got {actual:?}",
            vector.id, vector.description
        ))
    }
}

/// Decodes a lone varint, requiring it to span the whole input.
pub fn describe_varint(data: &[u8]) -> Result<Vec<String>, String> {
    let (value, used) = decode_varint(data, 0).map_err(|e| error_kind(&e).to_string())?;
    if used != data.len() {
        return Err(format!("consumed {used} of {} bytes", data.len()));
    }
    Ok(vec![value.to_string()])
}

/// Decodes a lone value, requiring it to span the whole input.
pub fn describe_value(data: &[u8]) -> Result<Vec<String>, String> {
    let (value, used) = decode_value(data, 0).map_err(|e| error_kind(&e).to_string())?;
    if used != data.len() {
        return Err(format!("consumed {used} of {} bytes", data.len()));
    }
    Ok(vec![value.to_string()])
}

/// Generate all test vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        varint: varint_vectors(),
        value: value_vectors(),
        changeset: changeset_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    varint: Vec<TestVector>,
    value: Vec<TestVector>,
    changeset: Vec<TestVector>,
}

/// Encodes bytes as hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes hexadecimal string to bytes.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlpatch_codec::{encode_value, encode_varint};

    fn check_all(vectors: Vec<TestVector>, decode: fn(&[u8]) -> Result<Vec<String>, String>) {
        let failures: Vec<String> = vectors
            .iter()
            .filter_map(|v| check_vector(v, decode).err())
            .collect();
        assert!(failures.is_empty(), "{}", failures.join("\n"));
    }

    #[test]
    fn test_varint_vectors() {
        check_all(varint_vectors(), describe_varint);
    }

    #[test]
    fn test_value_vectors() {
        check_all(value_vectors(), describe_value);
    }

    #[test]
    fn test_changeset_vectors() {
        check_all(changeset_vectors(), describe_changeset);
    }

    #[test]
    fn test_varint_vectors_reencode() {
        for vector in varint_vectors().iter().filter(|v| v.expected_error.is_none()) {
            let n: u64 = vector.expected[0].parse().unwrap();
            let mut out = Vec::new();
            encode_varint(&mut out, n);
            assert_eq!(hex_encode(&out), vector.input_hex, "vector {}", vector.id);
        }
    }

    #[test]
    fn test_value_vectors_reencode() {
        for vector in value_vectors().iter().filter(|v| v.expected_error.is_none()) {
            let input = vector.input();
            let (value, _) = decode_value(&input, 0).unwrap();
            let mut out = Vec::new();
            encode_value(&mut out, &value);
            if vector.id.contains("overlong") {
                assert!(out.len() < input.len(), "vector {}", vector.id);
                assert_eq!(decode_value(&out, 0).unwrap().0, value, "vector {}", vector.id);
            } else {
                assert_eq!(out, input, "vector {}", vector.id);
            }
        }
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        assert!(json.contains("changeset_insert"));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed["varint"].as_array().map(Vec::len),
            Some(varint_vectors().len())
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let bytes = [0x00, 0x7f, 0xff];
        assert_eq!(hex_encode(&bytes), "007fff");
        assert_eq!(hex_decode("00 7f ff"), bytes);
    }
}
