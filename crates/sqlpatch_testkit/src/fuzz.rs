//! Fuzz testing harnesses for sqlpatch.
//!
//! These targets take arbitrary bytes and can be driven by cargo-fuzz or by
//! proptest. They panic only when an invariant is broken.

use crate::fixtures::scenarios;
use sqlpatch_codec::{decode_changeset, decode_value, decode_varint, encode_value, encode_varint};
use sqlpatch_core::apply_changeset;
use std::convert::Infallible;

/// Fuzz target for stream decoding.
///
/// Arbitrary input either decodes or fails with an error. Every reported
/// instruction lies inside the buffer, after its table header, and in
/// increasing offset order.
pub fn fuzz_changeset_decode(data: &[u8]) {
    let mut last = None;
    let _ = decode_changeset(data, |instr| {
        assert!(instr.offset < data.len(), "instruction offset out of bounds");
        assert!(instr.table.offset < instr.offset, "instruction before its header");
        assert_eq!(
            instr.values.len(),
            instr.kind.value_count(instr.table.column_count()),
            "wrong value count"
        );
        if let Some(prev) = last {
            assert!(instr.offset > prev, "offsets must increase");
        }
        last = Some(instr.offset);
        Ok::<_, Infallible>(())
    });
}

/// Fuzz target for value decoding.
///
/// Anything that decodes re-encodes to the same value in no more bytes than
/// it was read from. Overlong length varints are valid input, so the bytes
/// themselves may differ.
pub fn fuzz_value_roundtrip(data: &[u8]) {
    if let Ok((value, used)) = decode_value(data, 0) {
        let mut out = Vec::new();
        encode_value(&mut out, &value);
        assert!(out.len() <= used, "re-encoded value longer than input");
        let (again, len) = decode_value(&out, 0).expect("re-encoded value must decode");
        assert_eq!(len, out.len(), "re-encoded value not fully consumed");
        assert_eq!(again, value, "value roundtrip mismatch");
    }
}

/// Fuzz target for varint decoding.
///
/// Decoding never reads more than nine bytes, and re-encoding never takes
/// more bytes than the input used.
pub fn fuzz_varint(data: &[u8]) {
    if let Ok((value, used)) = decode_varint(data, 0) {
        assert!((1..=9).contains(&used), "varint length {used}");
        let mut out = Vec::new();
        let len = encode_varint(&mut out, value);
        assert!(len <= used, "minimal encoding longer than input");
        assert_eq!(decode_varint(&out, 0).ok(), Some((value, len)));
    }
}

/// Fuzz target for applying.
///
/// Applies arbitrary bytes to the fruit store. A failed apply must leave the
/// table exactly as it was and the connection outside any transaction.
pub fn fuzz_apply(data: &[u8]) {
    let mut store = scenarios::fruit_store();
    let before = store.snapshot("Entries");

    let result = apply_changeset(&mut store.conn, data);
    assert!(store.is_autocommit(), "apply left a transaction open");
    if result.is_err() {
        assert_eq!(store.snapshot("Entries"), before, "failed apply changed the store");
    }
}
