//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlpatch_codec::{ChangesetWriter, Value};
use sqlpatch_testkit::FRUIT_PRIMARY_KEY;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random alphanumeric string of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Inserts of `rows` fruit rows with keys starting at `first_id`.
///
/// Names are random text of `payload` bytes; colours are random blobs of the
/// same size.
pub fn insert_changeset(first_id: i64, rows: usize, payload: usize) -> Vec<u8> {
    let mut writer = ChangesetWriter::with_capacity(rows * (2 * payload + 32));
    writer
        .begin_table("Entries", &FRUIT_PRIMARY_KEY)
        .expect("Failed to write header");
    for id in first_id..first_id + rows as i64 {
        let name = random_text(payload);
        let colour = random_data(payload);
        writer
            .insert(&[Value::Integer(id), Value::text(&name), Value::Blob(&colour)])
            .expect("Failed to write insert");
    }
    writer.into_bytes()
}

/// A mix of inserts, updates and deletes spread over `tables` table blocks.
pub fn mixed_changeset(tables: usize, per_table: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut writer = ChangesetWriter::new();
    for t in 0..tables {
        writer
            .begin_table(&format!("table_{t}"), &[true, false, false, false])
            .expect("Failed to write header");
        for i in 0..per_table as i64 {
            let text = random_text(16);
            let result = match rng.gen_range(0..3) {
                0 => writer.insert(&[
                    Value::Integer(i),
                    Value::text(&text),
                    Value::Float(rng.gen()),
                    Value::Null,
                ]),
                1 => writer.delete(&[
                    Value::Integer(i),
                    Value::Unchanged,
                    Value::Unchanged,
                    Value::Unchanged,
                ]),
                _ => writer.update(
                    &[Value::Integer(i), Value::Unchanged, Value::Unchanged, Value::Unchanged],
                    &[Value::Unchanged, Value::text(&text), Value::Unchanged, Value::Null],
                ),
            };
            result.expect("Failed to write instruction");
        }
    }
    writer.into_bytes()
}
