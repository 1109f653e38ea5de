//! Streaming changeset decoder.

use crate::error::StreamError;
use crate::instruction::{decode_instruction, decode_table_header, Instruction, TABLE_MARKER};
use std::io;
use std::path::Path;
use tracing::{debug, trace};

/// Decodes a changeset and hands every instruction to `sink`, in stream order.
///
/// Decoding and sinking are interleaved: only the current instruction is held
/// in memory, and its value buffer is reused for the next one. The input is
/// never modified. An empty buffer is a valid, empty changeset.
///
/// # Errors
///
/// - [`StreamError::Codec`] as soon as any structure fails to decode
/// - [`StreamError::Callback`] with the sink's own error if the sink fails;
///   no further bytes are decoded
pub fn decode_changeset<F, E>(data: &[u8], mut sink: F) -> Result<(), StreamError<E>>
where
    F: FnMut(&Instruction<'_>) -> Result<(), E>,
{
    let mut offset = 0;
    let mut values = Vec::new();

    while offset < data.len() {
        let (table, used) = decode_table_header(data, offset)?;
        debug!(
            table = table.name,
            columns = table.column_count(),
            offset,
            "table block"
        );
        offset += used;

        while offset < data.len() && data[offset] != TABLE_MARKER {
            let (kind, used) = decode_instruction(data, offset, &table, &mut values)?;
            trace!(kind = kind.name(), offset, len = used, "instruction");
            let instruction = Instruction {
                table: &table,
                kind,
                values: &values,
                offset,
            };
            sink(&instruction).map_err(|source| StreamError::Callback { offset, source })?;
            offset += used;
        }
    }

    Ok(())
}

/// Reads a changeset file and decodes it with [`decode_changeset`].
///
/// # Errors
///
/// Returns [`StreamError::Io`] if the file cannot be read or is empty, and
/// otherwise the same errors as [`decode_changeset`].
pub fn decode_changeset_file<F, E>(path: impl AsRef<Path>, sink: F) -> Result<(), StreamError<E>>
where
    F: FnMut(&Instruction<'_>) -> Result<(), E>,
{
    let data = read_changeset_file(path.as_ref())?;
    decode_changeset(&data, sink)
}

/// Reads a whole changeset file, rejecting empty files.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or has no content.
pub fn read_changeset_file(path: &Path) -> io::Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    if data.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("changeset file {} is empty", path.display()),
        ));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::instruction::InstructionKind;
    use crate::value::Value;
    use crate::ChangesetWriter;
    use std::convert::Infallible;

    #[derive(Debug, PartialEq)]
    struct Seen {
        table: String,
        kind: InstructionKind,
        values: Vec<String>,
        offset: usize,
    }

    fn collect(data: &[u8]) -> Result<Vec<Seen>, StreamError<Infallible>> {
        let mut seen = Vec::new();
        decode_changeset(data, |instr| {
            seen.push(Seen {
                table: instr.table.name.to_string(),
                kind: instr.kind,
                values: instr.values.iter().map(ToString::to_string).collect(),
                offset: instr.offset,
            });
            Ok::<_, Infallible>(())
        })?;
        Ok(seen)
    }

    fn two_tables() -> Vec<u8> {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("fruit", &[true, false])
            .unwrap()
            .insert(&[Value::Integer(1), Value::text("kiwi")])
            .unwrap()
            .delete(&[Value::Integer(2), Value::Unchanged])
            .unwrap();
        writer
            .begin_table("veg", &[true])
            .unwrap()
            .update(&[Value::Integer(3)], &[Value::Integer(4)])
            .unwrap();
        writer.into_bytes()
    }

    #[test]
    fn empty_changeset_is_valid() {
        assert!(collect(&[]).unwrap().is_empty());
    }

    #[test]
    fn preserves_stream_order() {
        let seen = collect(&two_tables()).unwrap();
        let summary: Vec<_> = seen
            .iter()
            .map(|s| (s.table.as_str(), s.kind, s.values.join(",")))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("fruit", InstructionKind::Insert, "1,'kiwi'".to_string()),
                ("fruit", InstructionKind::Delete, "2,-".to_string()),
                ("veg", InstructionKind::Update, "3,4".to_string()),
            ]
        );
        // First instruction follows the 'T', count, 2 flags and "fruit\0".
        assert_eq!(seen[0].offset, 1 + 1 + 2 + 6);
    }

    #[test]
    fn table_block_without_instructions() {
        let mut data = b"T\x01\x01empty\x00".to_vec();
        data.extend(two_tables());
        assert_eq!(collect(&data).unwrap().len(), 3);
    }

    #[test]
    fn bad_marker_is_corrupt() {
        let err = collect(b"X\x01\x01t\x00").unwrap_err();
        assert!(matches!(
            err,
            StreamError::Codec(CodecError::Corrupt { offset: 0, .. })
        ));
    }

    #[test]
    fn truncated_instruction_stops_stream() {
        let mut data = two_tables();
        data.truncate(data.len() - 3);
        let err = collect(&data).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Codec(CodecError::InstructionCorrupt { .. })
        ));
    }

    #[test]
    fn sink_error_aborts_and_is_preserved() {
        let mut calls = 0;
        let err = decode_changeset(&two_tables(), |instr| {
            calls += 1;
            if instr.kind == InstructionKind::Delete {
                Err(format!("refused {}", instr.table.name))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        match err {
            StreamError::Callback { source, offset } => {
                assert_eq!(source, "refused fruit");
                assert!(offset > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn file_entrypoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.bin");
        std::fs::write(&path, two_tables()).unwrap();

        let mut count = 0;
        decode_changeset_file(&path, |_| {
            count += 1;
            Ok::<_, Infallible>(())
        })
        .unwrap();
        assert_eq!(count, 3);

        let empty = dir.path().join("empty.bin");
        std::fs::write(&empty, b"").unwrap();
        let err = decode_changeset_file(&empty, |_| Ok::<_, Infallible>(())).unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));

        let missing = dir.path().join("missing.bin");
        let err = decode_changeset_file(&missing, |_| Ok::<_, Infallible>(())).unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
    }
}
