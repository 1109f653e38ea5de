//! Changeset wire serializer.

use crate::error::{CodecError, CodecResult};
use crate::instruction::{InstructionKind, TABLE_MARKER};
use crate::value::{encode_value, Value};
use crate::varint::encode_varint;
use bytes::{BufMut, Bytes, BytesMut};

/// Writes changesets in the wire format read by [`crate::decode_changeset`].
///
/// The writer does not compute differences; callers hand it rows that are
/// already known to be inserted, deleted or updated. Every instruction
/// belongs to the most recently started table block and must carry exactly
/// as many values as that table has columns.
///
/// # Example
///
/// ```
/// use sqlpatch_codec::{ChangesetWriter, Value};
///
/// let mut writer = ChangesetWriter::new();
/// writer
///     .begin_table("Entries", &[true, false, false])?
///     .insert(&[Value::Integer(2), Value::text("Clementine"), Value::text("Orange")])?;
/// let bytes = writer.into_bytes();
/// assert_eq!(bytes[0], b'T');
/// # Ok::<(), sqlpatch_codec::CodecError>(())
/// ```
#[derive(Debug, Default)]
pub struct ChangesetWriter {
    buffer: BytesMut,
    column_count: Option<usize>,
    instructions: usize,
}

impl ChangesetWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Starts a new table block.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or contains a NUL byte, or if the table
    /// has no columns.
    pub fn begin_table(&mut self, name: &str, primary_key: &[bool]) -> CodecResult<&mut Self> {
        if name.is_empty() || name.as_bytes().contains(&0) {
            return Err(CodecError::encoding_failed(format!(
                "invalid table name {name:?}"
            )));
        }
        if primary_key.is_empty() || u32::try_from(primary_key.len()).is_err() {
            return Err(CodecError::encoding_failed(format!(
                "table `{name}` must declare between 1 and {} columns",
                u32::MAX
            )));
        }

        self.buffer.put_u8(TABLE_MARKER);
        encode_varint(&mut self.buffer, primary_key.len() as u64);
        for &is_pk in primary_key {
            self.buffer.put_u8(u8::from(is_pk));
        }
        self.buffer.put_slice(name.as_bytes());
        self.buffer.put_u8(0);
        self.column_count = Some(primary_key.len());
        Ok(self)
    }

    /// Appends an insert of a full row.
    ///
    /// # Errors
    ///
    /// Fails if no table block is open or the row has the wrong width.
    pub fn insert(&mut self, row: &[Value<'_>]) -> CodecResult<&mut Self> {
        self.check_width(InstructionKind::Insert, row)?;
        self.put_instruction(InstructionKind::Insert, &[row])
    }

    /// Appends a delete. `Unchanged` slots are left out of the match.
    ///
    /// # Errors
    ///
    /// Fails if no table block is open or the row has the wrong width.
    pub fn delete(&mut self, row: &[Value<'_>]) -> CodecResult<&mut Self> {
        self.check_width(InstructionKind::Delete, row)?;
        self.put_instruction(InstructionKind::Delete, &[row])
    }

    /// Appends an update from a pre-image and a post-image.
    ///
    /// # Errors
    ///
    /// Fails if no table block is open or either image has the wrong width.
    pub fn update(&mut self, old: &[Value<'_>], new: &[Value<'_>]) -> CodecResult<&mut Self> {
        self.check_width(InstructionKind::Update, old)?;
        self.check_width(InstructionKind::Update, new)?;
        self.put_instruction(InstructionKind::Update, &[old, new])
    }

    /// Number of instructions written so far.
    pub fn instruction_count(&self) -> usize {
        self.instructions
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume this writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Consume this writer and return the encoded bytes without copying.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    fn check_width(&self, kind: InstructionKind, row: &[Value<'_>]) -> CodecResult<()> {
        let expected = self.column_count.ok_or_else(|| {
            CodecError::encoding_failed(format!("{} written before any table block", kind.name()))
        })?;
        if row.len() != expected {
            return Err(CodecError::encoding_failed(format!(
                "{} carries {} values, table has {expected} columns",
                kind.name(),
                row.len()
            )));
        }
        Ok(())
    }

    fn put_instruction(
        &mut self,
        kind: InstructionKind,
        images: &[&[Value<'_>]],
    ) -> CodecResult<&mut Self> {
        self.buffer.put_u8(kind.as_byte());
        self.buffer.put_u8(0);
        for value in images.iter().flat_map(|image| image.iter()) {
            encode_value(&mut self.buffer, value);
        }
        self.instructions += 1;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_insert_bytes() {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("t", &[true, false])
            .unwrap()
            .insert(&[Value::Integer(1), Value::text("ab")])
            .unwrap();
        assert_eq!(
            writer.as_bytes(),
            &[
                b'T', 2, 1, 0, b't', 0, // header
                18, 0, // INSERT, reserved
                1, 0, 0, 0, 0, 0, 0, 0, 1, // integer 1
                3, 2, b'a', b'b', // text "ab"
            ]
        );
        assert_eq!(writer.instruction_count(), 1);
    }

    #[test]
    fn update_writes_old_then_new() {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("t", &[true])
            .unwrap()
            .update(&[Value::Null], &[Value::Unchanged])
            .unwrap();
        assert_eq!(&writer.as_bytes()[5..], &[23, 0, 5, 0]);
    }

    #[test]
    fn rejects_bad_input() {
        let mut writer = ChangesetWriter::new();
        assert!(writer.insert(&[Value::Null]).is_err());
        assert!(writer.begin_table("", &[true]).is_err());
        assert!(writer.begin_table("a\0b", &[true]).is_err());
        assert!(writer.begin_table("t", &[]).is_err());

        writer.begin_table("t", &[true, false]).unwrap();
        assert!(writer.delete(&[Value::Null]).is_err());
        assert!(writer
            .update(&[Value::Null, Value::Null], &[Value::Null])
            .is_err());
        assert_eq!(writer.instruction_count(), 0);
    }
}
