//! Table descriptors and row-level instructions.

use crate::error::{CodecError, CodecResult};
use crate::value::{decode_value, Value};
use crate::varint::{byte_at, decode_varint, take};
use serde::Serialize;

/// Byte that opens every table block.
pub const TABLE_MARKER: u8 = b'T';

/// Kind of row change an instruction carries.
///
/// The discriminants are SQLite's native row-change codes
/// (`SQLITE_DELETE`, `SQLITE_INSERT`, `SQLITE_UPDATE`), which is what
/// producers write on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum InstructionKind {
    /// Remove matching rows.
    Delete = 9,
    /// Add a row.
    Insert = 18,
    /// Rewrite matching rows.
    Update = 23,
}

impl InstructionKind {
    /// Converts a byte to an instruction kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            9 => Some(Self::Delete),
            18 => Some(Self::Insert),
            23 => Some(Self::Update),
            _ => None,
        }
    }

    /// Converts the instruction kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Number of values an instruction of this kind carries for a table
    /// with `column_count` columns.
    #[must_use]
    pub const fn value_count(self, column_count: usize) -> usize {
        match self {
            Self::Insert | Self::Delete => column_count,
            Self::Update => column_count * 2,
        }
    }

    /// Upper-case name used in dumps and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
        }
    }
}

/// Header of one table block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor<'a> {
    /// Table name.
    pub name: &'a str,
    /// One flag per column, `true` for primary-key columns.
    ///
    /// Carried through for tooling; applying a changeset does not use it.
    pub primary_key: Vec<bool>,
    /// Offset of the block's `'T'` marker in the stream.
    pub offset: usize,
}

impl<'a> TableDescriptor<'a> {
    /// Creates a descriptor not tied to a stream position.
    pub fn new(name: &'a str, primary_key: Vec<bool>) -> Self {
        Self {
            name,
            primary_key,
            offset: 0,
        }
    }

    /// Number of columns declared by the block.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.primary_key.len()
    }
}

/// One decoded row change.
///
/// Instructions are views: the table and values are owned by the stream
/// decoder and only live for the duration of one sink call.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    /// Table the instruction applies to.
    pub table: &'a TableDescriptor<'a>,
    /// Kind of change.
    pub kind: InstructionKind,
    /// `nCol` values for inserts and deletes, `2 * nCol` for updates
    /// (pre-image first, post-image second).
    pub values: &'a [Value<'a>],
    /// Offset of the instruction's kind byte in the stream.
    pub offset: usize,
}

impl<'a> Instruction<'a> {
    /// Values describing the row before the change (deletes and updates).
    pub fn old_values(&self) -> Option<&'a [Value<'a>]> {
        let n = self.table.column_count();
        match self.kind {
            InstructionKind::Delete => Some(self.values),
            InstructionKind::Update => self.values.get(..n),
            InstructionKind::Insert => None,
        }
    }

    /// Values describing the row after the change (inserts and updates).
    pub fn new_values(&self) -> Option<&'a [Value<'a>]> {
        let n = self.table.column_count();
        match self.kind {
            InstructionKind::Insert => Some(self.values),
            InstructionKind::Update => self.values.get(n..),
            InstructionKind::Delete => None,
        }
    }
}

/// Decodes a table block header starting at `offset`.
///
/// Layout: `'T'`, varint column count, one primary-key flag byte per column,
/// NUL-terminated table name.
///
/// # Errors
///
/// - [`CodecError::Corrupt`] for a wrong marker, a zero or oversized column
///   count, or an empty or non-UTF-8 table name
/// - [`CodecError::Truncated`] if the header runs past the buffer
pub fn decode_table_header(buf: &[u8], offset: usize) -> CodecResult<(TableDescriptor<'_>, usize)> {
    let marker = byte_at(buf, offset)?;
    if marker != TABLE_MARKER {
        return Err(CodecError::corrupt(
            offset,
            format!("expected table marker 'T', found {marker:#04x}"),
        ));
    }
    let mut pos = offset + 1;

    let (column_count, used) = decode_varint(buf, pos)?;
    if column_count == 0 || column_count > u64::from(u32::MAX) {
        return Err(CodecError::corrupt(
            pos,
            format!("invalid column count {column_count}"),
        ));
    }
    pos += used;

    // The flags are read before anything is sized by the column count, so a
    // bogus count fails as truncation instead of a huge allocation.
    let column_count = usize::try_from(column_count)
        .map_err(|_| CodecError::corrupt(pos, "column count does not fit in memory"))?;
    let flags = take(buf, pos, column_count)?;
    pos += column_count;

    let rest = &buf[pos..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::truncated(buf.len(), 1))?;
    if nul == 0 {
        return Err(CodecError::corrupt(pos, "empty table name"));
    }
    let name = std::str::from_utf8(&rest[..nul])
        .map_err(|_| CodecError::corrupt(pos, "table name is not valid UTF-8"))?;
    pos += nul + 1;

    let table = TableDescriptor {
        name,
        primary_key: flags.iter().map(|&b| b != 0).collect(),
        offset,
    };
    Ok((table, pos - offset))
}

/// Decodes one instruction for `table` starting at `offset`.
///
/// The decoded values replace the contents of `values`, which callers reuse
/// between instructions. Returns the kind and the number of bytes consumed.
///
/// # Errors
///
/// - [`CodecError::InstructionCorrupt`] for an unknown kind or any value that
///   fails to decode
/// - [`CodecError::Truncated`] if the reserved byte is missing
pub fn decode_instruction<'b>(
    buf: &'b [u8],
    offset: usize,
    table: &TableDescriptor<'_>,
    values: &mut Vec<Value<'b>>,
) -> CodecResult<(InstructionKind, usize)> {
    let kind_byte = byte_at(buf, offset)?;
    let kind = InstructionKind::from_byte(kind_byte).ok_or_else(|| {
        CodecError::instruction_corrupt(
            offset,
            format!("unknown instruction kind {kind_byte:#04x}"),
        )
    })?;
    // Reserved byte, always zero from current producers.
    byte_at(buf, offset + 1)?;
    let mut pos = offset + 2;

    let count = kind.value_count(table.column_count());
    values.clear();
    values.reserve(count);
    for i in 0..count {
        let (value, used) = decode_value(buf, pos).map_err(|e| {
            CodecError::instruction_corrupt(
                offset,
                format!("{} on `{}`, value {i}: {e}", kind.name(), table.name),
            )
        })?;
        values.push(value);
        pos += used;
    }

    Ok((kind, pos - offset))
}
