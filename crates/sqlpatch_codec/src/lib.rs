//! # sqlpatch codec
//!
//! Binary changeset format for sqlpatch.
//!
//! A changeset is a sequence of table blocks. Each block names a table,
//! declares its column count and primary-key columns, and is followed by
//! row-level instructions (insert, delete, update) for that table.
//!
//! ## Format
//!
//! ```text
//! Stream      := TableBlock*
//! TableBlock  := 'T' Varint(nCol) PKFlag{nCol} CString(name) Instruction*
//! Instruction := Kind 0x00 Value{nCol}            (insert, delete)
//!              | Kind 0x00 Value{nCol} Value{nCol} (update: old, new)
//! Kind        := 18 insert | 9 delete | 23 update
//! Value       := 0 unchanged | 1 i64 | 2 f64 | 3 text | 4 blob | 5 null
//! ```
//!
//! Integers and floats are 8 bytes big-endian; text and blobs are a varint
//! length followed by raw bytes.
//!
//! ## Usage
//!
//! ```
//! use sqlpatch_codec::{decode_changeset, ChangesetWriter, InstructionKind, Value};
//!
//! let mut writer = ChangesetWriter::new();
//! writer
//!     .begin_table("Entries", &[true, false, false])?
//!     .insert(&[Value::Integer(2), Value::text("Clementine"), Value::text("Orange")])?;
//! let bytes = writer.into_bytes();
//!
//! let mut kinds = Vec::new();
//! decode_changeset(&bytes, |instr| {
//!     kinds.push(instr.kind);
//!     Ok::<_, std::convert::Infallible>(())
//! })
//! .unwrap();
//! assert_eq!(kinds, vec![InstructionKind::Insert]);
//! # Ok::<(), sqlpatch_codec::CodecError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod instruction;
mod value;
mod varint;

pub use decoder::{decode_changeset, decode_changeset_file, read_changeset_file};
pub use encoder::ChangesetWriter;
pub use error::{CodecError, CodecResult, StreamError};
pub use instruction::{
    decode_instruction, decode_table_header, Instruction, InstructionKind, TableDescriptor,
    TABLE_MARKER,
};
pub use value::{decode_value, encode_value, Value, ValueType};
pub use varint::{decode_fixed64, decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
