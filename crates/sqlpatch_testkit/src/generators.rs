//! Property-based test generators using proptest.
//!
//! Generated values are owned so they can outlive a strategy run; borrow them
//! as codec values with [`OwnedValue::as_value`].

use proptest::prelude::*;
use sqlpatch_codec::{ChangesetWriter, InstructionKind, Value};

/// An owned counterpart of [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    /// No value for this column.
    Unchanged,
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl OwnedValue {
    /// Borrows this value as a codec value.
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Self::Unchanged => Value::Unchanged,
            Self::Null => Value::Null,
            Self::Integer(v) => Value::Integer(*v),
            Self::Float(v) => Value::Float(*v),
            Self::Text(s) => Value::text(s),
            Self::Blob(b) => Value::Blob(b),
        }
    }
}

impl From<&Value<'_>> for OwnedValue {
    fn from(value: &Value<'_>) -> Self {
        match *value {
            Value::Unchanged => Self::Unchanged,
            Value::Null => Self::Null,
            Value::Integer(v) => Self::Integer(v),
            Value::Float(v) => Self::Float(v),
            Value::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            Value::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

/// One generated instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedOp {
    /// Kind of change.
    pub kind: InstructionKind,
    /// Values in wire order (pre-image first for updates).
    pub values: Vec<OwnedValue>,
}

/// One generated table block.
#[derive(Debug, Clone)]
pub struct GeneratedBlock {
    /// Table name.
    pub table: String,
    /// Primary-key flags, one per column.
    pub primary_key: Vec<bool>,
    /// Instructions of the block.
    pub ops: Vec<GeneratedOp>,
}

/// A generated changeset.
#[derive(Debug, Clone, Default)]
pub struct GeneratedChangeset {
    /// Table blocks in stream order.
    pub blocks: Vec<GeneratedBlock>,
}

impl GeneratedChangeset {
    /// Serializes the changeset to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = ChangesetWriter::new();
        for block in &self.blocks {
            writer
                .begin_table(&block.table, &block.primary_key)
                .expect("Generated table header must be valid");
            let n = block.primary_key.len();
            for op in &block.ops {
                let values: Vec<Value<'_>> = op.values.iter().map(OwnedValue::as_value).collect();
                let written = match op.kind {
                    InstructionKind::Insert => writer.insert(&values),
                    InstructionKind::Delete => writer.delete(&values),
                    InstructionKind::Update => writer.update(&values[..n], &values[n..]),
                };
                written.expect("Generated instruction must match its table");
            }
        }
        writer.into_bytes()
    }

    /// Total number of instructions.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.ops.len()).sum()
    }
}

/// Strategy for varints, biased towards encoding-length boundaries.
pub fn varint_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        any::<u64>(),
        (1u32..64).prop_map(|bits| 1u64 << bits),
        (1u32..64).prop_map(|bits| (1u64 << bits) - 1),
        Just(0u64),
        Just(u64::MAX),
    ]
}

/// Strategy for any value, including `Unchanged`. Floats are never NaN.
pub fn value_strategy() -> impl Strategy<Value = OwnedValue> {
    prop_oneof![
        Just(OwnedValue::Unchanged),
        bound_value_strategy(),
    ]
}

/// Strategy for values that can be bound to a statement.
pub fn bound_value_strategy() -> impl Strategy<Value = OwnedValue> {
    prop_oneof![
        Just(OwnedValue::Null),
        any::<i64>().prop_map(OwnedValue::Integer),
        any::<f64>()
            .prop_filter("NaN never compares equal", |f| !f.is_nan())
            .prop_map(OwnedValue::Float),
        ".{0,32}".prop_map(OwnedValue::Text),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(OwnedValue::Blob),
    ]
}

/// Strategy for valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_ ]{0,31}").expect("Invalid regex")
}

/// Strategy for one instruction on a table with `columns` columns.
pub fn op_strategy(columns: usize) -> impl Strategy<Value = GeneratedOp> {
    prop_oneof![
        Just(InstructionKind::Insert),
        Just(InstructionKind::Delete),
        Just(InstructionKind::Update),
    ]
    .prop_flat_map(move |kind| {
        prop::collection::vec(value_strategy(), kind.value_count(columns))
            .prop_map(move |values| GeneratedOp { kind, values })
    })
}

/// Strategy for a well-formed changeset of arbitrary tables.
pub fn changeset_strategy(max_blocks: usize) -> impl Strategy<Value = GeneratedChangeset> {
    let block = (1usize..8, table_name_strategy()).prop_flat_map(|(columns, table)| {
        (
            prop::collection::vec(any::<bool>(), columns),
            prop::collection::vec(op_strategy(columns), 0..10),
        )
            .prop_map(move |(primary_key, ops)| GeneratedBlock {
                table: table.clone(),
                primary_key,
                ops,
            })
    });
    prop::collection::vec(block, 0..=max_blocks)
        .prop_map(|blocks| GeneratedChangeset { blocks })
}

/// Strategy for inserts into the fruit table with fresh primary keys.
///
/// Every generated changeset applies cleanly to
/// [`scenarios::fruit_store`](crate::fixtures::scenarios::fruit_store).
pub fn fruit_insert_strategy() -> impl Strategy<Value = GeneratedChangeset> {
    prop::collection::btree_map(
        2i64..1_000_000,
        (
            prop::option::of("[A-Za-zäöü]{1,12}"),
            prop::option::of("[A-Za-zäöü]{1,12}"),
        ),
        0..50,
    )
    .prop_map(|rows| {
        let ops = rows
            .into_iter()
            .map(|(id, (name, farbe))| GeneratedOp {
                kind: InstructionKind::Insert,
                values: vec![
                    OwnedValue::Integer(id),
                    name.map_or(OwnedValue::Null, OwnedValue::Text),
                    farbe.map_or(OwnedValue::Null, OwnedValue::Text),
                ],
            })
            .collect();
        GeneratedChangeset {
            blocks: vec![GeneratedBlock {
                table: "Entries".to_string(),
                primary_key: crate::fixtures::FRUIT_PRIMARY_KEY.to_vec(),
                ops,
            }],
        }
    })
}

/// Strategy for arbitrary bytes, half of them starting with a table marker.
pub fn arbitrary_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..256),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(|mut bytes| {
            bytes.insert(0, b'T');
            bytes
        }),
    ]
}
