//! Dump command implementation.

use crate::Format;
use serde::Serialize;
use sqlpatch_codec::{
    decode_instruction, decode_table_header, read_changeset_file, CodecError, InstructionKind,
    TABLE_MARKER,
};
use std::path::Path;
use tracing::{debug, info};

/// One table block for output.
#[derive(Debug, Serialize)]
pub struct BlockInfo {
    /// Offset of the block's marker byte.
    pub offset: usize,
    /// Table name.
    pub table: String,
    /// Declared column count.
    pub columns: usize,
    /// Indices of primary-key columns.
    pub primary_key: Vec<usize>,
    /// Instructions of the block.
    pub instructions: Vec<InstructionInfo>,
}

/// One instruction for output.
#[derive(Debug, Serialize)]
pub struct InstructionInfo {
    /// Offset of the kind byte.
    pub offset: usize,
    /// Kind of change.
    pub kind: InstructionKind,
    /// Values in wire order, rendered as SQL-ish literals.
    pub values: Vec<String>,
}

/// Everything decoded from one changeset.
#[derive(Debug, Serialize)]
pub struct DumpResult {
    /// Size of the changeset in bytes.
    pub size: usize,
    /// Decoded blocks, up to the limit or the first error.
    pub blocks: Vec<BlockInfo>,
    /// Whether output stopped at the instruction limit.
    pub limited: bool,
    /// Decode error that ended the dump early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the dump command.
pub fn run(path: &Path, limit: Option<usize>, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    info!("Dumping changeset {:?}", path);
    let data = read_changeset_file(path)?;
    let (blocks, limited, error) = read_blocks(&data, limit);
    if limited {
        debug!(limit = ?limit, "dump stopped at instruction limit");
    }
    let result = DumpResult {
        size: data.len(),
        blocks,
        limited,
        error: error.as_ref().map(ToString::to_string),
    };

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    match error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Walks the stream block by block.
///
/// Unlike the streaming decoder this also reports blocks without
/// instructions, and keeps everything decoded before an error.
pub fn read_blocks(
    data: &[u8],
    limit: Option<usize>,
) -> (Vec<BlockInfo>, bool, Option<CodecError>) {
    let max_instructions = limit.unwrap_or(usize::MAX);
    let mut blocks = Vec::new();
    let mut values = Vec::new();
    let mut count = 0;
    let mut offset = 0;

    while offset < data.len() {
        let (table, used) = match decode_table_header(data, offset) {
            Ok(header) => header,
            Err(e) => return (blocks, false, Some(e)),
        };
        offset += used;

        let mut block = BlockInfo {
            offset: table.offset,
            table: table.name.to_string(),
            columns: table.column_count(),
            primary_key: table
                .primary_key
                .iter()
                .enumerate()
                .filter_map(|(i, &pk)| pk.then_some(i))
                .collect(),
            instructions: Vec::new(),
        };

        while offset < data.len() && data[offset] != TABLE_MARKER {
            if count >= max_instructions {
                blocks.push(block);
                return (blocks, true, None);
            }
            match decode_instruction(data, offset, &table, &mut values) {
                Ok((kind, used)) => {
                    block.instructions.push(InstructionInfo {
                        offset,
                        kind,
                        values: values.iter().map(ToString::to_string).collect(),
                    });
                    offset += used;
                    count += 1;
                }
                Err(e) => {
                    blocks.push(block);
                    return (blocks, false, Some(e));
                }
            }
        }
        blocks.push(block);
    }

    (blocks, false, None)
}

fn print_text_output(result: &DumpResult) {
    let total: usize = result.blocks.iter().map(|b| b.instructions.len()).sum();
    println!(
        "Changeset ({} bytes, {} blocks, {} instructions)",
        result.size,
        result.blocks.len(),
        total
    );
    println!("================");
    println!();

    for block in &result.blocks {
        println!(
            "[{:08}] TABLE {} columns={} pk={:?}",
            block.offset, block.table, block.columns, block.primary_key
        );
        for instr in &block.instructions {
            println!(
                "[{:08}]   {:6} {}",
                instr.offset,
                instr.kind.name(),
                instr.values.join(", ")
            );
        }
    }

    if result.limited {
        println!();
        println!("(stopped at instruction limit)");
    }
    if let Some(error) = &result.error {
        println!();
        println!("Decode error: {error}");
    }
}
