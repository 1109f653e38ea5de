//! Inspect command implementation.

use crate::Format;
use serde::Serialize;
use sqlpatch_codec::{decode_changeset, read_changeset_file, InstructionKind, StreamError};
use std::convert::Infallible;
use std::path::Path;
use tracing::info;

/// Changeset inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Changeset path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Table blocks carrying at least one instruction.
    pub blocks: usize,
    /// Total instructions.
    pub instructions: usize,
    /// Per-table counts, in order of first appearance.
    pub tables: Vec<TableStats>,
}

/// Instruction counts for a single table.
#[derive(Debug, Default, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Declared column count.
    pub columns: usize,
    /// Number of inserts.
    pub inserts: usize,
    /// Number of updates.
    pub updates: usize,
    /// Number of deletes.
    pub deletes: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    info!("Inspecting changeset {:?}", path);
    let data = read_changeset_file(path)?;
    let mut result = summarize(&data)?;
    result.path = path.display().to_string();

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Counts blocks and instructions per table.
pub fn summarize(data: &[u8]) -> Result<InspectResult, StreamError<Infallible>> {
    let mut result = InspectResult {
        path: String::new(),
        size: data.len() as u64,
        blocks: 0,
        instructions: 0,
        tables: Vec::new(),
    };
    let mut last_block = None;

    decode_changeset(data, |instr| {
        if last_block != Some(instr.table.offset) {
            last_block = Some(instr.table.offset);
            result.blocks += 1;
        }
        result.instructions += 1;

        let index = match result.tables.iter().position(|t| t.name == instr.table.name) {
            Some(i) => i,
            None => {
                result.tables.push(TableStats {
                    name: instr.table.name.to_string(),
                    columns: instr.table.column_count(),
                    ..TableStats::default()
                });
                result.tables.len() - 1
            }
        };
        let table = &mut result.tables[index];
        match instr.kind {
            InstructionKind::Insert => table.inserts += 1,
            InstructionKind::Update => table.updates += 1,
            InstructionKind::Delete => table.deletes += 1,
        }
        Ok::<_, Infallible>(())
    })?;

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("sqlpatch Changeset Inspection");
    println!("=============================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", format_size(result.size));
    println!();
    println!("Blocks:       {}", result.blocks);
    println!("Instructions: {}", result.instructions);

    if !result.tables.is_empty() {
        println!();
        println!("Tables:");
        for table in &result.tables {
            println!(
                "  {} ({} columns): {} inserts, {} updates, {} deletes",
                table.name, table.columns, table.inserts, table.updates, table.deletes
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlpatch_codec::{ChangesetWriter, Value};

    #[test]
    fn counts_per_table() {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("a", &[true])
            .unwrap()
            .insert(&[Value::Integer(1)])
            .unwrap()
            .delete(&[Value::Integer(2)])
            .unwrap();
        writer
            .begin_table("b", &[true, false])
            .unwrap()
            .update(&[Value::Integer(1), Value::Unchanged], &[Value::Unchanged, Value::Null])
            .unwrap();
        writer
            .begin_table("a", &[true])
            .unwrap()
            .insert(&[Value::Integer(3)])
            .unwrap();

        let result = summarize(writer.as_bytes()).unwrap();
        assert_eq!(result.blocks, 3);
        assert_eq!(result.instructions, 4);
        assert_eq!(result.tables.len(), 2);
        assert_eq!(result.tables[0].name, "a");
        assert_eq!(result.tables[0].inserts, 2);
        assert_eq!(result.tables[0].deletes, 1);
        assert_eq!(result.tables[1].updates, 1);
    }

    #[test]
    fn corrupt_input_is_reported() {
        assert!(summarize(b"X").is_err());
        assert_eq!(summarize(&[]).unwrap().instructions, 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
