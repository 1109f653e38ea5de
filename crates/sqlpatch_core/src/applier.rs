//! Turns decoded instructions into statements against the store.

use crate::error::{ApplyError, ApplyResult};
use crate::schema::SchemaCache;
use crate::sql::{Predicate, Statement};
use crate::stats::ApplyStats;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use sqlpatch_codec::{Instruction, InstructionKind, Value};
use tracing::{debug, trace};

/// Binds a decoded value without copying its payload.
struct SqlValue<'v>(&'v Value<'v>);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match *self.0 {
            Value::Null => ValueRef::Null,
            Value::Integer(v) => ValueRef::Integer(v),
            Value::Float(v) => ValueRef::Real(v),
            Value::Text(bytes) => ValueRef::Text(bytes),
            Value::Blob(bytes) => ValueRef::Blob(bytes),
            Value::Unchanged => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "unchanged value cannot be bound".into(),
                ))
            }
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Applies instructions one at a time, in the order they are handed over.
///
/// Owns the column-name cache and the counters of one apply run.
pub(crate) struct Applier<'c> {
    conn: &'c Connection,
    schema: SchemaCache,
    predicate: Predicate,
    stats: ApplyStats,
    block: Option<usize>,
}

impl<'c> Applier<'c> {
    pub(crate) fn new(conn: &'c Connection, predicate: Predicate) -> Self {
        Self {
            conn,
            schema: SchemaCache::new(),
            predicate,
            stats: ApplyStats::default(),
            block: None,
        }
    }

    pub(crate) fn stats(&self) -> ApplyStats {
        self.stats
    }

    /// Synthesizes and executes the statement for one instruction.
    pub(crate) fn apply(&mut self, instr: &Instruction<'_>) -> ApplyResult<()> {
        let table = instr.table;
        if self.block != Some(table.offset) {
            self.block = Some(table.offset);
            self.stats.tables += 1;
            debug!(
                table = table.name,
                columns = table.column_count(),
                offset = table.offset,
                "applying table block"
            );
        }

        let columns = self.schema.column_names(self.conn, table.name)?;
        if columns.len() != table.column_count() {
            return Err(ApplyError::schema(
                table.name,
                format!(
                    "changeset declares {} columns, table has {}",
                    table.column_count(),
                    columns.len()
                ),
            ));
        }

        let (statement, params) = match instr.kind {
            InstructionKind::Insert => {
                let row = image(instr, instr.new_values())?;
                if let Some(i) = row.iter().position(Value::is_unchanged) {
                    return Err(ApplyError::instruction_corrupt(
                        instr.offset,
                        format!("insert into `{}` has no value for column {i}", table.name),
                    ));
                }
                let statement = Statement::Insert {
                    table: table.name,
                    columns: row.len(),
                };
                (statement, row.iter().map(SqlValue).collect::<Vec<_>>())
            }
            InstructionKind::Delete => {
                let old = image(instr, instr.old_values())?;
                let (filter, params) = changed_columns(table.name, columns, old)?;
                if filter.is_empty() {
                    return Err(ApplyError::instruction_corrupt(
                        instr.offset,
                        format!("delete from `{}` has no predicate columns", table.name),
                    ));
                }
                let statement = Statement::Delete {
                    table: table.name,
                    filter,
                    predicate: self.predicate,
                };
                (statement, params)
            }
            InstructionKind::Update => {
                let old = image(instr, instr.old_values())?;
                let new = image(instr, instr.new_values())?;
                let (assign, mut params) = changed_columns(table.name, columns, new)?;
                if assign.is_empty() {
                    return Err(ApplyError::instruction_corrupt(
                        instr.offset,
                        format!("update of `{}` assigns no columns", table.name),
                    ));
                }
                let (filter, filter_params) = changed_columns(table.name, columns, old)?;
                if filter.is_empty() {
                    return Err(ApplyError::instruction_corrupt(
                        instr.offset,
                        format!("update of `{}` has no predicate columns", table.name),
                    ));
                }
                params.extend(filter_params);
                let statement = Statement::Update {
                    table: table.name,
                    assign,
                    filter,
                    predicate: self.predicate,
                };
                (statement, params)
            }
        };

        let rows = execute(self.conn, &statement, &params)?;
        if rows == 0 && instr.kind != InstructionKind::Insert {
            debug!(
                table = table.name,
                kind = instr.kind.name(),
                offset = instr.offset,
                "instruction matched no rows"
            );
        }
        self.stats.record(instr.kind, rows);
        Ok(())
    }
}

fn image<'a>(instr: &Instruction<'a>, values: Option<&'a [Value<'a>]>) -> ApplyResult<&'a [Value<'a>]> {
    values.ok_or_else(|| {
        ApplyError::instruction_corrupt(
            instr.offset,
            format!("{} is missing a row image", instr.kind.name()),
        )
    })
}

/// Pairs every non-Unchanged value with its column name, in column order.
fn changed_columns<'s, 'v>(
    table: &str,
    columns: &'s [String],
    values: &'v [Value<'v>],
) -> ApplyResult<(Vec<&'s str>, Vec<SqlValue<'v>>)> {
    let mut names = Vec::new();
    let mut params = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if value.is_unchanged() {
            continue;
        }
        let name = columns.get(i).ok_or_else(|| {
            ApplyError::schema(
                table,
                format!("column {i} out of range for {} columns", columns.len()),
            )
        })?;
        names.push(name.as_str());
        params.push(SqlValue(value));
    }
    Ok((names, params))
}

fn execute(conn: &Connection, statement: &Statement<'_>, params: &[SqlValue<'_>]) -> ApplyResult<usize> {
    let sql = statement.to_sql();
    trace!(%sql, params = params.len(), "executing statement");
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(params_from_iter(params.iter()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyErrorKind;
    use sqlpatch_codec::TableDescriptor;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe TEXT);
             INSERT INTO Entries VALUES (0, 'Apfel', 'Grün'), (1, 'Banane', 'Gälb');",
        )
        .unwrap();
        conn
    }

    fn instruction<'a>(
        table: &'a TableDescriptor<'a>,
        kind: InstructionKind,
        values: &'a [Value<'a>],
    ) -> Instruction<'a> {
        Instruction {
            table,
            kind,
            values,
            offset: 42,
        }
    }

    fn farbe(conn: &Connection, id: i64) -> Option<String> {
        conn.query_row("SELECT Farbe FROM Entries WHERE ID = ?1", [id], |r| r.get(0))
            .ok()
    }

    #[test]
    fn insert_binds_every_value() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [Value::Integer(2), Value::text("Clementine"), Value::Null];
        let mut applier = Applier::new(&conn, Predicate::Equals);
        applier
            .apply(&instruction(&table, InstructionKind::Insert, &values))
            .unwrap();

        let name: String = conn
            .query_row("SELECT Name FROM Entries WHERE ID = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Clementine");
        assert_eq!(farbe(&conn, 2), None);
        assert_eq!(applier.stats().inserts, 1);
        assert_eq!(applier.stats().tables, 1);
    }

    #[test]
    fn update_touches_only_changed_columns() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [
            Value::Integer(1),
            Value::Unchanged,
            Value::text("Gälb"),
            Value::Unchanged,
            Value::Unchanged,
            Value::text("Gelb"),
        ];
        let mut applier = Applier::new(&conn, Predicate::Equals);
        applier
            .apply(&instruction(&table, InstructionKind::Update, &values))
            .unwrap();

        assert_eq!(farbe(&conn, 1).as_deref(), Some("Gelb"));
        assert_eq!(farbe(&conn, 0).as_deref(), Some("Grün"));
        assert_eq!(applier.stats().rows_affected, 1);
    }

    #[test]
    fn delete_without_predicate_is_rejected() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [Value::Unchanged; 3];
        let mut applier = Applier::new(&conn, Predicate::Equals);
        let err = applier
            .apply(&instruction(&table, InstructionKind::Delete, &values))
            .unwrap_err();
        assert_eq!(err.kind(), ApplyErrorKind::InstructionCorrupt);

        let count: i64 = conn
            .query_row("SELECT count(*) FROM Entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn update_without_assignments_is_rejected() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [
            Value::Integer(1),
            Value::Unchanged,
            Value::Unchanged,
            Value::Unchanged,
            Value::Unchanged,
            Value::Unchanged,
        ];
        let err = Applier::new(&conn, Predicate::Equals)
            .apply(&instruction(&table, InstructionKind::Update, &values))
            .unwrap_err();
        assert_eq!(err.kind(), ApplyErrorKind::InstructionCorrupt);
    }

    #[test]
    fn insert_with_unchanged_slot_is_rejected() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [Value::Integer(5), Value::Unchanged, Value::Null];
        let err = Applier::new(&conn, Predicate::Equals)
            .apply(&instruction(&table, InstructionKind::Insert, &values))
            .unwrap_err();
        assert_eq!(err.kind(), ApplyErrorKind::InstructionCorrupt);
    }

    #[test]
    fn column_count_mismatch_is_schema_error() {
        let conn = conn();
        let table = TableDescriptor::new("Entries", vec![true, false]);
        let values = [Value::Integer(5), Value::text("Kiwi")];
        let err = Applier::new(&conn, Predicate::Equals)
            .apply(&instruction(&table, InstructionKind::Insert, &values))
            .unwrap_err();
        assert_eq!(err.kind(), ApplyErrorKind::Schema);
    }

    #[test]
    fn null_safe_predicate_matches_null() {
        let conn = conn();
        conn.execute_batch("UPDATE Entries SET Farbe = NULL WHERE ID = 0")
            .unwrap();
        let table = TableDescriptor::new("Entries", vec![true, false, false]);
        let values = [Value::Unchanged, Value::text("Apfel"), Value::Null];

        let mut strict = Applier::new(&conn, Predicate::Equals);
        strict
            .apply(&instruction(&table, InstructionKind::Delete, &values))
            .unwrap();
        assert_eq!(strict.stats().rows_affected, 0);

        let mut null_safe = Applier::new(&conn, Predicate::Is);
        null_safe
            .apply(&instruction(&table, InstructionKind::Delete, &values))
            .unwrap();
        assert_eq!(null_safe.stats().rows_affected, 1);
    }

    #[test]
    fn binds_every_value_type() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (i, f, s, b, n)").unwrap();
        let table = TableDescriptor::new("t", vec![false; 5]);
        let values = [
            Value::Integer(-7),
            Value::Float(2.5),
            Value::text("zwei"),
            Value::Blob(&[0xde, 0xad]),
            Value::Null,
        ];
        Applier::new(&conn, Predicate::Equals)
            .apply(&instruction(&table, InstructionKind::Insert, &values))
            .unwrap();

        let row: (i64, f64, String, Vec<u8>, Option<i64>) = conn
            .query_row("SELECT i, f, s, b, n FROM t", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })
            .unwrap();
        assert_eq!(row, (-7, 2.5, "zwei".to_string(), vec![0xde, 0xad], None));
    }
}
