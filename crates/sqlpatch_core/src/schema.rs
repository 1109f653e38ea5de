//! Column-name introspection.

use crate::error::{ApplyError, ApplyResult};
use rusqlite::Connection;
use std::collections::HashMap;

const TABLE_INFO_SQL: &str = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";

/// Returns the ordered column names of `table`.
///
/// # Errors
///
/// Returns [`ApplyError::Schema`] if the table does not exist or its schema
/// cannot be read.
pub fn column_names(conn: &Connection, table: &str) -> ApplyResult<Vec<String>> {
    let mut stmt = conn
        .prepare_cached(TABLE_INFO_SQL)
        .map_err(|e| ApplyError::schema(table, format!("cannot read schema: {e}")))?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ApplyError::schema(table, format!("cannot read schema: {e}")))?;

    if names.is_empty() {
        return Err(ApplyError::schema(table, "no such table"));
    }
    Ok(names)
}

/// Column names per table, filled on first reference and read-only after.
///
/// One cache lives for one apply run; schema changes made outside the run
/// are not observed while it is alive.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: HashMap<String, Vec<String>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the column names of `table`, introspecting it on first use.
    ///
    /// # Errors
    ///
    /// Same as [`column_names`]. Failed lookups are not cached.
    pub fn column_names(&mut self, conn: &Connection, table: &str) -> ApplyResult<&[String]> {
        if !self.tables.contains_key(table) {
            let names = column_names(conn, table)?;
            self.tables.insert(table.to_string(), names);
        }
        match self.tables.get(table) {
            Some(names) => Ok(names),
            None => Err(ApplyError::schema(table, "no such table")),
        }
    }

    /// Number of tables introspected so far.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no table has been introspected.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
