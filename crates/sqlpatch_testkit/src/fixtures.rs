//! Test fixtures and store helpers.
//!
//! Provides SQLite connections with automatic cleanup and the small fruit
//! table most tests are written against.

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use sqlpatch_core::quote_identifier;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Schema and rows of the fruit table.
pub const FRUIT_SCHEMA: &str = "
    CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe TEXT);
    INSERT INTO Entries VALUES (0, 'Apfel', 'Grün');
    INSERT INTO Entries VALUES (1, 'Banane', 'Gälb');
";

/// Primary-key flags of the fruit table.
pub const FRUIT_PRIMARY_KEY: [bool; 3] = [true, false, false];

/// Schema with a foreign key from `child` to `parent`, enforcement on.
pub const FOREIGN_KEY_SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE parent (id INTEGER PRIMARY KEY);
    CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));
";

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The connection.
    pub conn: Connection,
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory store.
    pub fn memory() -> Self {
        Self {
            conn: Connection::open_in_memory().expect("Failed to open in-memory database"),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        let conn = Connection::open(&path).expect("Failed to open file database");
        Self {
            conn,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Creates a store and runs `schema` against it.
    pub fn with_schema(schema: &str) -> Self {
        let store = Self::memory();
        store.execute(schema);
        store
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs a batch of SQL, panicking on failure.
    pub fn execute(&self, sql: &str) {
        self.conn
            .execute_batch(sql)
            .unwrap_or_else(|e| panic!("Failed to execute {sql:?}: {e}"));
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> i64 {
        self.conn
            .query_row(
                &format!("SELECT count(*) FROM {}", quote_identifier(table)),
                [],
                |row| row.get(0),
            )
            .expect("Failed to count rows")
    }

    /// Every row of `table`, ordered by its first column.
    pub fn snapshot(&self, table: &str) -> Vec<Vec<SqlValue>> {
        let sql = format!("SELECT * FROM {} ORDER BY 1", quote_identifier(table));
        let mut stmt = self.conn.prepare(&sql).expect("Failed to prepare snapshot");
        let columns = stmt.column_count();
        stmt.query_map([], |row| {
            (0..columns)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<Result<Vec<_>, _>>()
        })
        .expect("Failed to query snapshot")
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to read snapshot")
    }
}

impl std::ops::Deref for TestStore {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// Runs a test with a temporary in-memory store holding the fruit table.
///
/// # Example
///
/// ```
/// use sqlpatch_testkit::with_fruit_store;
///
/// let names: i64 = with_fruit_store(|conn| {
///     conn.query_row("SELECT count(*) FROM Entries", [], |r| r.get(0)).unwrap()
/// });
/// assert_eq!(names, 2);
/// ```
pub fn with_fruit_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut Connection) -> R,
{
    let mut store = scenarios::fruit_store();
    f(&mut store.conn)
}

/// Runs a test with a temporary file-based store holding the fruit table.
pub fn with_fruit_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut Connection, &Path) -> R,
{
    let mut store = TestStore::file();
    store.execute(FRUIT_SCHEMA);
    let path = store
        .path()
        .map(Path::to_path_buf)
        .expect("File store should have a path");
    f(&mut store.conn, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use sqlpatch_codec::{ChangesetWriter, Value};

    /// The fruit table with its two rows.
    pub fn fruit_store() -> TestStore {
        TestStore::with_schema(FRUIT_SCHEMA)
    }

    /// Parent and child tables with enforced foreign keys.
    pub fn foreign_key_store() -> TestStore {
        TestStore::with_schema(FOREIGN_KEY_SCHEMA)
    }

    /// A fruit table with `rows` generated rows and no others.
    pub fn populated_fruit_store(rows: usize) -> TestStore {
        let store = TestStore::with_schema(
            "CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe TEXT)",
        );
        {
            let mut stmt = store
                .conn
                .prepare("INSERT INTO Entries VALUES (?1, ?2, ?3)")
                .expect("Failed to prepare insert");
            for i in 0..rows as i64 {
                stmt.execute(rusqlite::params![i, format!("fruit-{i}"), "Grün"])
                    .expect("Failed to insert row");
            }
        }
        store
    }

    /// Inserts `(2, 'Clementine', 'Orange')` into the fruit table.
    pub fn clementine_changeset() -> Vec<u8> {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("Entries", &FRUIT_PRIMARY_KEY)
            .and_then(|w| {
                w.insert(&[
                    Value::Integer(2),
                    Value::text("Clementine"),
                    Value::text("Orange"),
                ])
            })
            .expect("Failed to write changeset");
        writer.into_bytes()
    }

    /// Changes Banane's colour from `Gälb` to `Gelb`, matching on name and
    /// colour only.
    pub fn banane_update_changeset() -> Vec<u8> {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("Entries", &FRUIT_PRIMARY_KEY)
            .and_then(|w| {
                w.update(
                    &[Value::Unchanged, Value::text("Banane"), Value::text("Gälb")],
                    &[Value::Unchanged, Value::Unchanged, Value::text("Gelb")],
                )
            })
            .expect("Failed to write changeset");
        writer.into_bytes()
    }

    /// A child row that references a parent written later in the stream.
    pub fn child_before_parent_changeset() -> Vec<u8> {
        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("child", &[true, false])
            .and_then(|w| w.insert(&[Value::Integer(1), Value::Integer(10)]))
            .expect("Failed to write changeset");
        writer
            .begin_table("parent", &[true])
            .and_then(|w| w.insert(&[Value::Integer(10)]))
            .expect("Failed to write changeset");
        writer.into_bytes()
    }

    /// Rewrites the colour of every row of [`populated_fruit_store`].
    pub fn recolour_changeset(rows: usize) -> Vec<u8> {
        let mut writer = ChangesetWriter::with_capacity(rows * 40);
        writer
            .begin_table("Entries", &FRUIT_PRIMARY_KEY)
            .expect("Failed to write changeset");
        for i in 0..rows as i64 {
            writer
                .update(
                    &[Value::Integer(i), Value::Unchanged, Value::text("Grün")],
                    &[Value::Unchanged, Value::Unchanged, Value::text("Rot")],
                )
                .expect("Failed to write changeset");
        }
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = scenarios::fruit_store();
        assert_eq!(store.row_count("Entries"), 2);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_file_store() {
        with_fruit_file_store(|conn, path| {
            assert!(path.exists());
            let count: i64 = conn
                .query_row("SELECT count(*) FROM Entries", [], |r| r.get(0))
                .unwrap();
            assert_eq!(count, 2);
        });
    }

    #[test]
    fn test_snapshot_order() {
        let store = scenarios::fruit_store();
        let rows = store.snapshot("Entries");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], SqlValue::Integer(0));
        assert_eq!(rows[1][1], SqlValue::Text("Banane".into()));
    }

    #[test]
    fn test_populated_scenario() {
        let store = scenarios::populated_fruit_store(25);
        assert_eq!(store.row_count("Entries"), 25);
    }
}
