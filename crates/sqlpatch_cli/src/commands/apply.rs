//! Apply command implementation.

use rusqlite::{Connection, OpenFlags};
use sqlpatch_core::{apply_changeset_file_with, ApplyConfig, ApplyError, ApplyStats};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Failures of the apply command.
#[derive(Debug, Error)]
pub enum ApplyCommandError {
    /// The database could not be opened.
    #[error("cannot open database {}: {source}", path.display())]
    Open {
        /// Database path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// The changeset could not be applied; nothing was changed.
    #[error("cannot apply {}: {source}", path.display())]
    Apply {
        /// Changeset path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ApplyError,
    },
}

/// Runs the apply command.
pub fn run(database: &Path, changeset: &Path, config: &ApplyConfig) -> Result<(), ApplyCommandError> {
    let stats = apply_file(database, changeset, config)?;
    print_text_output(database, changeset, config, &stats);
    Ok(())
}

/// Opens an existing database read-write and applies `changeset` to it.
pub fn apply_file(
    database: &Path,
    changeset: &Path,
    config: &ApplyConfig,
) -> Result<ApplyStats, ApplyCommandError> {
    info!("Applying {:?} to {:?}", changeset, database);
    let mut conn = Connection::open_with_flags(
        database,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| ApplyCommandError::Open {
        path: database.to_path_buf(),
        source,
    })?;
    debug!(path = %database.display(), "database opened");

    apply_changeset_file_with(&mut conn, changeset, config).map_err(|source| {
        ApplyCommandError::Apply {
            path: changeset.to_path_buf(),
            source,
        }
    })
}

fn print_text_output(database: &Path, changeset: &Path, config: &ApplyConfig, stats: &ApplyStats) {
    if config.dry_run {
        println!(
            "Dry run of {} against {} (rolled back)",
            changeset.display(),
            database.display()
        );
    } else {
        println!("Applied {} to {}", changeset.display(), database.display());
    }
    println!();
    println!("  Tables:        {}", stats.tables);
    println!("  Inserts:       {}", stats.inserts);
    println!("  Updates:       {}", stats.updates);
    println!("  Deletes:       {}", stats.deletes);
    println!("  Rows affected: {}", stats.rows_affected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlpatch_codec::{ChangesetWriter, Value};

    fn fixture(dir: &Path) -> (PathBuf, PathBuf) {
        let database = dir.join("fruit.db");
        let changeset = dir.join("fruit.changeset");
        Connection::open(&database)
            .unwrap()
            .execute_batch("CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe TEXT)")
            .unwrap();

        let mut writer = ChangesetWriter::new();
        writer
            .begin_table("Entries", &[true, false, false])
            .unwrap()
            .insert(&[Value::Integer(2), Value::text("Clementine"), Value::text("Orange")])
            .unwrap();
        std::fs::write(&changeset, writer.as_bytes()).unwrap();
        (database, changeset)
    }

    #[test]
    fn applies_to_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let (database, changeset) = fixture(dir.path());

        let stats = apply_file(&database, &changeset, &ApplyConfig::default()).unwrap();
        assert_eq!(stats.inserts, 1);

        let err = apply_file(&database, &changeset, &ApplyConfig::default()).unwrap_err();
        assert!(matches!(err, ApplyCommandError::Apply { .. }));
    }

    #[test]
    fn missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let (_, changeset) = fixture(dir.path());
        let missing = dir.path().join("missing.db");

        let err = apply_file(&missing, &changeset, &ApplyConfig::default()).unwrap_err();
        assert!(matches!(err, ApplyCommandError::Open { .. }));
        assert!(!missing.exists());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logs_database_open() {
        let dir = tempfile::tempdir().unwrap();
        let (database, changeset) = fixture(dir.path());
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            apply_file(&database, &changeset, &ApplyConfig::default()).unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Applying"), "{output}");
        assert!(output.contains("database opened"), "{output}");
    }
}
