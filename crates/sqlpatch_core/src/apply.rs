//! Transactional apply driver.
//!
//! An apply runs inside one named savepoint. The savepoint is opened before
//! the first byte is decoded and is either released after the last
//! instruction succeeded or rolled back on the first failure, so the store
//! never observes a partially applied changeset.

use crate::applier::Applier;
use crate::config::ApplyConfig;
use crate::error::{ApplyError, ApplyResult};
use crate::sql::{quote_identifier, Predicate};
use crate::stats::ApplyStats;
use rusqlite::Connection;
use sqlpatch_codec::{decode_changeset, read_changeset_file};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Applies a changeset with the default configuration.
///
/// The empty changeset is valid and changes nothing.
///
/// # Errors
///
/// Returns the first decode, schema or store failure. The store is rolled
/// back to its state before the call whenever an error is returned.
///
/// # Example
///
/// ```
/// use rusqlite::Connection;
/// use sqlpatch_codec::{ChangesetWriter, Value};
///
/// let mut conn = Connection::open_in_memory()?;
/// conn.execute_batch("CREATE TABLE Entries (ID INTEGER PRIMARY KEY, Name TEXT, Farbe TEXT)")?;
///
/// let mut writer = ChangesetWriter::new();
/// writer
///     .begin_table("Entries", &[true, false, false])?
///     .insert(&[Value::Integer(2), Value::text("Clementine"), Value::text("Orange")])?;
///
/// let stats = sqlpatch_core::apply_changeset(&mut conn, writer.as_bytes())?;
/// assert_eq!(stats.inserts, 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn apply_changeset(conn: &mut Connection, data: &[u8]) -> ApplyResult<ApplyStats> {
    apply_changeset_with(conn, data, &ApplyConfig::default())
}

/// Applies a changeset with an explicit configuration.
///
/// With [`ApplyConfig::dry_run`] set, every instruction is executed and
/// counted, and the savepoint is then rolled back.
///
/// # Errors
///
/// Same as [`apply_changeset`], plus [`ApplyError::InvalidConfig`].
pub fn apply_changeset_with(
    conn: &mut Connection,
    data: &[u8],
    config: &ApplyConfig,
) -> ApplyResult<ApplyStats> {
    config.validate()?;
    let started = Instant::now();
    info!(
        bytes = data.len(),
        savepoint = %config.savepoint_name,
        dry_run = config.dry_run,
        "applying changeset"
    );

    let scope = ApplyScope::open(conn, config)?;
    let predicate = if config.null_safe_predicates {
        Predicate::Is
    } else {
        Predicate::Equals
    };

    let outcome = {
        let mut applier = Applier::new(scope.conn, predicate);
        let mut progress = Progress::new(data.len(), config.progress_step, started);
        let result = decode_changeset(data, |instr| {
            applier.apply(instr)?;
            progress.advance(instr.offset);
            Ok::<_, ApplyError>(())
        });
        result.map(|()| applier.stats()).map_err(ApplyError::from)
    };

    match outcome {
        Ok(stats) => {
            if config.dry_run {
                scope.rollback()?;
            } else {
                scope.commit()?;
            }
            info!(
                tables = stats.tables,
                inserts = stats.inserts,
                updates = stats.updates,
                deletes = stats.deletes,
                rows = stats.rows_affected,
                dry_run = config.dry_run,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "changeset applied"
            );
            Ok(stats)
        }
        Err(err) => {
            warn!(error = %err, "changeset apply failed, rolling back");
            if let Err(rollback) = scope.rollback() {
                warn!(error = %rollback, "rollback after failed apply also failed");
            }
            Err(err)
        }
    }
}

/// Reads a changeset file and applies it with the default configuration.
///
/// # Errors
///
/// Returns [`ApplyError::Io`] if the file cannot be read or is empty, and
/// otherwise the same errors as [`apply_changeset`].
pub fn apply_changeset_file(conn: &mut Connection, path: impl AsRef<Path>) -> ApplyResult<ApplyStats> {
    apply_changeset_file_with(conn, path, &ApplyConfig::default())
}

/// Reads a changeset file and applies it with an explicit configuration.
///
/// # Errors
///
/// Same as [`apply_changeset_file`] and [`apply_changeset_with`].
pub fn apply_changeset_file_with(
    conn: &mut Connection,
    path: impl AsRef<Path>,
    config: &ApplyConfig,
) -> ApplyResult<ApplyStats> {
    let path = path.as_ref();
    let data = read_changeset_file(path)?;
    debug!(path = %path.display(), bytes = data.len(), "read changeset file");
    apply_changeset_with(conn, &data, config)
}

/// Open savepoint around one apply.
///
/// Dropping the scope without calling [`commit`](Self::commit) rolls back.
struct ApplyScope<'c> {
    conn: &'c Connection,
    savepoint: String,
    restore_defer: Option<i64>,
    finished: bool,
}

impl<'c> ApplyScope<'c> {
    fn open(conn: &'c Connection, config: &ApplyConfig) -> ApplyResult<Self> {
        let savepoint = quote_identifier(&config.savepoint_name);
        conn.execute_batch(&format!("SAVEPOINT {savepoint}"))?;
        let mut scope = Self {
            conn,
            savepoint,
            restore_defer: None,
            finished: false,
        };

        if config.defer_foreign_keys {
            let previous: i64 = conn.query_row("PRAGMA defer_foreign_keys", [], |row| row.get(0))?;
            conn.execute_batch("PRAGMA defer_foreign_keys = 1")?;
            scope.restore_defer = Some(previous);
        }
        Ok(scope)
    }

    fn commit(mut self) -> ApplyResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE {}", self.savepoint))?;
        self.finished = true;
        self.restore_foreign_keys()
    }

    fn rollback(mut self) -> ApplyResult<()> {
        self.finished = true;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> ApplyResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO {sp}; RELEASE {sp}",
            sp = self.savepoint
        ))?;
        debug!(savepoint = %self.savepoint, "savepoint rolled back");
        self.restore_foreign_keys()
    }

    // Turning deferral off inside an open transaction discards the pending
    // violation count, so an enclosing transaction keeps it on until it ends.
    fn restore_foreign_keys(&self) -> ApplyResult<()> {
        if let Some(previous) = self.restore_defer {
            if self.conn.is_autocommit() {
                self.conn
                    .execute_batch(&format!("PRAGMA defer_foreign_keys = {previous}"))?;
            }
        }
        Ok(())
    }
}

impl Drop for ApplyScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.rollback_inner() {
                warn!(error = %e, savepoint = %self.savepoint, "failed to roll back savepoint");
            }
        }
    }
}

/// Emits `debug` progress events as the decoder moves through the buffer.
struct Progress {
    total: usize,
    step: f64,
    last: f64,
    started: Instant,
}

impl Progress {
    fn new(total: usize, step: f64, started: Instant) -> Self {
        Self {
            total,
            step,
            last: 0.0,
            started,
        }
    }

    fn advance(&mut self, offset: usize) {
        if self.step <= 0.0 || self.total == 0 {
            return;
        }
        let percent = offset as f64 * 100.0 / self.total as f64;
        if percent - self.last < self.step {
            return;
        }
        self.last = percent;
        let elapsed = self.started.elapsed().as_secs_f64();
        let estimated_total_secs = if percent > 0.0 {
            elapsed * 100.0 / percent
        } else {
            0.0
        };
        debug!(percent, estimated_total_secs, "apply progress");
    }
}
