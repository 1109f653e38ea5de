//! # sqlpatch core
//!
//! Applies binary changesets to a live SQLite database.
//!
//! Every decoded instruction becomes one `INSERT`, `UPDATE` or `DELETE`
//! statement against the target table. Column names come from the table's
//! schema, resolved by position. A whole changeset is applied inside a single
//! savepoint: either every instruction takes effect or none does.
//!
//! ## Semantics
//!
//! - Instructions are applied strictly in stream order
//! - `Unchanged` values are left out of `SET` and `WHERE` clauses
//! - Foreign-key checks are deferred until the savepoint is released
//! - A statement that matches no rows is not an error
//!
//! ## Example
//!
//! ```no_run
//! use rusqlite::Connection;
//! use sqlpatch_core::{apply_changeset_file_with, ApplyConfig};
//!
//! let mut conn = Connection::open("fruit.db")?;
//! let config = ApplyConfig::new().dry_run(true);
//! let stats = apply_changeset_file_with(&mut conn, "fruit.changeset", &config)?;
//! println!("{} instructions would apply", stats.instructions());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod applier;
mod config;
mod error;
mod schema;
mod sql;
mod stats;

pub use apply::{
    apply_changeset, apply_changeset_file, apply_changeset_file_with, apply_changeset_with,
};
pub use config::{ApplyConfig, DEFAULT_SAVEPOINT};
pub use error::{ApplyError, ApplyErrorKind, ApplyResult};
pub use schema::{column_names, SchemaCache};
pub use sql::{quote_identifier, Predicate, Statement};
pub use stats::ApplyStats;

// Re-export the codec so callers need a single dependency.
pub use sqlpatch_codec as codec;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
