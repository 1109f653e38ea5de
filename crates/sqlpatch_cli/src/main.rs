//! sqlpatch CLI
//!
//! Command-line tools for sqlpatch changesets.
//!
//! # Commands
//!
//! - `apply` - Apply a changeset to a SQLite database
//! - `dump` - List every table block and instruction of a changeset
//! - `inspect` - Summarize a changeset
//!
//! Usage errors exit with status 1; failures to open the database or apply
//! the changeset exit with status 2.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// sqlpatch command-line changeset tools.
#[derive(Parser)]
#[command(name = "sqlpatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a changeset to an existing database
    Apply {
        /// Path to the SQLite database
        database: PathBuf,

        /// Path to the changeset file
        changeset: PathBuf,

        /// Apply, report, then roll back
        #[arg(short, long)]
        dry_run: bool,

        /// Name of the savepoint wrapping the apply
        #[arg(long, default_value = sqlpatch_core::DEFAULT_SAVEPOINT)]
        savepoint: String,

        /// Match pre-image values with IS instead of =
        #[arg(long)]
        null_safe: bool,

        /// Enforce foreign keys per statement instead of at release
        #[arg(long)]
        no_defer_foreign_keys: bool,
    },

    /// List table blocks and instructions
    Dump {
        /// Path to the changeset file
        changeset: PathBuf,

        /// Maximum number of instructions to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Summarize a changeset
    Inspect {
        /// Path to the changeset file
        changeset: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize logging; RUST_LOG wins over --verbose.
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Apply {
            database,
            changeset,
            dry_run,
            savepoint,
            null_safe,
            no_defer_foreign_keys,
        } => {
            let config = sqlpatch_core::ApplyConfig::new()
                .savepoint_name(savepoint)
                .dry_run(dry_run)
                .null_safe_predicates(null_safe)
                .defer_foreign_keys(!no_defer_foreign_keys);
            commands::apply::run(&database, &changeset, &config)?;
        }
        Commands::Dump {
            changeset,
            limit,
            format,
        } => {
            commands::dump::run(&changeset, limit, format)?;
        }
        Commands::Inspect { changeset, format } => {
            commands::inspect::run(&changeset, format)?;
        }
        Commands::Version => {
            println!("sqlpatch CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("sqlpatch core v{}", sqlpatch_core::VERSION);
            println!("SQLite v{}", rusqlite::version());
        }
    }

    Ok(())
}
