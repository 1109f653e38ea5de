//! # sqlpatch testkit
//!
//! Test utilities for sqlpatch.
//!
//! This crate provides:
//! - Store fixtures backed by in-memory or temporary SQLite databases
//! - Property-based test generators using proptest
//! - Hex test vectors for the changeset wire format
//! - Fuzz testing harnesses
//!
//! ## Usage
//!
//! ```
//! use sqlpatch_testkit::prelude::*;
//!
//! with_fruit_store(|store| {
//!     let stats = sqlpatch_core::apply_changeset(store, &scenarios::clementine_changeset())?;
//!     assert_eq!(stats.inserts, 1);
//!     Ok::<_, sqlpatch_core::ApplyError>(())
//! })
//! .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use vectors::*;
