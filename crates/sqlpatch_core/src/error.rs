//! Error types for applying changesets.

use sqlpatch_codec::{CodecError, StreamError};
use std::io;
use thiserror::Error;

/// Result type for apply operations.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Errors that can occur while applying a changeset.
///
/// Whatever the variant, an apply that returns an error has already rolled
/// the store back to its state before the call.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The changeset could not be decoded, or an instruction cannot be
    /// expressed as a statement (e.g. a delete with no predicate columns).
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The target table is unknown or does not match the changeset.
    #[error("schema error for table `{table}`: {message}")]
    Schema {
        /// Table that failed introspection.
        table: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The store rejected a statement.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The changeset file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The apply configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

/// Coarse classification of an [`ApplyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyErrorKind {
    /// Buffer ended mid-structure.
    Truncated,
    /// Bad marker byte or unknown type tag.
    Corrupt,
    /// Undecodable instruction or empty predicate/assignment list.
    InstructionCorrupt,
    /// Unknown table or column mismatch.
    Schema,
    /// Native store failure.
    Store,
    /// File could not be read.
    Io,
    /// Invalid configuration.
    Config,
}

impl ApplyError {
    /// Creates a schema error.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates an instruction corruption error.
    pub fn instruction_corrupt(offset: usize, message: impl Into<String>) -> Self {
        Self::Codec(CodecError::instruction_corrupt(offset, message))
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ApplyErrorKind {
        match self {
            Self::Codec(CodecError::Truncated { .. }) => ApplyErrorKind::Truncated,
            Self::Codec(CodecError::Corrupt { .. } | CodecError::EncodingFailed { .. }) => {
                ApplyErrorKind::Corrupt
            }
            Self::Codec(CodecError::InstructionCorrupt { .. }) => {
                ApplyErrorKind::InstructionCorrupt
            }
            Self::Schema { .. } => ApplyErrorKind::Schema,
            Self::Store(_) => ApplyErrorKind::Store,
            Self::Io(_) => ApplyErrorKind::Io,
            Self::InvalidConfig { .. } => ApplyErrorKind::Config,
        }
    }
}

/// A failed stream yields the sink's own error when the sink failed, so the
/// caller sees the originating problem rather than a wrapper.
impl From<StreamError<ApplyError>> for ApplyError {
    fn from(err: StreamError<ApplyError>) -> Self {
        match err {
            StreamError::Codec(e) => Self::Codec(e),
            StreamError::Callback { source, .. } => source,
            StreamError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            ApplyError::from(CodecError::truncated(4, 1)).kind(),
            ApplyErrorKind::Truncated
        );
        assert_eq!(
            ApplyError::instruction_corrupt(0, "empty predicate").kind(),
            ApplyErrorKind::InstructionCorrupt
        );
        assert_eq!(
            ApplyError::schema("t", "missing").kind(),
            ApplyErrorKind::Schema
        );
    }

    #[test]
    fn callback_errors_are_unwrapped() {
        let stream: StreamError<ApplyError> = StreamError::Callback {
            offset: 10,
            source: ApplyError::schema("Entries", "unknown table"),
        };
        let err = ApplyError::from(stream);
        assert_eq!(err.kind(), ApplyErrorKind::Schema);
        assert_eq!(
            err.to_string(),
            "schema error for table `Entries`: unknown table"
        );
    }
}
