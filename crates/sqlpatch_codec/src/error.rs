//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding or encoding a changeset.
///
/// Every decode error carries the byte offset at which the offending
/// structure starts, so tooling can point at the damaged region.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended in the middle of a structure.
    #[error("truncated changeset: needed {wanted} byte(s) at offset {offset}")]
    Truncated {
        /// Offset of the first missing byte.
        offset: usize,
        /// Number of bytes the decoder tried to read.
        wanted: usize,
    },

    /// A structural marker or type tag is invalid.
    #[error("corrupt changeset at offset {offset}: {message}")]
    Corrupt {
        /// Offset of the invalid byte.
        offset: usize,
        /// Description of the corruption.
        message: String,
    },

    /// An instruction could not be decoded or cannot be turned into a statement.
    #[error("corrupt instruction at offset {offset}: {message}")]
    InstructionCorrupt {
        /// Offset of the instruction's kind byte.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// The writer was asked to emit something the wire format cannot express.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },
}

impl CodecError {
    /// Create a truncation error.
    pub fn truncated(offset: usize, wanted: usize) -> Self {
        Self::Truncated { offset, wanted }
    }

    /// Create a corruption error.
    pub fn corrupt(offset: usize, message: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            message: message.into(),
        }
    }

    /// Create an instruction corruption error.
    pub fn instruction_corrupt(offset: usize, message: impl Into<String>) -> Self {
        Self::InstructionCorrupt {
            offset,
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Byte offset associated with this error, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Truncated { offset, .. }
            | Self::Corrupt { offset, .. }
            | Self::InstructionCorrupt { offset, .. } => Some(*offset),
            Self::EncodingFailed { .. } => None,
        }
    }
}

/// Errors returned by the streaming changeset decoder.
///
/// `E` is the error type of the caller's instruction sink. A sink failure
/// stops the stream immediately and is handed back untouched.
#[derive(Error, Debug)]
pub enum StreamError<E> {
    /// The changeset bytes could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The instruction sink rejected an instruction.
    #[error("instruction sink failed at offset {offset}")]
    Callback {
        /// Offset of the rejected instruction.
        offset: usize,
        /// Error returned by the sink.
        #[source]
        source: E,
    },

    /// The changeset file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl<E> StreamError<E> {
    /// Returns the sink's error if this is a callback failure.
    pub fn into_callback(self) -> Option<E> {
        match self {
            Self::Callback { source, .. } => Some(source),
            _ => None,
        }
    }
}
