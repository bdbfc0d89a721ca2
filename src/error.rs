//! Error handling for the dartrie library
//!
//! All fallible operations in the crate return [`Result`] with a
//! [`TrieError`]. Structural trie invariants are guarded by debug
//! assertions instead; a tripped assertion is a bug, not a runtime
//! condition a caller could handle.

use thiserror::Error;

/// Main error type for the dartrie library
#[derive(Error, Debug)]
pub enum TrieError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive missing, truncated, or carrying an unknown magic
    #[error("bad archive: {message}")]
    BadArchive {
        /// Description of what was wrong with the archive
        message: String,
    },

    /// Text source cannot be opened or decoded
    #[error("bad source: {message}")]
    BadSource {
        /// Description of the source problem
        message: String,
    },

    /// Invalid argument or operation at the public boundary
    #[error("invalid operation: {message}")]
    Invalid {
        /// Description of the rejected input or operation
        message: String,
    },

    /// Array growth failed; the structure is left unchanged
    #[error("allocation failed: requested {size} bytes")]
    OutOfMemory {
        /// Number of bytes that could not be reserved
        size: usize,
    },
}

impl TrieError {
    /// Create a bad archive error
    pub fn bad_archive<S: Into<String>>(message: S) -> Self {
        Self::BadArchive {
            message: message.into(),
        }
    }

    /// Create a bad source error
    pub fn bad_source<S: Into<String>>(message: S) -> Self {
        Self::BadSource {
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an out of memory error
    pub fn out_of_memory(size: usize) -> Self {
        Self::OutOfMemory { size }
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::BadArchive { .. } => "archive",
            Self::BadSource { .. } => "source",
            Self::Invalid { .. } => "invalid",
            Self::OutOfMemory { .. } => "memory",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TrieError>;
