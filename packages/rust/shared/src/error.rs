//! Error types for splitmerge.
//!
//! Library crates use [`SplitMergeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::Split;

/// Top-level error type for all splitmerge operations.
#[derive(Debug, thiserror::Error)]
pub enum SplitMergeError {
    /// Configuration error: bad input directory, config file, token, or repo id.
    #[error("config error: {message}")]
    Config { message: String },

    /// Structural problem in the input tree (missing file, empty header, ...).
    #[error("structure error: {message}")]
    Structure { message: String },

    /// A shard's header differs from the one established for its split.
    #[error("header mismatch in {path:?}: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A split file expected by the publisher is absent.
    #[error("Expected CSV file for split '{split}' at {path:?}")]
    MissingSplit { split: Split, path: PathBuf },

    /// Malformed CSV content.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// The dataset hub answered with a non-success status or an unusable body.
    #[error("hub error ({status}): {message}")]
    Hub { status: u16, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SplitMergeError>;

impl SplitMergeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structure error from any displayable message.
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a hub error with an HTTP status code.
    pub fn hub(status: u16, msg: impl Into<String>) -> Self {
        Self::Hub {
            status,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
