//! Error types for trundle.
//!
//! Only I/O-facing operations can fail with an [`Error`]. Geometric
//! failures inside the mesher (no circumball, no pivot candidate, an empty
//! front) are ordinary control flow and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading points or writing meshes.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line of the input point file could not be parsed.
    #[error("{path}:{line}: {message}")]
    ParsePoint {
        /// The file being read.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// A radius argument could not be parsed.
    #[error("invalid radius {value:?}")]
    ParseRadius {
        /// The offending token.
        value: String,
    },

    /// Error writing the output mesh.
    #[error("failed to save mesh to {path}: {message}")]
    SaveMesh {
        /// The file being written.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}
