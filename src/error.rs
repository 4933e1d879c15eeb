use crate::{writer::Status, OpKind};
use std::path::PathBuf;

/// Errors that may occur in the storage engine
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Value or log line (de)serialization failed
    Json(serde_json::Error),

    /// Database (or its writer) was already closed
    Closed,

    /// Record was not found
    NotFound,

    /// Keys must not be empty
    EmptyKey,

    /// The writer was driven outside its lifecycle order
    /// (`created -> loaded -> running -> closed`)
    InvalidState {
        /// State the call requires
        expected: Status,
        /// State the writer was actually in
        actual: Status,
    },

    /// Rotation target already exists on disk and is not empty
    SegmentExists(PathBuf),

    /// A reserved operation kind was encountered during replay
    ///
    /// `begin`, `commit` and `rollback` are parsed for forward compatibility
    /// but cannot be applied.
    UnsupportedOperation(OpKind),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TarnError: {self:?}")
    }
}

impl From<std::io::Error> for Error {
    fn from(inner: std::io::Error) -> Self {
        Self::Io(inner)
    }
}

impl From<serde_json::Error> for Error {
    fn from(inner: serde_json::Error) -> Self {
        Self::Json(inner)
    }
}

impl std::error::Error for Error {}

/// Result helper type
pub type Result<T> = std::result::Result<T, Error>;
