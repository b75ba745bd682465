//! Error types for the simulation engines and their loaders.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Out of bounds: ({row}, {col}) outside {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Resource missing: {0}")]
    ResourceMissing(String),

    #[error("Malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    /// Errors that stop a demo instance for good (until the next reset).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::MalformedInput { .. } | Error::InvalidDirection(_) | Error::OutOfBounds { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
