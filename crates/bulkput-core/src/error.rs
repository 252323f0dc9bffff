//! Error types for Bulkput

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Run-level errors. Anything here aborts the whole run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("None of the configured roots exist: {}", .roots.join(", "))]
    NoRoots { roots: Vec<String> },

    #[error("Run aborted: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::NoRoots { .. } => "NoRoots",
            Error::Fatal(_) => "RunFatalError",
            Error::Io(_) => "IoError",
        }
    }
}

/// A path could not be turned into an object key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path {path:?} is not under base directory {base:?}")]
    NotUnderBase { base: PathBuf, path: PathBuf },

    #[error("Path {0:?} does not name a file below the base directory")]
    Empty(PathBuf),

    #[error("Path {0:?} is not valid UTF-8 and has no exact object key")]
    NonUtf8(PathBuf),
}

/// Failure reported by an [`ObjectSink`](crate::ObjectSink) implementation.
#[derive(Error, Debug, Clone)]
pub enum SinkError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Failure of a single upload attempt. Never leaves the transfer unit.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Path(#[from] PathError),
}
