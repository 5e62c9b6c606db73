//! Error types for ranger.

use std::io;
use thiserror::Error;

use crate::data::ByteRange;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RangeError>;

#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("multiple ranges are not supported: {0}")]
    MultiRangeUnsupported(String),

    #[error("target does not support byte ranges (Accept-Ranges: {0:?})")]
    RangeUnsupported(Option<String>),

    #[error("probe failed: {reason}")]
    ProbeFailure {
        reason: String,
        #[source]
        source: Option<Box<RangeError>>,
    },

    #[error("chunk {range} failed: {source}")]
    ChunkFetchFailure {
        range: ByteRange,
        #[source]
        source: Box<RangeError>,
    },

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("stream closed before completion")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RangeError {
    pub(crate) fn probe(reason: impl Into<String>) -> Self {
        RangeError::ProbeFailure {
            reason: reason.into(),
            source: None,
        }
    }

    /// Returns `true` for failures that may succeed when the same load is repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            RangeError::Http(_) | RangeError::ShortRead { .. } | RangeError::Io(_) => true,
            RangeError::Status(status) => *status >= 500 || *status == 429 || *status == 408,
            RangeError::ChunkFetchFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Recover a `RangeError` carried inside an `io::Error` produced by this crate's readers.
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<RangeError>()) {
            match err.into_inner().map(|inner| inner.downcast::<RangeError>()) {
                Some(Ok(range_err)) => return *range_err,
                Some(Err(other)) => return RangeError::Io(io::Error::other(other)),
                None => return RangeError::Closed,
            }
        }
        RangeError::Io(err)
    }

    pub(crate) fn into_io(self) -> io::Error {
        match self {
            RangeError::Io(err) => err,
            other => io::Error::other(other),
        }
    }
}
