use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::progress::Progress;
use crate::error::{RangeError, Result};

/// Default size of one chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default number of chunk loads in flight at once.
pub const DEFAULT_WORKERS: usize = 8;

/// Configuration for ranged fetching.
///
/// # Examples
///
/// ```
/// use ranger::RangeOptions;
///
/// let options = RangeOptions::default()
///     .chunk_size(64 * 1024)
///     .workers(16);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct RangeOptions {
    /// Size of every chunk except possibly the last one.
    ///
    /// Must be at least 1. Default: 1 MiB
    pub chunk_size: u64,

    /// Maximum number of chunk loads running concurrently.
    ///
    /// This is also the upper bound on completed-but-uncommitted chunk
    /// payloads held in memory. Must be at least 1. Default: 8
    pub workers: usize,

    /// Number of committed chunks the sink buffers before the committer
    /// waits for the consumer.
    ///
    /// Default: 1
    pub pipe_capacity: usize,

    /// External cancellation. When triggered, dispatch and commit stop and
    /// the sink is closed with [`RangeError::Cancelled`].
    ///
    /// Default: None
    pub cancel: Option<CancellationToken>,

    /// Invoked after each chunk is committed to the sink.
    ///
    /// Default: None
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for RangeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeOptions")
            .field("chunk_size", &self.chunk_size)
            .field("workers", &self.workers)
            .field("pipe_capacity", &self.pipe_capacity)
            .field("cancel", &self.cancel)
            .field("on_progress", &"{ ... }")
            .finish()
    }
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
            pipe_capacity: 1,
            cancel: None,
            on_progress: None,
        }
    }
}

impl RangeOptions {
    /// Shorthand for `RangeOptions::default().chunk_size(c).workers(w)`.
    pub fn new(chunk_size: u64, workers: usize) -> Self {
        Self::default().chunk_size(chunk_size).workers(workers)
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn pipe_capacity(mut self, pipe_capacity: usize) -> Self {
        self.pipe_capacity = pipe_capacity;
        self
    }

    #[must_use]
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the progress callback.
    ///
    /// ```
    /// use ranger::{Progress, RangeOptions};
    /// use std::sync::Arc;
    ///
    /// let options = RangeOptions::default().on_progress(Arc::new(|progress: &Progress| {
    ///     println!("{:.1}%", progress.percentage());
    /// }));
    /// ```
    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Reject zero chunk size, zero workers or a zero-capacity pipe.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < 1 {
            return Err(RangeError::InvalidConfiguration(
                "chunk size must be non-zero".into(),
            ));
        }
        if self.workers < 1 {
            return Err(RangeError::InvalidConfiguration(
                "worker count must be non-zero".into(),
            ));
        }
        if self.pipe_capacity < 1 {
            return Err(RangeError::InvalidConfiguration(
                "pipe capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn report(&self, progress: &Progress) {
        if let Some(ref callback) = self.on_progress {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RangeOptions::default().validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let err = RangeOptions::new(0, 100).validate().unwrap_err();
        assert!(matches!(err, RangeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let err = RangeOptions::new(1024, 0).validate().unwrap_err();
        assert!(matches!(err, RangeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_pipe_capacity_is_rejected() {
        let err = RangeOptions::default().pipe_capacity(0).validate().unwrap_err();
        assert!(matches!(err, RangeError::InvalidConfiguration(_)));
    }
}
