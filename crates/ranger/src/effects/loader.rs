//! Chunks and the loader capability that fetches them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{trace, warn};

use crate::core::retry_delay;
use crate::data::ByteRange;
use crate::error::{RangeError, Result};

/// Fetches exactly one byte range of a fixed target.
///
/// Implementations issue one range-bounded request per call and surface any
/// failure as an error. Retrying and caching are left to wrappers such as
/// [`RetryLoader`].
pub trait Loader: Send + Sync + 'static {
    fn load(&self, range: ByteRange) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Adapts an async closure into a [`Loader`].
///
/// ```
/// use bytes::Bytes;
/// use ranger::{ByteRange, FnLoader};
///
/// let loader = FnLoader::new(|range: ByteRange| async move {
///     Ok::<_, ranger::RangeError>(Bytes::from(vec![0u8; range.len() as usize]))
/// });
/// # let _ = loader;
/// ```
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn(ByteRange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    fn load(&self, range: ByteRange) -> impl Future<Output = Result<Bytes>> + Send {
        (self.f)(range)
    }
}

/// One byte range of a plan plus the capability to load it.
///
/// A chunk carries no data. Every call to [`Chunk::load`] fetches again.
pub struct Chunk<L> {
    range: ByteRange,
    loader: Arc<L>,
}

impl<L> Clone for Chunk<L> {
    fn clone(&self) -> Self {
        Self {
            range: self.range,
            loader: Arc::clone(&self.loader),
        }
    }
}

impl<L> fmt::Debug for Chunk<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk").field("range", &self.range).finish()
    }
}

impl<L: Loader> Chunk<L> {
    pub fn new(range: ByteRange, loader: Arc<L>) -> Self {
        Self { range, loader }
    }

    /// Bind every range of a plan to the same loader.
    pub fn plan(ranges: impl IntoIterator<Item = ByteRange>, loader: Arc<L>) -> Vec<Self> {
        ranges
            .into_iter()
            .map(|range| Self::new(range, Arc::clone(&loader)))
            .collect()
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }

    /// Fetch this chunk's bytes.
    ///
    /// Fails with [`RangeError::ChunkFetchFailure`] when the loader fails or
    /// returns a byte count other than the range length.
    pub async fn load(&self) -> Result<Bytes> {
        trace!(range = %self.range, "loading chunk");
        let result = self.loader.load(self.range).await.and_then(|data| {
            let actual = data.len() as u64;
            if actual != self.range.len() {
                return Err(RangeError::ShortRead {
                    expected: self.range.len(),
                    actual,
                });
            }
            Ok(data)
        });

        result.map_err(|err| match err {
            RangeError::Cancelled => RangeError::Cancelled,
            err @ RangeError::ChunkFetchFailure { .. } => err,
            err => RangeError::ChunkFetchFailure {
                range: self.range,
                source: Box::new(err),
            },
        })
    }
}

/// Retries a loader's failures with exponential backoff.
///
/// Only errors reported by [`RangeError::is_retryable`] are retried; a response
/// whose length does not match the range counts as retryable.
pub struct RetryLoader<L> {
    inner: L,
    max_retries: u32,
    backoff: Duration,
}

impl<L: Loader> RetryLoader<L> {
    /// Wrap `inner` with 3 retries and a 100ms base backoff.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn load_checked(&self, range: ByteRange) -> Result<Bytes> {
        let data = self.inner.load(range).await?;
        if data.len() as u64 != range.len() {
            return Err(RangeError::ShortRead {
                expected: range.len(),
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }
}

impl<L: Loader> Loader for RetryLoader<L> {
    async fn load(&self, range: ByteRange) -> Result<Bytes> {
        let mut retry_count = 0;
        loop {
            match self.load_checked(range).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable() && retry_count < self.max_retries => {
                    let delay = retry_delay(retry_count, self.backoff);
                    warn!(%range, retry_count, ?delay, error = %err, "retrying chunk load");
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
