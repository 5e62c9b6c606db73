//! Concurrent chunk loading with in-order commit.
//!
//! Up to `workers` chunk loads run as independent tasks. A single commit
//! loop owns the sink and always waits on the oldest outstanding load, so
//! bytes leave in plan order no matter which load finishes first. A new load
//! is admitted only after the head chunk has been written, which bounds the
//! number of buffered chunk payloads to `workers`.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::loader::{Chunk, Loader};
use super::pipe::{PipeReader, PipeWriter, pipe};
use crate::data::{ByteRange, Progress, RangeOptions};
use crate::error::{RangeError, Result};

/// One dispatched chunk load, tied to its plan position.
///
/// Dropping a task aborts the underlying load.
struct FetchTask {
    index: usize,
    range: ByteRange,
    handle: JoinHandle<Result<Bytes>>,
}

impl FetchTask {
    fn dispatch<L: Loader>(index: usize, chunk: Chunk<L>) -> Self {
        trace!(index, range = %chunk.range(), "dispatching chunk");
        let range = chunk.range();
        let handle = tokio::spawn(async move { chunk.load().await });
        Self {
            index,
            range,
            handle,
        }
    }

    async fn outcome(&mut self) -> Result<Bytes> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(join_err) => Err(RangeError::ChunkFetchFailure {
                range: self.range,
                source: Box::new(RangeError::Io(join_err.into())),
            }),
        }
    }
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Fetches a chunk plan concurrently and commits it to a sink in order.
#[derive(Debug, Clone)]
pub struct OrderedFetchPipeline {
    options: RangeOptions,
}

impl OrderedFetchPipeline {
    /// Validate `options` before any work starts.
    pub fn new(options: RangeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn workers(&self) -> usize {
        self.options.workers
    }

    /// Run the plan on a background task and return the reading end of its sink.
    pub fn spawn<L: Loader>(self, chunks: Vec<Chunk<L>>) -> PipeReader {
        let (writer, reader) = pipe(self.options.pipe_capacity);
        tokio::spawn(async move {
            self.run(chunks, writer).await;
        });
        reader
    }

    /// Load `chunks` with at most `workers` in flight and write them to `sink`
    /// in plan order.
    ///
    /// The sink is closed exactly once: cleanly after the last chunk, or with
    /// the first failure (or [`RangeError::Cancelled`]). Nothing at or after a
    /// failing position is written. Returns what was committed.
    pub async fn run<L: Loader>(&self, chunks: Vec<Chunk<L>>, sink: PipeWriter) -> Progress {
        let cancel = self.options.cancel.clone().unwrap_or_default();
        let mut progress = Progress {
            bytes_committed: 0,
            total_bytes: chunks.iter().map(|c| c.range().len()).sum(),
            chunks_committed: 0,
            total_chunks: chunks.len(),
        };
        debug!(
            chunks = progress.total_chunks,
            bytes = progress.total_bytes,
            workers = self.options.workers,
            "starting ordered fetch"
        );

        let mut pending = chunks.into_iter().enumerate();
        let mut in_flight: VecDeque<FetchTask> = pending
            .by_ref()
            .take(self.options.workers)
            .map(|(index, chunk)| FetchTask::dispatch(index, chunk))
            .collect();

        while let Some(mut head) = in_flight.pop_front() {
            if let Err(err) = self.commit(&mut head, &sink, &cancel).await {
                warn!(
                    index = head.index,
                    range = %head.range,
                    error = %err,
                    "ordered fetch failed"
                );
                // Dropping the remaining tasks aborts their loads.
                drop(head);
                in_flight.clear();
                sink.close_with_error(err).await;
                return progress;
            }

            progress.bytes_committed += head.range.len();
            progress.chunks_committed += 1;
            trace!(index = head.index, "committed chunk");
            self.options.report(&progress);

            if let Some((index, chunk)) = pending.next() {
                in_flight.push_back(FetchTask::dispatch(index, chunk));
            }
        }

        debug!(bytes = progress.bytes_committed, "ordered fetch complete");
        sink.close().await;
        progress
    }

    async fn commit(
        &self,
        head: &mut FetchTask,
        sink: &PipeWriter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RangeError::Cancelled),
            outcome = head.outcome() => outcome?,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RangeError::Cancelled),
            written = sink.write(data) => written,
        }
    }
}

/// Fetch `chunks` in plan order on a background task.
///
/// Configuration errors are returned before anything is dispatched.
pub fn fetch_ordered<L: Loader>(
    chunks: Vec<Chunk<L>>,
    options: RangeOptions,
) -> Result<PipeReader> {
    Ok(OrderedFetchPipeline::new(options)?.spawn(chunks))
}
