//! Random-access and sequential views over a lazily loaded chunk plan.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::loader::{Chunk, Loader};
use super::pipe::PipeReader;
use super::pipeline::OrderedFetchPipeline;
use crate::core::Ranger;
use crate::data::RangeOptions;
use crate::error::{RangeError, Result};

/// A remote resource of known length, split into fixed-size chunks.
///
/// Chunks are stateless descriptors, so every view may be used concurrently
/// with the others. Nothing is cached: each read loads the chunks it touches.
pub struct RangedSource<L> {
    chunks: Arc<[Chunk<L>]>,
    ranger: Ranger,
    length: u64,
}

impl<L> Clone for RangedSource<L> {
    fn clone(&self) -> Self {
        Self {
            chunks: Arc::clone(&self.chunks),
            ranger: self.ranger,
            length: self.length,
        }
    }
}

impl<L: Loader> RangedSource<L> {
    pub fn new(length: u64, loader: L, ranger: Ranger) -> Self {
        Self::with_shared(length, Arc::new(loader), ranger)
    }

    pub fn with_shared(length: u64, loader: Arc<L>, ranger: Ranger) -> Self {
        let chunks = Chunk::plan(ranger.ranges(length), loader);
        Self {
            chunks: chunks.into(),
            ranger,
            length,
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn chunks(&self) -> &[Chunk<L>] {
        &self.chunks
    }

    fn chunk_at(&self, offset: u64) -> Option<&Chunk<L>> {
        self.chunks
            .get(self.ranger.index(offset))
            .filter(|chunk| chunk.range().contains(offset))
    }

    /// Read into `buf` starting at absolute `offset`.
    ///
    /// Loads every chunk the span touches, one after the other. Returns the
    /// number of bytes copied; a count below `buf.len()` means the end of the
    /// resource was reached, and `0` (for a non-empty `buf`) means `offset`
    /// is at or past the end.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            let position = offset.saturating_add(n as u64);
            let Some(chunk) = self.chunk_at(position) else {
                break;
            };
            let data = chunk.load().await?;
            let within = (position - chunk.range().start()) as usize;
            let copied = (buf.len() - n).min(data.len() - within);
            buf[n..n + copied].copy_from_slice(&data[within..within + copied]);
            n += copied;
        }
        Ok(n)
    }

    /// Sequential, seekable reader starting at offset 0.
    pub fn reader(&self) -> SectionReader<L> {
        SectionReader {
            source: self.clone(),
            position: 0,
            buffered: Bytes::new(),
            loading: None,
        }
    }

    /// Load every chunk eagerly with at most `workers` in flight and stream
    /// them in order.
    pub fn preloading_reader(&self, workers: usize) -> Result<PipeReader> {
        self.preloading_reader_with(
            RangeOptions::default()
                .chunk_size(self.ranger.chunk_size())
                .workers(workers),
        )
    }

    /// Like [`RangedSource::preloading_reader`] with cancellation, progress and
    /// pipe capacity taken from `options`.
    pub fn preloading_reader_with(&self, options: RangeOptions) -> Result<PipeReader> {
        let pipeline = OrderedFetchPipeline::new(options)?;
        Ok(pipeline.spawn(self.chunks.to_vec()))
    }
}

type ChunkLoad = Pin<Box<dyn Future<Output = Result<(u64, Bytes)>> + Send>>;

/// Cursor over a [`RangedSource`] implementing [`AsyncRead`] and [`AsyncSeek`].
///
/// The unread tail of the current chunk is kept between reads; seeking
/// discards it.
pub struct SectionReader<L> {
    source: RangedSource<L>,
    position: u64,
    buffered: Bytes,
    loading: Option<ChunkLoad>,
}

impl<L: Loader> SectionReader<L> {
    pub fn size(&self) -> u64 {
        self.source.len()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn reset(&mut self) {
        self.buffered = Bytes::new();
        self.loading = None;
    }
}

impl<L: Loader> AsyncRead for SectionReader<L> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if this.buffered.is_empty() {
            if this.loading.is_none() {
                let Some(chunk) = this.source.chunk_at(this.position).cloned() else {
                    return Poll::Ready(Ok(()));
                };
                this.loading = Some(Box::pin(async move {
                    let data = chunk.load().await?;
                    Ok::<_, RangeError>((chunk.range().start(), data))
                }));
            }
            let Some(loading) = this.loading.as_mut() else {
                return Poll::Ready(Ok(()));
            };
            let result = ready!(loading.as_mut().poll(cx));
            this.loading = None;
            let (start, mut data) = result.map_err(RangeError::into_io)?;
            this.buffered = data.split_off((this.position - start) as usize);
        }

        let n = this.buffered.len().min(buf.remaining());
        buf.put_slice(&this.buffered.split_to(n));
        this.position += n as u64;
        Poll::Ready(Ok(()))
    }
}

impl<L: Loader> AsyncSeek for SectionReader<L> {
    fn start_seek(self: Pin<&mut Self>, target: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let position = match target {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => this.source.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => this.position.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;

        if position != this.position {
            this.reset();
            this.position = position;
        }
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.position))
    }
}
