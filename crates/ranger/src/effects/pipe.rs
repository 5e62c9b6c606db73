//! Bounded single-producer byte pipe with an error-carrying close.
//!
//! The writer half is consumed by [`PipeWriter::close`] or
//! [`PipeWriter::close_with_error`], so a pipe is terminated at most once.
//! Dropping the writer without closing it is reported to the reader as
//! [`RangeError::Closed`] rather than a clean end of stream.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::error::{RangeError, Result};

#[derive(Debug)]
enum Frame {
    Data(Bytes),
    Error(RangeError),
    End,
}

/// Create a pipe buffering at most `capacity` writes (minimum 1).
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: Bytes::new(),
            state: ReadState::Open,
        },
    )
}

/// Writing half of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Frame>,
}

impl PipeWriter {
    /// Write one block, waiting while the pipe is full.
    ///
    /// Fails with [`RangeError::Closed`] once the reader has been dropped.
    pub async fn write(&self, data: Bytes) -> Result<()> {
        self.tx
            .send(Frame::Data(data))
            .await
            .map_err(|_| RangeError::Closed)
    }

    /// `true` once the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Signal a clean end of stream.
    pub async fn close(self) {
        let _ = self.tx.send(Frame::End).await;
    }

    /// Terminate the stream with `err`; the reader observes it after every
    /// block written before this call.
    pub async fn close_with_error(self, err: RangeError) {
        let _ = self.tx.send(Frame::Error(err)).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Open,
    Ended,
    Failed,
}

/// Reading half of a [`pipe`].
///
/// Usable both as a [`Stream`] of blocks and as an [`AsyncRead`]. Errors
/// surfaced through `AsyncRead` wrap a [`RangeError`]; use
/// [`RangeError::from_io`] to recover it.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Frame>,
    pending: Bytes,
    state: ReadState,
}

impl PipeReader {
    /// Drain the pipe into memory.
    pub async fn read_to_vec(mut self) -> Result<Vec<u8>> {
        use futures_util::StreamExt;

        let mut out = Vec::new();
        while let Some(block) = self.next().await {
            out.extend_from_slice(&block?);
        }
        Ok(out)
    }

    fn poll_block(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        if !self.pending.is_empty() {
            return Poll::Ready(Some(Ok(std::mem::take(&mut self.pending))));
        }
        match self.state {
            ReadState::Ended => return Poll::Ready(None),
            ReadState::Failed => return Poll::Ready(Some(Err(RangeError::Closed))),
            ReadState::Open => {}
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(Frame::Data(data)) => Poll::Ready(Some(Ok(data))),
            Some(Frame::End) => {
                self.state = ReadState::Ended;
                Poll::Ready(None)
            }
            Some(Frame::Error(err)) => {
                self.state = ReadState::Failed;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                self.state = ReadState::Failed;
                Poll::Ready(Some(Err(RangeError::Closed)))
            }
        }
    }
}

impl Stream for PipeReader {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state == ReadState::Failed && this.pending.is_empty() {
            // The error was already yielded once; a stream ends after it.
            return Poll::Ready(None);
        }
        this.poll_block(cx)
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            match ready!(this.poll_block(cx)) {
                Some(Ok(mut data)) => {
                    if data.is_empty() {
                        continue;
                    }
                    let n = data.len().min(buf.remaining());
                    buf.put_slice(&data.split_to(n));
                    this.pending = data;
                    return Poll::Ready(Ok(()));
                }
                Some(Err(err)) => return Poll::Ready(Err(err.into_io())),
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}
