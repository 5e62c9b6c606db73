//! Concatenates sub-streams from many producers into one ordered stream.
//!
//! Producers hand whole readers to a [`Multiplexer`]; the single
//! [`MultiplexReader`] drains them one at a time in admission order. No
//! delimiters are inserted between sub-streams.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

use crate::error::{RangeError, Result};

type SubStream = Box<dyn AsyncRead + Send + Unpin>;

/// Create a multiplexer buffering up to `capacity` undrained sub-streams.
///
/// A capacity of 0 is treated as 1.
pub fn multiplexer(capacity: usize) -> (Multiplexer, MultiplexReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Multiplexer {
            admission: Arc::new(Mutex::new(Some(tx))),
        },
        MultiplexReader {
            rx,
            current: None,
            next_sequence: 0,
            finished: false,
        },
    )
}

/// Producer handle. Clone it to enqueue from several tasks.
///
/// All clones share one admission point: sub-streams are sequenced in the
/// order their `enqueue` calls acquire it, and [`Multiplexer::finish`] closes
/// it for every clone at once.
#[derive(Clone)]
pub struct Multiplexer {
    admission: Arc<Mutex<Option<mpsc::Sender<SubStream>>>>,
}

impl Multiplexer {
    /// Append `stream` after every sub-stream admitted before it.
    ///
    /// Waits while `capacity` sub-streams are queued. Fails with
    /// [`RangeError::Closed`] once the reader is gone or the multiplexer has
    /// been finished; a sub-stream is never accepted and then dropped.
    pub async fn enqueue<R>(&self, stream: R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let admission = self.admission.lock().await;
        let tx = admission.as_ref().ok_or(RangeError::Closed)?;
        tx.send(Box::new(stream))
            .await
            .map_err(|_| RangeError::Closed)
    }

    /// Declare that nothing more will be enqueued.
    ///
    /// The reader reports end of stream once every sub-stream admitted before
    /// this call has been fully delivered. Fails with [`RangeError::Closed`]
    /// if the multiplexer was already finished or the reader is gone.
    pub async fn finish(&self) -> Result<()> {
        let mut admission = self.admission.lock().await;
        match admission.take() {
            Some(tx) if !tx.is_closed() => Ok(()),
            _ => Err(RangeError::Closed),
        }
    }
}

struct Segment {
    sequence: u64,
    stream: SubStream,
}

/// Consumer side: one continuous byte stream.
///
/// End of stream is reported after [`Multiplexer::finish`], or once every
/// producer handle has been dropped, with all earlier sub-streams drained.
pub struct MultiplexReader {
    rx: mpsc::Receiver<SubStream>,
    current: Option<Segment>,
    next_sequence: u64,
    finished: bool,
}

impl AsyncRead for MultiplexReader {
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
            if let Some(segment) = this.current.as_mut() {
                let filled = buf.filled().len();
                ready!(Pin::new(&mut segment.stream).poll_read(cx, buf))?;
                if buf.filled().len() > filled {
                    return Poll::Ready(Ok(()));
                }
                trace!(sequence = segment.sequence, "sub-stream drained");
                this.current = None;
            }

            if this.finished {
                return Poll::Ready(Ok(()));
            }

            // The channel disconnects only after the sender is taken by
            // `finish` or every handle is dropped, and only once drained.
            match ready!(this.rx.poll_recv(cx)) {
                Some(stream) => {
                    this.current = Some(Segment {
                        sequence: this.next_sequence,
                        stream,
                    });
                    this.next_sequence += 1;
                }
                None => this.finished = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_concatenates_in_enqueue_order() {
        let (mux, mut reader) = multiplexer(0);
        tokio::spawn(async move {
            for part in ["one", "two", "three"] {
                mux.enqueue(Cursor::new(part.as_bytes().to_vec())).await.unwrap();
            }
            mux.finish().await.unwrap();
        });
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "onetwothree");
    }

    #[tokio::test]
    async fn test_slow_sub_stream_holds_later_ones_back() {
        let (mux, mut reader) = multiplexer(4);
        let (slow_tx, slow_rx) = tokio::io::duplex(16);
        mux.enqueue(slow_rx).await.unwrap();
        mux.enqueue(Cursor::new(b"fast".to_vec())).await.unwrap();
        mux.finish().await.unwrap();

        tokio::spawn(async move {
            let mut slow_tx = slow_tx;
            tokio::time::sleep(Duration::from_millis(20)).await;
            slow_tx.write_all(b"slow").await.unwrap();
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"slowfast");
    }

    #[tokio::test]
    async fn test_read_after_finish_is_eof() {
        let (mux, mut reader) = multiplexer(2);
        mux.enqueue(Cursor::new(b"ab".to_vec())).await.unwrap();
        mux.finish().await.unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"ab");
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        assert!(matches!(
            mux.enqueue(Cursor::new(b"late".to_vec())).await,
            Err(RangeError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let (mux, mut reader) = multiplexer(1);
        mux.enqueue(Cursor::new(b"a".to_vec())).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(20),
            mux.enqueue(Cursor::new(b"b".to_vec())),
        )
        .await;
        assert!(blocked.is_err());

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).await.unwrap();
        mux.enqueue(Cursor::new(b"c".to_vec())).await.unwrap();
        mux.finish().await.unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"c");
    }

    #[tokio::test]
    async fn test_enqueue_after_finish_is_rejected() {
        let (mux, mut reader) = multiplexer(4);
        let other = mux.clone();
        mux.enqueue(Cursor::new(b"ab".to_vec())).await.unwrap();
        mux.finish().await.unwrap();

        assert!(matches!(
            mux.enqueue(Cursor::new(b"late".to_vec())).await,
            Err(RangeError::Closed)
        ));
        let late = tokio::spawn(async move {
            other.enqueue(Cursor::new(b"late".to_vec())).await
        });
        assert!(matches!(late.await.unwrap(), Err(RangeError::Closed)));
        assert!(matches!(mux.finish().await, Err(RangeError::Closed)));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"ab");
    }

    #[tokio::test]
    async fn test_independent_producers_keep_admission_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let (mux, mut reader) = multiplexer(1);
        let mut turn: Option<oneshot::Receiver<()>> = None;
        let mut producers = Vec::new();

        for part in ["one", "two", "three"] {
            let (admitted_tx, admitted_rx) = oneshot::channel();
            let previous = turn.replace(admitted_rx);
            let mux = mux.clone();
            let delay = Duration::from_millis(rng.gen_range(0..30));
            producers.push(tokio::spawn(async move {
                if let Some(previous) = previous {
                    previous.await.unwrap();
                }
                let (mut tx, rx) = tokio::io::duplex(16);
                mux.enqueue(rx).await.unwrap();
                let _ = admitted_tx.send(());
                tokio::time::sleep(delay).await;
                tx.write_all(part.as_bytes()).await.unwrap();
            }));
        }

        let last = turn.take();
        producers.push(tokio::spawn(async move {
            if let Some(last) = last {
                last.await.unwrap();
            }
            mux.finish().await.unwrap();
        }));

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "onetwothree");

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        for producer in producers {
            producer.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_dropping_every_producer_ends_stream() {
        let (mux, mut reader) = multiplexer(2);
        let other = mux.clone();
        mux.enqueue(Cursor::new(b"x".to_vec())).await.unwrap();
        drop(mux);
        other.enqueue(Cursor::new(b"y".to_vec())).await.unwrap();
        drop(other);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"xy");
    }

    #[tokio::test]
    async fn test_sub_stream_errors_propagate() {
        let (mux, mut reader) = multiplexer(2);
        let (writer, pipe_reader) = crate::effects::pipe(1);
        mux.enqueue(pipe_reader).await.unwrap();
        mux.finish().await.unwrap();
        writer.close_with_error(RangeError::Cancelled).await;

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(matches!(RangeError::from_io(err), RangeError::Cancelled));
    }
}
