//! Per-connection message endpoints.
//!
//! A connection is split into a [`MessageReader`] owned by the session's
//! command loop and a cloneable [`MessageWriter`] shared between the
//! command loop and the frame pipeline. The writer holds the only handle
//! to the outbound half; every send takes its lock, encodes one whole
//! message and flushes before releasing it, so two producers can never
//! interleave fields on the wire.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::codec::WireCodec;
use crate::error::{ProtocolError, SessionError};
use crate::message::Message;

/// Split a duplex stream into its reader and shared writer.
pub fn split<S>(stream: S) -> (MessageReader<ReadHalf<S>>, MessageWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read, write) = tokio::io::split(stream);
    (MessageReader::new(read), MessageWriter::new(write))
}

// ── MessageReader ────────────────────────────────────────────────

pub struct MessageReader<R> {
    inner: FramedRead<R, WireCodec>,
    timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(read: R) -> Self {
        Self {
            inner: FramedRead::new(read, WireCodec),
            timeout: None,
        }
    }

    /// Fail reads that see no complete message within `timeout`.
    /// `None` blocks indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Next complete message. `Ok(None)` is a clean end of stream.
    pub async fn recv(&mut self) -> Result<Option<Message>, SessionError> {
        let next = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.next())
                .await
                .map_err(|_| SessionError::ReadTimeout(limit))?,
            None => self.inner.next().await,
        };
        next.transpose().map_err(SessionError::from)
    }
}

// ── MessageWriter ────────────────────────────────────────────────

/// Lock-guarded outbound half. Clones share the same stream.
pub struct MessageWriter<W> {
    inner: Arc<Mutex<FramedWrite<W, WireCodec>>>,
}

impl<W> Clone for MessageWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(write: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FramedWrite::new(write, WireCodec))),
        }
    }

    /// Write one complete message and flush it.
    pub async fn send(&self, message: Message) -> Result<(), ProtocolError> {
        let mut sink = self.inner.lock().await;
        sink.send(message).await
    }

    /// Like [`send`](Self::send), but stops waiting once `token` is
    /// cancelled. Returns whether the message was queued.
    ///
    /// A queued message is complete in the write buffer. If cancellation
    /// cuts its flush short, the unsent tail goes out ahead of the next
    /// send or close, so the stream stays well formed.
    pub async fn send_cancellable(
        &self,
        message: Message,
        token: &CancellationToken,
    ) -> Result<bool, ProtocolError> {
        let mut sink = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(false),
            sink = self.inner.lock() => sink,
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(false),
            queued = sink.feed(message) => queued?,
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            flushed = sink.flush() => flushed?,
        }
        Ok(true)
    }

    /// Flush and shut down the outbound half.
    pub async fn close(&self) -> Result<(), ProtocolError> {
        let mut sink = self.inner.lock().await;
        sink.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn writer_and_reader_over_duplex() {
        let (a, b) = tokio::io::duplex(4096);
        let (_, writer) = split(a);
        let (mut reader, _) = split(b);

        writer.send(Message::text("hello")).await.unwrap();
        writer
            .send(Message::Frame(Bytes::from_static(b"jpeg")))
            .await
            .unwrap();

        assert_eq!(reader.recv().await.unwrap(), Some(Message::text("hello")));
        assert_eq!(
            reader.recv().await.unwrap(),
            Some(Message::Frame(Bytes::from_static(b"jpeg")))
        );
    }

    #[tokio::test]
    async fn close_is_seen_as_clean_eof() {
        let (a, b) = tokio::io::duplex(64);
        let (_, writer) = split(a);
        let (mut reader, _) = split(b);

        writer.close().await.unwrap();
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (_a, b) = tokio::io::duplex(64);
        let (reader, _) = split(b);
        let mut reader = reader.with_timeout(Some(Duration::from_secs(5)));

        assert!(matches!(
            reader.recv().await,
            Err(SessionError::ReadTimeout(d)) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn cancelled_send_queues_nothing() {
        let (a, b) = tokio::io::duplex(4096);
        let (_, writer) = split(a);
        let (mut reader, _) = split(b);

        let token = CancellationToken::new();
        token.cancel();
        assert!(!writer.send_cancellable(Message::text("dropped"), &token).await.unwrap());

        writer.send(Message::text("kept")).await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(reader.recv().await.unwrap(), Some(Message::text("kept")));
        assert_eq!(reader.recv().await.unwrap(), None);
    }
}
