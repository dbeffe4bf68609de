//! Client-side sinks the responder writes into.

use std::io;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Destination of relayed image bytes.
#[async_trait]
pub trait ChunkSink: Send {
    /// Whether [`ChunkSink::flush`] pushes bytes to the transport.
    fn supports_flush(&self) -> bool;

    /// Write `chunk`, returning how many bytes the sink accepted.
    ///
    /// A count below `chunk.len()` is a short write, not an error. An error
    /// means the client is gone.
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<usize>;

    /// Push everything written so far to the transport.
    async fn flush(&mut self) -> io::Result<()>;
}

/// Sink feeding an axum response body through a single-slot channel.
///
/// `flush` resolves once the body has taken the previous chunk, so at
/// most one chunk is in flight between the pump and hyper.
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelSink {
    /// Create a sink and the response body it feeds.
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, Body::from_stream(ReceiverStream::new(rx)))
    }

    /// Terminate the body with an error so the client sees a broken
    /// transfer instead of a clean end.
    pub async fn fail(self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

fn disconnected() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

#[async_trait]
impl ChunkSink for ChannelSink {
    fn supports_flush(&self) -> bool {
        true
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.tx
            .send(Ok(Bytes::copy_from_slice(chunk)))
            .await
            .map_err(|_| disconnected())?;
        Ok(chunk.len())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let permit = self.tx.reserve().await.map_err(|_| disconnected())?;
        drop(permit);
        Ok(())
    }
}

/// Sink over any async writer (sockets, files, duplex pipes).
pub struct WriterSink<W> {
    inner: W,
}

impl<W> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> ChunkSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn supports_flush(&self) -> bool {
        true
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < chunk.len() {
            match self.inner.write(&chunk[written..]).await? {
                0 => break,
                n => written += n,
            }
        }
        Ok(written)
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_channel_sink_feeds_body() {
        let (mut sink, body) = ChannelSink::channel();

        let reader = tokio::spawn(async move {
            let mut stream = body.into_data_stream();
            let mut collected = Vec::new();
            while let Some(frame) = stream.next().await {
                collected.extend_from_slice(&frame.unwrap());
            }
            collected
        });

        assert_eq!(sink.write_chunk(b"hello ").await.unwrap(), 6);
        sink.flush().await.unwrap();
        assert_eq!(sink.write_chunk(b"world").await.unwrap(), 5);
        sink.flush().await.unwrap();
        drop(sink);

        assert_eq!(reader.await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_dropped_body() {
        let (mut sink, body) = ChannelSink::channel();
        drop(body);

        let err = sink.write_chunk(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_writer_sink_writes_everything() {
        let mut sink = WriterSink::new(Vec::new());
        assert_eq!(sink.write_chunk(b"abc").await.unwrap(), 3);
        sink.flush().await.unwrap();
        assert_eq!(sink.into_inner(), b"abc");
    }

    #[tokio::test]
    async fn test_writer_sink_short_write() {
        let mut buf = [0u8; 4];
        let mut sink = WriterSink::new(std::io::Cursor::new(&mut buf[..]));
        assert_eq!(sink.write_chunk(b"abcdef").await.unwrap(), 4);
        drop(sink);
        assert_eq!(&buf, b"abcd");
    }
}
