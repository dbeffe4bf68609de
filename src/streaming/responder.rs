//! Chunked copy from the upstream body to a client sink.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::streaming::error::StreamError;
use crate::streaming::sink::ChunkSink;

/// Default chunk: large enough to keep syscalls per image low, small enough
/// that a slow client never pins more than this per request.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Outcome of a completed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub chunks: u64,
    pub short_writes: u64,
    pub elapsed: Duration,
}

/// Pumps bytes from upstream to the client one bounded chunk at a time.
#[derive(Debug, Clone, Copy)]
pub struct StreamingResponder {
    chunk_size: usize,
}

impl Default for StreamingResponder {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StreamingResponder {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fail fast when `sink` would silently buffer the whole payload.
    pub fn check_sink<S>(&self, sink: &S) -> Result<(), StreamError>
    where
        S: ChunkSink + ?Sized,
    {
        if sink.supports_flush() {
            Ok(())
        } else {
            Err(StreamError::StreamingUnsupported)
        }
    }

    /// Copy `body` into `sink` until upstream EOF, or until `expected_len`
    /// bytes have been written.
    ///
    /// Every chunk is flushed before the next read. A failed write or flush
    /// stops the transfer without touching upstream again. Short writes are
    /// logged and the transfer goes on.
    ///
    /// The chunk that completes `expected_len` is not flushed: a
    /// length-delimited client body is closed by the transport as soon as it
    /// has every byte, which would otherwise read as a disconnect.
    pub async fn relay<R, S>(
        &self,
        body: &mut R,
        sink: &mut S,
        expected_len: Option<u64>,
        request_id: &str,
    ) -> Result<TransferReport, StreamError>
    where
        R: AsyncRead + Unpin + ?Sized,
        S: ChunkSink + ?Sized,
    {
        self.check_sink(sink)?;

        let started = Instant::now();
        let mut report = TransferReport::default();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = match body.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(source) => {
                    return Err(StreamError::UpstreamRead {
                        read: report.bytes_read,
                        source,
                    })
                }
            };
            report.bytes_read += read as u64;

            let written = sink
                .write_chunk(&buffer[..read])
                .await
                .map_err(|source| StreamError::ClientWrite {
                    written: report.bytes_written,
                    source,
                })?;
            report.bytes_written += written as u64;
            report.chunks += 1;

            if written != read {
                report.short_writes += 1;
                tracing::warn!(
                    request_id = %request_id,
                    expected = read,
                    written,
                    "Short write to client"
                );
            }

            if expected_len.is_some_and(|len| report.bytes_written >= len) {
                break;
            }

            sink.flush()
                .await
                .map_err(|source| StreamError::ClientWrite {
                    written: report.bytes_written,
                    source,
                })?;
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}
