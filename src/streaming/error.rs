//! Streaming failure taxonomy.

use std::io;

use thiserror::Error;

/// Why a transfer to the client stopped early.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The sink cannot flush per chunk; nothing was written.
    #[error("response sink does not support incremental flushing")]
    StreamingUnsupported,

    /// Writing or flushing to the client failed, typically a disconnect.
    #[error("client write failed after {written} bytes: {source}")]
    ClientWrite {
        written: u64,
        #[source]
        source: io::Error,
    },

    /// The upstream body broke off before EOF.
    #[error("upstream read failed after {read} bytes: {source}")]
    UpstreamRead {
        read: u64,
        #[source]
        source: io::Error,
    },
}

impl StreamError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::StreamingUnsupported => "unsupported",
            StreamError::ClientWrite { .. } => "client_write",
            StreamError::UpstreamRead { .. } => "upstream_read",
        }
    }
}
