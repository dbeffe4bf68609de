//! Streaming subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamBody (AsyncRead)
//!     → responder.rs (read ≤ chunk_size, write, flush, repeat)
//!     → sink.rs (ChannelSink → axum Body → hyper → client)
//! ```
//!
//! # Design Decisions
//! - Never more than one chunk buffered per request
//! - Flush capability is checked per transfer, before the first byte

pub mod error;
pub mod responder;
pub mod sink;

pub use error::StreamError;
pub use responder::{StreamingResponder, TransferReport, DEFAULT_CHUNK_SIZE};
pub use sink::{ChannelSink, ChunkSink, WriterSink};
