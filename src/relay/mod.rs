//! Relay subsystem: everything between the handler and the upstream API.
//!
//! # Data Flow
//! ```text
//! handler
//!     → request.rs (fixed OutboundRequest → URL)
//!     → fetcher.rs (GET, retry on transport failure, overall deadline)
//!     → response.rs (status, mirrored headers, open body)
//!     → streaming responder
//! ```

pub mod error;
pub mod fetcher;
pub mod request;
pub mod response;

pub use error::RelayError;
pub use fetcher::{build_client, RelayFetcher};
pub use request::OutboundRequest;
pub use response::{UpstreamBody, UpstreamResponse};
