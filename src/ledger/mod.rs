//! Call ledger subsystem.
//!
//! # Data Flow
//! ```text
//! transfer finished
//!     → store.rs (spawned task, own 5s budget)
//!     → dialect.rs (SQL for MySQL or SQLite)
//!     → pooled connection
//! ```
//!
//! # Design Decisions
//! - Observability, not a correctness gate: errors are logged and dropped
//! - Keyed by the literal inbound URL string
//! - Atomic upsert by default; check-then-act kept for parity and races

pub mod dialect;
pub mod error;
pub mod store;

pub use dialect::Dialect;
pub use error::LedgerError;
pub use store::{CallLedger, LedgerRecord, RecordOutcome};
