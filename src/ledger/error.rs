//! Ledger failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Why a ledger operation failed. Always logged, never shown to clients.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ledger write exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error("unsupported database URL scheme in '{0}'")]
    UnsupportedDatabase(String),

    #[error("invalid ledger table name '{0}'")]
    InvalidTable(String),
}
