//! SQL text for each supported backend.
//!
//! The table name is validated as a plain identifier before any of these
//! are built; values are always bound, never formatted in.

use crate::ledger::error::LedgerError;

/// Database family behind the `any` pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, LedgerError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(LedgerError::UnsupportedDatabase(redact_credentials(url))),
        }
    }

    pub fn create_table(&self, table: &str) -> String {
        match self {
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    api_url VARCHAR(255) NOT NULL,
                    request_params TEXT,
                    response_data TEXT,
                    call_count BIGINT NOT NULL DEFAULT 1,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                    UNIQUE KEY uniq_api_url (api_url)
                )"
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    api_url TEXT NOT NULL UNIQUE,
                    request_params TEXT,
                    response_data TEXT,
                    call_count INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                )"
            ),
        }
    }

    /// Query counting unique indexes on `api_url`, bound with the table
    /// name. SQLite needs no check since its index statement is idempotent.
    pub fn unique_key_count(&self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some(
                "SELECT COUNT(*) FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 AND column_name = 'api_url' AND non_unique = 0",
            ),
            Dialect::Sqlite => None,
        }
    }

    /// Add the unique key to a table created without one.
    pub fn add_unique_key(&self, table: &str) -> String {
        match self {
            Dialect::MySql => format!("ALTER TABLE {table} ADD UNIQUE KEY uniq_api_url (api_url)"),
            Dialect::Sqlite => format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_api_url_key ON {table} (api_url)"
            ),
        }
    }

    pub fn count_by_url(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {table} WHERE api_url = ?")
    }

    pub fn increment(&self, table: &str) -> String {
        format!(
            "UPDATE {table} SET call_count = call_count + 1, updated_at = CURRENT_TIMESTAMP \
             WHERE api_url = ?"
        )
    }

    pub fn insert(&self, table: &str) -> String {
        format!(
            "INSERT INTO {table} (api_url, call_count, updated_at) VALUES (?, 1, CURRENT_TIMESTAMP)"
        )
    }

    /// Insert-or-increment in one statement; relies on the unique key.
    pub fn upsert(&self, table: &str) -> String {
        match self {
            Dialect::MySql => format!(
                "INSERT INTO {table} (api_url, call_count, updated_at) VALUES (?, 1, CURRENT_TIMESTAMP) \
                 ON DUPLICATE KEY UPDATE call_count = call_count + 1, updated_at = CURRENT_TIMESTAMP"
            ),
            Dialect::Sqlite => format!(
                "INSERT INTO {table} (api_url, call_count, updated_at) VALUES (?, 1, CURRENT_TIMESTAMP) \
                 ON CONFLICT(api_url) DO UPDATE SET call_count = call_count + 1, updated_at = CURRENT_TIMESTAMP"
            ),
        }
    }

    pub fn select_by_url(&self, table: &str) -> String {
        format!(
            "SELECT api_url, call_count, CAST(created_at AS CHAR), CAST(updated_at AS CHAR) \
             FROM {table} WHERE api_url = ? ORDER BY id LIMIT 1"
        )
    }
}

/// Drop `user:password@` from a connection URL before logging it.
pub fn redact_credentials(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
