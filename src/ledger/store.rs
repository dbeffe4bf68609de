//! Call ledger backed by a pooled SQL connection.

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Row;
use tokio::task::JoinHandle;

use crate::config::validation::is_identifier;
use crate::config::{LedgerConfig, UpsertStrategy};
use crate::ledger::dialect::{redact_credentials, Dialect};
use crate::ledger::error::LedgerError;
use crate::observability::metrics;
use crate::resilience::with_deadline;

/// One ledger row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub api_url: String,
    pub call_count: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// What a successful [`CallLedger::record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First sighting of the URL (check-then-act).
    Inserted,
    /// Existing row incremented (check-then-act).
    Incremented,
    /// Insert-or-increment in one statement.
    Upserted,
}

/// Records how often each request URL was served.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct CallLedger {
    pool: AnyPool,
    dialect: Dialect,
    table: String,
    strategy: UpsertStrategy,
    timeout: Duration,
}

impl CallLedger {
    pub fn new(
        pool: AnyPool,
        dialect: Dialect,
        table: &str,
        strategy: UpsertStrategy,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        if !is_identifier(table) {
            return Err(LedgerError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            pool,
            dialect,
            table: table.to_string(),
            strategy,
            timeout,
        })
    }

    /// Open the pool described by `config`.
    ///
    /// In-memory SQLite is pinned to a single connection that never
    /// expires, otherwise every connection would see its own empty database.
    pub async fn connect(config: &LedgerConfig, timeout: Duration) -> Result<Self, LedgerError> {
        sqlx::any::install_default_drivers();

        let dialect = Dialect::from_url(&config.database_url)?;
        let in_memory = dialect == Dialect::Sqlite && config.database_url.contains(":memory:");

        let mut options = AnyPoolOptions::new().acquire_timeout(timeout);
        options = if in_memory {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(config.max_connections)
        };

        let pool = options.connect(&config.database_url).await?;

        tracing::info!(
            database = %redact_credentials(&config.database_url),
            table = %config.table_name,
            strategy = ?config.strategy,
            "Ledger connected"
        );
        if in_memory {
            tracing::warn!("Ledger is in-memory, call counts are lost on restart");
        }

        Self::new(pool, dialect, &config.table_name, config.strategy, timeout)
    }

    pub fn strategy(&self) -> UpsertStrategy {
        self.strategy
    }

    /// Create the ledger table if it does not exist, and make sure
    /// `api_url` carries a unique key.
    ///
    /// Tables created by older deployments lack the key. If it cannot be
    /// added (usually because duplicate rows already exist), an atomic ledger
    /// falls back to check-then-act, which does not depend on it.
    pub async fn ensure_table(&mut self) -> Result<(), LedgerError> {
        let sql = self.dialect.create_table(&self.table);
        sqlx::query(&sql).execute(&self.pool).await?;

        if let Err(e) = self.ensure_unique_key().await {
            if self.strategy == UpsertStrategy::Atomic {
                tracing::warn!(
                    table = %self.table,
                    error = %e,
                    "No unique key on api_url, falling back to check_then_act"
                );
                self.strategy = UpsertStrategy::CheckThenAct;
            } else {
                tracing::warn!(table = %self.table, error = %e, "No unique key on api_url");
            }
        }

        tracing::info!(table = %self.table, strategy = ?self.strategy, "Ledger table checked/created");
        Ok(())
    }

    async fn ensure_unique_key(&self) -> Result<(), LedgerError> {
        if let Some(check) = self.dialect.unique_key_count() {
            let existing: i64 = sqlx::query_scalar(check)
                .bind(self.table.as_str())
                .fetch_one(&self.pool)
                .await?;
            if existing > 0 {
                return Ok(());
            }
        }

        let sql = self.dialect.add_unique_key(&self.table);
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::info!(table = %self.table, "Unique key on api_url ensured");
        Ok(())
    }

    /// Count one more serve of `api_url`, within the ledger budget.
    pub async fn record(&self, api_url: &str) -> Result<RecordOutcome, LedgerError> {
        with_deadline(self.timeout, self.record_unbounded(api_url))
            .await
            .map_err(|e| LedgerError::Timeout(e.0))?
    }

    async fn record_unbounded(&self, api_url: &str) -> Result<RecordOutcome, LedgerError> {
        match self.strategy {
            UpsertStrategy::Atomic => {
                let sql = self.dialect.upsert(&self.table);
                sqlx::query(&sql).bind(api_url).execute(&self.pool).await?;
                Ok(RecordOutcome::Upserted)
            }
            UpsertStrategy::CheckThenAct => {
                // Two separate statements: a concurrent request for the same
                // URL can slip in between the check and the write.
                let check = self.dialect.count_by_url(&self.table);
                let existing: i64 = sqlx::query_scalar(&check)
                    .bind(api_url)
                    .fetch_one(&self.pool)
                    .await?;

                if existing > 0 {
                    let sql = self.dialect.increment(&self.table);
                    sqlx::query(&sql).bind(api_url).execute(&self.pool).await?;
                    Ok(RecordOutcome::Incremented)
                } else {
                    let sql = self.dialect.insert(&self.table);
                    sqlx::query(&sql).bind(api_url).execute(&self.pool).await?;
                    Ok(RecordOutcome::Inserted)
                }
            }
        }
    }

    /// Record `api_url`, logging the outcome. Failures are never returned.
    pub async fn record_logged(&self, api_url: &str, request_id: &str) {
        match self.record(api_url).await {
            Ok(outcome) => {
                metrics::record_ledger_write("ok");
                tracing::info!(
                    request_id = %request_id,
                    api_url = %api_url,
                    outcome = ?outcome,
                    "API call recorded"
                );
            }
            Err(e) => {
                metrics::record_ledger_write("error");
                tracing::error!(
                    request_id = %request_id,
                    api_url = %api_url,
                    error = %e,
                    "Failed to record API call"
                );
            }
        }
    }

    /// Record `api_url` on a detached task.
    pub fn record_in_background(&self, api_url: String, request_id: String) -> JoinHandle<()> {
        let ledger = self.clone();
        tokio::spawn(async move { ledger.record_logged(&api_url, &request_id).await })
    }

    /// Fetch the stored record for `api_url`.
    pub async fn lookup(&self, api_url: &str) -> Result<Option<LedgerRecord>, LedgerError> {
        let sql = self.dialect.select_by_url(&self.table);
        let row = sqlx::query(&sql)
            .bind(api_url)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(LedgerRecord {
            api_url: row.try_get(0)?,
            call_count: row.try_get(1)?,
            created_at: row.try_get(2)?,
            updated_at: row.try_get(3)?,
        }))
    }

    /// Number of rows stored for `api_url`.
    pub async fn row_count(&self, api_url: &str) -> Result<i64, LedgerError> {
        let sql = self.dialect.count_by_url(&self.table);
        let count = sqlx::query_scalar(&sql)
            .bind(api_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_ledger(strategy: UpsertStrategy) -> CallLedger {
        let config = LedgerConfig {
            database_url: "sqlite::memory:".into(),
            strategy,
            ..LedgerConfig::default()
        };
        let mut ledger = CallLedger::connect(&config, Duration::from_secs(5))
            .await
            .unwrap();
        ledger.ensure_table().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_check_then_act_counts_sequential_calls() {
        let ledger = memory_ledger(UpsertStrategy::CheckThenAct).await;

        assert_eq!(ledger.record("/random-image").await.unwrap(), RecordOutcome::Inserted);
        assert_eq!(ledger.record("/random-image").await.unwrap(), RecordOutcome::Incremented);

        let record = ledger.lookup("/random-image").await.unwrap().unwrap();
        assert_eq!(record.call_count, 2);
        assert!(record.updated_at.is_some());
        assert_eq!(ledger.row_count("/random-image").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_atomic_counts_sequential_calls() {
        let ledger = memory_ledger(UpsertStrategy::Atomic).await;

        for _ in 0..3 {
            assert_eq!(ledger.record("/random-image").await.unwrap(), RecordOutcome::Upserted);
        }

        let record = ledger.lookup("/random-image").await.unwrap().unwrap();
        assert_eq!(record.call_count, 3);
        assert_eq!(ledger.row_count("/random-image").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_urls_are_keyed_literally() {
        let ledger = memory_ledger(UpsertStrategy::Atomic).await;
        ledger.record("/random-image").await.unwrap();
        ledger.record("/random-image?x=1").await.unwrap();

        assert_eq!(ledger.lookup("/random-image").await.unwrap().unwrap().call_count, 1);
        assert_eq!(ledger.lookup("/random-image?x=1").await.unwrap().unwrap().call_count, 1);
        assert!(ledger.lookup("/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_atomic_concurrent_calls_do_not_lose_updates() {
        let ledger = memory_ledger(UpsertStrategy::Atomic).await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.record("/random-image").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = ledger.lookup("/random-image").await.unwrap().unwrap();
        assert_eq!(record.call_count, 10);
        assert_eq!(ledger.row_count("/random-image").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_check_then_act_concurrent_calls_known_race() {
        let ledger = memory_ledger(UpsertStrategy::CheckThenAct).await;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.record("/random-image").await })
            })
            .collect();
        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        // A racing insert may fail on the unique key; whatever happened,
        // one row exists and it never over-counts.
        let record = ledger.lookup("/random-image").await.unwrap().unwrap();
        assert!(succeeded >= 1);
        assert!(record.call_count >= 1 && record.call_count <= succeeded);
        assert_eq!(ledger.row_count("/random-image").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let config = LedgerConfig {
            database_url: "sqlite::memory:".into(),
            table_name: "never_created".into(),
            ..LedgerConfig::default()
        };
        let ledger = CallLedger::connect(&config, Duration::from_secs(5))
            .await
            .unwrap();

        let err = ledger.record("/random-image").await.unwrap_err();
        assert!(matches!(err, LedgerError::Database(_)));
    }

    #[tokio::test]
    async fn test_background_record_swallows_errors() {
        let config = LedgerConfig {
            database_url: "sqlite::memory:".into(),
            table_name: "never_created".into(),
            ..LedgerConfig::default()
        };
        let ledger = CallLedger::connect(&config, Duration::from_secs(5))
            .await
            .unwrap();

        ledger
            .record_in_background("/random-image".into(), "t".into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() {
        let config = LedgerConfig {
            database_url: "sqlite::memory:".into(),
            table_name: "calls; DROP TABLE calls".into(),
            ..LedgerConfig::default()
        };
        let err = CallLedger::connect(&config, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTable(_)));
    }

    const LEGACY_TABLE: &str = "CREATE TABLE api_calls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_url TEXT NOT NULL,
        request_params TEXT,
        response_data TEXT,
        call_count INTEGER DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    )";

    async fn bare_ledger(strategy: UpsertStrategy) -> CallLedger {
        let config = LedgerConfig {
            database_url: "sqlite::memory:".into(),
            strategy,
            ..LedgerConfig::default()
        };
        CallLedger::connect(&config, Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_existing_table_without_unique_key_gets_one() {
        let mut ledger = bare_ledger(UpsertStrategy::Atomic).await;
        sqlx::query(LEGACY_TABLE).execute(&ledger.pool).await.unwrap();

        ledger.ensure_table().await.unwrap();
        assert_eq!(ledger.strategy(), UpsertStrategy::Atomic);

        ledger.record("/random-image").await.unwrap();
        ledger.record("/random-image").await.unwrap();

        let record = ledger.lookup("/random-image").await.unwrap().unwrap();
        assert_eq!(record.call_count, 2);
        assert_eq!(ledger.row_count("/random-image").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rows_fall_back_to_check_then_act() {
        let mut ledger = bare_ledger(UpsertStrategy::Atomic).await;
        sqlx::query(LEGACY_TABLE).execute(&ledger.pool).await.unwrap();
        for _ in 0..2 {
            sqlx::query("INSERT INTO api_calls (api_url) VALUES ('/random-image')")
                .execute(&ledger.pool)
                .await
                .unwrap();
        }

        ledger.ensure_table().await.unwrap();
        assert_eq!(ledger.strategy(), UpsertStrategy::CheckThenAct);

        assert_eq!(
            ledger.record("/random-image").await.unwrap(),
            RecordOutcome::Incremented
        );
        assert_eq!(ledger.record("/new").await.unwrap(), RecordOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let mut ledger = memory_ledger(UpsertStrategy::Atomic).await;
        ledger.record("/random-image").await.unwrap();

        ledger.ensure_table().await.unwrap();
        assert_eq!(ledger.strategy(), UpsertStrategy::Atomic);
        assert_eq!(ledger.lookup("/random-image").await.unwrap().unwrap().call_count, 1);
    }

    #[tokio::test]
    async fn test_record_gives_up_after_budget() {
        let ledger = memory_ledger(UpsertStrategy::Atomic).await;
        // The in-memory pool has a single connection; holding it stalls
        // every query behind it.
        let held = ledger.pool.acquire().await.unwrap();

        let slow = CallLedger::new(
            ledger.pool.clone(),
            Dialect::Sqlite,
            "api_calls",
            UpsertStrategy::Atomic,
            Duration::from_millis(50),
        )
        .unwrap();

        let err = slow.record("/random-image").await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));

        drop(held);
        assert!(ledger.lookup("/random-image").await.unwrap().is_none());
    }
}
