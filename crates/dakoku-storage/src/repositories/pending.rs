#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::PendingRecord;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;

/// Repository trait for the pending-record queue
///
/// Every operation is a single short statement on a pooled connection; no
/// lock is held across operations, so the synchronous failure path and the
/// retry-sync worker interleave safely on the same table.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature),
/// eliminating the need for the async-trait crate while maintaining
/// full async/await support in trait methods.
pub trait PendingRecordRepository: Send + Sync {
    /// Queue a scan that failed immediate delivery.
    ///
    /// `created_at` is fixed here and never changes; the new row starts
    /// with `retry_count = 0`.
    async fn insert(
        &self,
        idm: &str,
        timestamp: chrono::DateTime<Utc>,
        terminal_id: &str,
    ) -> StorageResult<i64>;

    /// Fetch unsent records that have aged at least `min_age`, oldest
    /// first, up to `limit` rows.
    ///
    /// The age gate bounds retry bursts right after an outage; a record
    /// younger than `min_age` is never returned, however often this is
    /// called.
    async fn list_pending(&self, min_age: Duration, limit: i64) -> StorageResult<Vec<PendingRecord>>;

    /// Flag a record as delivered. Idempotent; after this call the record
    /// never appears in `list_pending` again.
    async fn mark_sent(&self, record_id: i64) -> StorageResult<()>;

    /// Increase a record's retry counter by one. No upper bound.
    async fn increment_retry(&self, record_id: i64) -> StorageResult<()>;

    /// Count records still awaiting delivery.
    async fn count_pending(&self) -> StorageResult<i64>;

    /// Fetch one record by id.
    async fn find_by_id(&self, record_id: i64) -> StorageResult<Option<PendingRecord>>;
}

/// SQLite implementation of PendingRecordRepository
#[derive(Debug, Clone)]
pub struct SqlitePendingRecordRepository {
    pool: SqlitePool,
}

impl SqlitePendingRecordRepository {
    /// Create a new SQLite pending-record repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PendingRecordRepository for SqlitePendingRecordRepository {
    async fn insert(
        &self,
        idm: &str,
        timestamp: chrono::DateTime<Utc>,
        terminal_id: &str,
    ) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO pending_records (idm, timestamp, terminal_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(idm)
        .bind(timestamp)
        .bind(terminal_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_pending(
        &self,
        min_age: Duration,
        limit: i64,
    ) -> StorageResult<Vec<PendingRecord>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(min_age.as_secs() as i64);

        let records = sqlx::query_as::<_, PendingRecord>(
            r#"
            SELECT id, idm, timestamp, terminal_id, created_at,
                   sent_to_server, retry_count
            FROM pending_records
            WHERE sent_to_server = 0 AND created_at <= ?
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn mark_sent(&self, record_id: i64) -> StorageResult<()> {
        sqlx::query("UPDATE pending_records SET sent_to_server = 1 WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn increment_retry(&self, record_id: i64) -> StorageResult<()> {
        sqlx::query("UPDATE pending_records SET retry_count = retry_count + 1 WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_pending(&self) -> StorageResult<i64> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pending_records WHERE sent_to_server = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(result.0)
    }

    async fn find_by_id(&self, record_id: i64) -> StorageResult<Option<PendingRecord>> {
        let record = sqlx::query_as::<_, PendingRecord>(
            r#"
            SELECT id, idm, timestamp, terminal_id, created_at,
                   sent_to_server, retry_count
            FROM pending_records
            WHERE id = ?
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
