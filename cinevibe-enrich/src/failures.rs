// Durable failure records
//
// One row per (item, phase): created on first failure, retry counter bumped
// on repeats, marked resolved on eventual success. Rows are never deleted
// except by the explicit retention sweep, so the audit trail and the
// retry-queue derivation both survive restarts.

use crate::error::{EnrichResult, ErrorKind};
use crate::types::FailureRecord;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Failure bookkeeping over the `enrichment_failures` table
#[derive(Debug, Clone)]
pub struct FailureStore {
    db: SqlitePool,
}

impl FailureStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a failure for (item, phase).
    ///
    /// First failure inserts a fresh row; a repeat failure in the same phase
    /// updates the kind/message in place, increments the retry counter, and
    /// clears any stale resolved flag.
    pub async fn record_failure(
        &self,
        item_id: i64,
        phase: &str,
        kind: ErrorKind,
        message: &str,
    ) -> EnrichResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO enrichment_failures
                (id, item_id, phase, error_kind, message, retry_count, resolved, last_attempt_at)
            VALUES (?, ?, ?, ?, ?, 0, 0, ?)
            ON CONFLICT (item_id, phase) DO UPDATE SET
                error_kind = excluded.error_kind,
                message = excluded.message,
                retry_count = retry_count + 1,
                resolved = 0,
                last_attempt_at = excluded.last_attempt_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(item_id)
        .bind(phase)
        .bind(kind.as_str())
        .bind(message)
        .bind(&now)
        .execute(&self.db)
        .await?;

        tracing::debug!(
            item_id,
            phase,
            error_kind = kind.as_str(),
            "Failure recorded"
        );
        Ok(())
    }

    /// Mark every failure row for an item resolved (called on item success)
    pub async fn mark_resolved(&self, item_id: i64) -> EnrichResult<()> {
        let updated = sqlx::query(
            "UPDATE enrichment_failures SET resolved = 1, last_attempt_at = ? WHERE item_id = ? AND resolved = 0",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(item_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if updated > 0 {
            tracing::debug!(item_id, resolved = updated, "Failures marked resolved");
        }
        Ok(())
    }

    /// Unresolved failures for one phase (retry-queue derivation)
    pub async fn unresolved(&self, phase: &str) -> EnrichResult<Vec<FailureRecord>> {
        let rows = sqlx::query_as::<_, (String, i64, String, String, String, i64, i64, String)>(
            r#"
            SELECT id, item_id, phase, error_kind, message, retry_count, resolved, last_attempt_at
            FROM enrichment_failures
            WHERE phase = ? AND resolved = 0
            ORDER BY last_attempt_at ASC
            "#,
        )
        .bind(phase)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    /// Retention sweep: delete resolved rows older than the cutoff.
    ///
    /// This is the only path that ever deletes failure rows.
    pub async fn sweep_resolved(&self, older_than: DateTime<Utc>) -> EnrichResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM enrichment_failures WHERE resolved = 1 AND last_attempt_at < ?",
        )
        .bind(older_than.to_rfc3339())
        .execute(&self.db)
        .await?
        .rows_affected();

        tracing::info!(deleted, "Resolved failure records swept");
        Ok(deleted)
    }

    fn row_to_record(
        row: (String, i64, String, String, String, i64, i64, String),
    ) -> EnrichResult<FailureRecord> {
        use crate::error::EnrichError;
        let id = Uuid::parse_str(&row.0)
            .map_err(|e| EnrichError::Decode(format!("failure id '{}': {}", row.0, e)))?;
        let last_attempt_at = DateTime::parse_from_rfc3339(&row.7)
            .map_err(|e| EnrichError::Decode(format!("failure timestamp '{}': {}", row.7, e)))?
            .with_timezone(&Utc);
        Ok(FailureRecord {
            id,
            item_id: row.1,
            phase: row.2,
            error_kind: row.3,
            message: row.4,
            retry_count: row.5 as u32,
            resolved: row.6 != 0,
            last_attempt_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> FailureStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        cinevibe_common::db::init_tables(&pool).await.unwrap();
        FailureStore::new(pool)
    }

    #[tokio::test]
    async fn test_first_failure_then_retry_increments() {
        let store = store().await;

        store
            .record_failure(42, "extraction", ErrorKind::Timeout, "content timeout")
            .await
            .unwrap();
        let records = store.unresolved("extraction").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].retry_count, 0);
        assert_eq!(records[0].error_kind, "timeout");

        store
            .record_failure(42, "extraction", ErrorKind::RateLimit, "429")
            .await
            .unwrap();
        let records = store.unresolved("extraction").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].retry_count, 1);
        // Kind reflects the latest failure
        assert_eq!(records[0].error_kind, "rate_limit");
    }

    #[tokio::test]
    async fn test_phases_are_independent_rows() {
        let store = store().await;
        store
            .record_failure(7, "extraction", ErrorKind::ExtractionError, "bad json")
            .await
            .unwrap();
        store
            .record_failure(7, "embedding", ErrorKind::EmbeddingError, "vibe vector missing")
            .await
            .unwrap();

        assert_eq!(store.unresolved("extraction").await.unwrap().len(), 1);
        assert_eq!(store.unresolved("embedding").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_and_sweep() {
        let store = store().await;
        store
            .record_failure(7, "extraction", ErrorKind::Timeout, "slow")
            .await
            .unwrap();
        store.mark_resolved(7).await.unwrap();
        assert!(store.unresolved("extraction").await.unwrap().is_empty());

        // Unresolved rows survive a sweep; resolved rows older than the
        // cutoff do not.
        store
            .record_failure(8, "extraction", ErrorKind::Timeout, "slow")
            .await
            .unwrap();
        let deleted = store
            .sweep_resolved(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.unresolved("extraction").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_reopens_after_resolution() {
        let store = store().await;
        store
            .record_failure(9, "extraction", ErrorKind::Timeout, "slow")
            .await
            .unwrap();
        store.mark_resolved(9).await.unwrap();

        store
            .record_failure(9, "extraction", ErrorKind::Timeout, "slow again")
            .await
            .unwrap();
        let records = store.unresolved("extraction").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].resolved);
    }
}
