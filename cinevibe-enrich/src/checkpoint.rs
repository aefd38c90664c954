// Durable per-phase progress and resume cursor
//
// One row per phase in `enrichment_checkpoints`. Every mutating call
// persists immediately, so the last durable write after a crash reflects the
// last fully completed unit of work; no partially-completed item is ever
// recorded as done.
//
// Writes use an optimistic version counter (version = version + 1 WHERE
// version = ?): single-writer-per-phase is still the caller's invariant, but
// a competing writer now fails loudly instead of silently interleaving.

use crate::error::{EnrichError, EnrichResult};
use crate::types::CheckpointState;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// Handle on one phase's durable checkpoint row
#[derive(Debug)]
pub struct ProgressCheckpoint {
    db: SqlitePool,
    state: CheckpointState,
    /// Whether the row exists in storage yet
    persisted: bool,
}

impl ProgressCheckpoint {
    /// Load prior state for a phase, or start fresh with `total` items.
    ///
    /// A prior row means a previous run did not complete; its counters and
    /// processed-id cursor carry over so resumed work excludes done items.
    pub async fn load_or_new(db: SqlitePool, phase: &str, total: u64) -> EnrichResult<Self> {
        match Self::load(&db, phase).await? {
            Some(mut state) => {
                tracing::info!(
                    phase,
                    processed = state.processed(),
                    total = state.total,
                    "Resuming from existing checkpoint"
                );
                // A resumed run may see a different work-queue size
                state.total = state.processed() + total.saturating_sub(state.processed());
                Ok(Self {
                    db,
                    state,
                    persisted: true,
                })
            }
            None => Ok(Self {
                db,
                state: CheckpointState::new(phase, total),
                persisted: false,
            }),
        }
    }

    /// Read a phase's checkpoint row, if present
    pub async fn load(db: &SqlitePool, phase: &str) -> EnrichResult<Option<CheckpointState>> {
        let row = sqlx::query_as::<
            _,
            (String, i64, i64, i64, i64, String, Option<i64>, String, String, i64),
        >(
            r#"
            SELECT phase, total, succeeded, failed, skipped, processed_ids,
                   last_item_id, started_at, updated_at, version
            FROM enrichment_checkpoints
            WHERE phase = ?
            "#,
        )
        .bind(phase)
        .fetch_optional(db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let processed_ids: Vec<i64> = serde_json::from_str(&row.5)
            .map_err(|e| EnrichError::Decode(format!("checkpoint processed_ids: {}", e)))?;
        let started_at = parse_timestamp(&row.7)?;
        let updated_at = parse_timestamp(&row.8)?;

        Ok(Some(CheckpointState {
            phase: row.0,
            total: row.1 as u64,
            succeeded: row.2 as u64,
            failed: row.3 as u64,
            skipped: row.4 as u64,
            processed_ids,
            last_item_id: row.6,
            started_at,
            updated_at,
            version: row.9,
        }))
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// Processed-id set for excluding already-done items from the next fetch
    pub fn processed_set(&self) -> HashSet<i64> {
        self.state.processed_ids.iter().copied().collect()
    }

    /// Adjust the expected total (e.g. after the work queue is fetched)
    pub async fn set_total(&mut self, total: u64) -> EnrichResult<()> {
        self.state.total = total;
        self.persist().await
    }

    pub async fn record_success(&mut self, item_id: i64) -> EnrichResult<()> {
        self.state.succeeded += 1;
        self.record_processed(item_id).await
    }

    pub async fn record_failure(&mut self, item_id: i64) -> EnrichResult<()> {
        self.state.failed += 1;
        self.record_processed(item_id).await
    }

    async fn record_processed(&mut self, item_id: i64) -> EnrichResult<()> {
        self.state.processed_ids.push(item_id);
        self.state.last_item_id = Some(item_id);
        self.persist().await?;

        let state = &self.state;
        tracing::debug!(
            phase = %state.phase,
            item_id,
            progress = format!("{:.1}%", state.progress_percent()),
            eta_secs = state.estimated_remaining().map(|d| d.num_seconds()),
            "Checkpoint advanced"
        );
        Ok(())
    }

    /// Clear the row after a fully successful pass
    pub async fn clear(self) -> EnrichResult<()> {
        sqlx::query("DELETE FROM enrichment_checkpoints WHERE phase = ?")
            .bind(&self.state.phase)
            .execute(&self.db)
            .await?;
        tracing::info!(phase = %self.state.phase, "Checkpoint cleared");
        Ok(())
    }

    /// Persist current state; insert on first write, optimistic update after
    async fn persist(&mut self) -> EnrichResult<()> {
        self.state.updated_at = Utc::now();
        let processed_ids = serde_json::to_string(&self.state.processed_ids)
            .map_err(|e| EnrichError::Decode(format!("checkpoint processed_ids: {}", e)))?;

        if !self.persisted {
            sqlx::query(
                r#"
                INSERT INTO enrichment_checkpoints
                    (phase, total, succeeded, failed, skipped, processed_ids,
                     last_item_id, started_at, updated_at, version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                "#,
            )
            .bind(&self.state.phase)
            .bind(self.state.total as i64)
            .bind(self.state.succeeded as i64)
            .bind(self.state.failed as i64)
            .bind(self.state.skipped as i64)
            .bind(&processed_ids)
            .bind(self.state.last_item_id)
            .bind(self.state.started_at.to_rfc3339())
            .bind(self.state.updated_at.to_rfc3339())
            .execute(&self.db)
            .await?;
            self.state.version = 1;
            self.persisted = true;
            return Ok(());
        }

        let updated = sqlx::query(
            r#"
            UPDATE enrichment_checkpoints SET
                total = ?, succeeded = ?, failed = ?, skipped = ?,
                processed_ids = ?, last_item_id = ?, updated_at = ?,
                version = version + 1
            WHERE phase = ? AND version = ?
            "#,
        )
        .bind(self.state.total as i64)
        .bind(self.state.succeeded as i64)
        .bind(self.state.failed as i64)
        .bind(self.state.skipped as i64)
        .bind(&processed_ids)
        .bind(self.state.last_item_id)
        .bind(self.state.updated_at.to_rfc3339())
        .bind(&self.state.phase)
        .bind(self.state.version)
        .execute(&self.db)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(EnrichError::CheckpointConflict(self.state.phase.clone()));
        }
        self.state.version += 1;
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> EnrichResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EnrichError::Decode(format!("checkpoint timestamp '{}': {}", s, e)))
}
