// Batch coordinator
//
// Drives an enrichment pass end to end: fetch the work queue, drop items the
// checkpoint already covers, then process chunk by chunk. Per item: run the
// tier chain, generate the three companion vectors concurrently, and commit
// metadata plus vectors in one statement. Every item outcome is recorded in
// the checkpoint before the next item starts.
//
// Item failures never abort the batch; only infrastructure faults (checkpoint
// conflicts, work-queue reads) do.

use crate::db::CatalogStore;
use crate::checkpoint::ProgressCheckpoint;
use crate::error::{EnrichError, EnrichResult, ErrorKind};
use crate::extractor::TierFallbackExtractor;
use crate::failures::FailureStore;
use crate::limiter::ServiceLimiter;
use crate::providers::EmbeddingProvider;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{
    CatalogItem, EmbeddingBundle, EmbeddingKind, EnrichedMetadata, EnrichmentMethod, RunSummary,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Checkpoint phase for the enrichment pass
pub const ENRICH_PHASE: &str = "enrich";

/// Failure-record phase for embedding generation
const EMBEDDING_PHASE: &str = "embedding";

/// Failure-record phase for the final commit
const WRITE_PHASE: &str = "write";

pub struct BatchCoordinator {
    store: CatalogStore,
    extractor: TierFallbackExtractor,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_limiter: Arc<ServiceLimiter>,
    failures: FailureStore,
    retry: RetryPolicy,
    chunk_size: usize,
    dry_run: bool,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: CatalogStore,
        extractor: TierFallbackExtractor,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_limiter: Arc<ServiceLimiter>,
        failures: FailureStore,
        retry: RetryPolicy,
        chunk_size: usize,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            extractor,
            embedder,
            embed_limiter,
            failures,
            retry,
            chunk_size: chunk_size.max(1),
            dry_run,
            cancel,
        }
    }

    /// Run one enrichment pass over up to `limit` unenriched items.
    ///
    /// Resumes from a prior interrupted pass: items the checkpoint already
    /// counts are excluded before processing starts, so no item is ever
    /// processed twice across runs.
    pub async fn run(&self, limit: Option<u32>) -> EnrichResult<RunSummary> {
        let fetched = self.store.fetch_unenriched(limit).await?;

        let mut checkpoint = if self.dry_run {
            None
        } else {
            Some(
                ProgressCheckpoint::load_or_new(
                    self.store.pool().clone(),
                    ENRICH_PHASE,
                    fetched.len() as u64,
                )
                .await?,
            )
        };

        let fetched_count = fetched.len() as u64;
        let queue: Vec<CatalogItem> = match &checkpoint {
            Some(cp) => {
                let done = cp.processed_set();
                fetched.into_iter().filter(|i| !done.contains(&i.id)).collect()
            }
            None => fetched,
        };

        // Items the interrupted prior pass already counted are skipped, not
        // reprocessed.
        let mut summary = RunSummary {
            total: fetched_count,
            skipped: fetched_count - queue.len() as u64,
            dry_run: self.dry_run,
            ..Default::default()
        };
        if summary.skipped > 0 {
            tracing::info!(
                skipped = summary.skipped,
                "Excluding items already processed by the resumed pass"
            );
        }

        if let Some(cp) = checkpoint.as_mut() {
            cp.set_total(cp.state().processed() + queue.len() as u64).await?;
        }

        tracing::info!(
            items = queue.len(),
            chunk_size = self.chunk_size,
            dry_run = self.dry_run,
            "Enrichment pass starting"
        );

        let mut cancelled = false;
        'outer: for (chunk_index, chunk) in queue.chunks(self.chunk_size).enumerate() {
            tracing::info!(
                chunk = chunk_index + 1,
                items = chunk.len(),
                "Processing chunk"
            );

            for item in chunk {
                if self.cancel.is_cancelled() {
                    tracing::warn!(
                        processed = summary.succeeded + summary.failed + summary.skipped,
                        "Cancellation requested, stopping after last completed item"
                    );
                    cancelled = true;
                    break 'outer;
                }
                self.process_item(item, &mut summary, checkpoint.as_mut()).await?;
            }
        }

        // A completed pass clears its checkpoint; items that failed before
        // commit are still unenriched and will be picked up by the next run.
        if !cancelled {
            if let Some(cp) = checkpoint.take() {
                cp.clear().await?;
            }
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Enrichment pass finished"
        );
        Ok(summary)
    }

    /// Process one item end to end; errors here are infrastructure faults,
    /// per-item failures are absorbed into the summary.
    async fn process_item(
        &self,
        item: &CatalogItem,
        summary: &mut RunSummary,
        mut checkpoint: Option<&mut ProgressCheckpoint>,
    ) -> EnrichResult<()> {
        let result = match self.extractor.extract(item).await {
            Ok(result) => result,
            Err(err) => {
                // Terminal extraction failure: the item is marked with the
                // error method so it leaves the work queue until retried
                // explicitly.
                summary.failed += 1;
                summary.record_method(EnrichmentMethod::Error);
                if !self.dry_run {
                    self.store.mark_error(item.id).await?;
                }
                if let Some(cp) = checkpoint.as_deref_mut() {
                    cp.record_failure(item.id).await?;
                }
                tracing::error!(item_id = item.id, title = %item.title, error = %err, "Item failed terminally");
                return Ok(());
            }
        };

        if self.dry_run {
            tracing::info!(
                item_id = item.id,
                title = %item.title,
                method = result.method.as_str(),
                "Dry run: extraction only, nothing committed"
            );
            summary.succeeded += 1;
            summary.record_method(result.method);
            return Ok(());
        }

        let bundle = self.embed_all(item, &result.metadata).await;
        if !bundle.is_complete() {
            let message = format!("missing vectors: {}", bundle.missing().join(", "));
            self.failures
                .record_failure(item.id, EMBEDDING_PHASE, ErrorKind::EmbeddingError, &message)
                .await?;
            summary.failed += 1;
            if let Some(cp) = checkpoint.as_deref_mut() {
                cp.record_failure(item.id).await?;
            }
            tracing::warn!(item_id = item.id, %message, "Embedding bundle incomplete, commit withheld");
            return Ok(());
        }

        match self
            .store
            .commit_enrichment(item.id, result.method, &result.metadata, &bundle)
            .await
        {
            Ok(()) => {
                self.failures.mark_resolved(item.id).await?;
                summary.succeeded += 1;
                summary.record_method(result.method);
                if let Some(cp) = checkpoint.as_deref_mut() {
                    cp.record_success(item.id).await?;
                }
                tracing::info!(
                    item_id = item.id,
                    title = %item.title,
                    method = result.method.as_str(),
                    "Item enriched"
                );
            }
            Err(EnrichError::Write(err)) => {
                self.failures
                    .record_failure(item.id, WRITE_PHASE, ErrorKind::WriteError, &err.to_string())
                    .await?;
                summary.failed += 1;
                if let Some(cp) = checkpoint.as_deref_mut() {
                    cp.record_failure(item.id).await?;
                }
                tracing::error!(item_id = item.id, error = %err, "Commit failed");
            }
            Err(other) => return Err(other),
        }
        Ok(())
    }

    /// Generate the three companion vectors concurrently.
    ///
    /// A provider failure for one vector leaves its slot `None`; the caller
    /// treats any incomplete bundle as a per-item embedding failure.
    async fn embed_all(&self, item: &CatalogItem, metadata: &EnrichedMetadata) -> EmbeddingBundle {
        let (vibe, content, meta) = tokio::join!(
            self.embed_one(EmbeddingKind::Vibe, vibe_text(metadata)),
            self.embed_one(EmbeddingKind::Content, content_text(item, metadata)),
            self.embed_one(EmbeddingKind::Metadata, metadata_text(item, metadata)),
        );
        EmbeddingBundle {
            vibe,
            content,
            metadata: meta,
        }
    }

    async fn embed_one(&self, kind: EmbeddingKind, text: String) -> Option<Vec<f32>> {
        let outcome = retry_with_backoff(
            "embedding",
            self.retry,
            Some(&self.embed_limiter),
            || self.embedder.embed(kind, &text),
        )
        .await;

        match outcome {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(kind = kind.as_str(), error = %err, "Embedding call failed");
                None
            }
        }
    }
}

/// Text embedded as the vibe vector: atmosphere descriptors plus tone/pacing
fn vibe_text(metadata: &EnrichedMetadata) -> String {
    format!(
        "{}. Tone: {}. Pacing: {}.",
        metadata.vibes.join(", "),
        metadata.tone,
        metadata.pacing
    )
}

/// Text embedded as the content vector: the logline, falling back to the
/// item's own overview, falling back to the bare title
fn content_text(item: &CatalogItem, metadata: &EnrichedMetadata) -> String {
    metadata
        .profile
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if item.overview.trim().is_empty() {
                item.title.clone()
            } else {
                item.overview.clone()
            }
        })
}

/// Text embedded as the metadata vector: filled narrative slots, themes, and
/// the categorical facts
fn metadata_text(item: &CatalogItem, metadata: &EnrichedMetadata) -> String {
    let slots = &metadata.slots;
    let mut parts: Vec<String> = Vec::new();
    for (label, value) in [
        ("Setting", &slots.setting_place),
        ("Era", &slots.setting_time),
        ("Protagonist", &slots.protagonist),
        ("Goal", &slots.goal),
        ("Obstacle", &slots.obstacle),
        ("Stakes", &slots.stakes),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            parts.push(format!("{}: {}", label, v));
        }
    }
    if !metadata.themes.is_empty() {
        parts.push(format!("Themes: {}", metadata.themes.join(", ")));
    }
    if !item.genres.is_empty() {
        parts.push(format!("Genres: {}", item.genres.join(", ")));
    }
    parts.push(format!("Title: {} ({})", item.title, item.kind.as_str()));
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, NarrativeSlots};

    fn item() -> CatalogItem {
        CatalogItem {
            id: 5,
            kind: ItemKind::Movie,
            title: "Dust and Echoes".to_string(),
            overview: "A bounty hunter crosses the desert.".to_string(),
            release_year: Some(1971),
            genres: vec!["Western".to_string()],
            keywords: vec![],
            cast_names: vec![],
            popularity: 2.0,
        }
    }

    fn metadata() -> EnrichedMetadata {
        EnrichedMetadata {
            slots: NarrativeSlots {
                setting_place: Some("the Sonoran desert".to_string()),
                protagonist: Some("a weary bounty hunter".to_string()),
                ..Default::default()
            },
            themes: vec!["pursuit".to_string()],
            vibes: vec!["dusty plains".to_string(), "sun-bleached menace".to_string()],
            tone: "retro rugged".to_string(),
            pacing: "contemplative".to_string(),
            profile: Some("A bounty hunter chases a ghost across the border.".to_string()),
            source_url: None,
        }
    }

    #[test]
    fn test_vibe_text_combines_descriptors() {
        let text = vibe_text(&metadata());
        assert!(text.contains("dusty plains"));
        assert!(text.contains("Tone: retro rugged"));
        assert!(text.contains("Pacing: contemplative"));
    }

    #[test]
    fn test_content_text_prefers_profile() {
        assert!(content_text(&item(), &metadata()).starts_with("A bounty hunter chases"));

        let mut m = metadata();
        m.profile = None;
        assert_eq!(content_text(&item(), &m), "A bounty hunter crosses the desert.");

        let mut bare = item();
        bare.overview = String::new();
        assert_eq!(content_text(&bare, &m), "Dust and Echoes");
    }

    #[test]
    fn test_metadata_text_skips_empty_slots() {
        let text = metadata_text(&item(), &metadata());
        assert!(text.contains("Setting: the Sonoran desert"));
        assert!(text.contains("Protagonist: a weary bounty hunter"));
        assert!(text.contains("Themes: pursuit"));
        assert!(text.contains("Genres: Western"));
        assert!(!text.contains("Goal:"));
    }
}
