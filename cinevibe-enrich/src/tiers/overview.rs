// Tier 2: Catalog overview
//
// Runs the same free-text extractor over the item's own short synopsis when
// it clears a lower length threshold. No external content fetch; the only
// network call is the LLM extraction itself.

use crate::error::{EnrichError, EnrichResult};
use crate::limiter::ServiceLimiter;
use crate::providers::FreeTextExtractor;
use crate::quality::QualityGate;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::tiers::{ExtractionTier, SkipReason, TierAttempt};
use crate::types::{CatalogItem, EnrichmentMethod, ExtractionResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct OverviewTier {
    extractor: Arc<dyn FreeTextExtractor>,
    gate: QualityGate,
    llm_limiter: Arc<ServiceLimiter>,
    retry: RetryPolicy,
    min_overview_chars: usize,
}

impl OverviewTier {
    pub fn new(
        extractor: Arc<dyn FreeTextExtractor>,
        gate: QualityGate,
        llm_limiter: Arc<ServiceLimiter>,
        retry: RetryPolicy,
        min_overview_chars: usize,
    ) -> Self {
        Self {
            extractor,
            gate,
            llm_limiter,
            retry,
            min_overview_chars,
        }
    }
}

#[async_trait]
impl ExtractionTier for OverviewTier {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Overview
    }

    async fn attempt(&self, item: &CatalogItem) -> EnrichResult<TierAttempt> {
        let overview = item.overview.trim();
        if overview.chars().count() < self.min_overview_chars {
            tracing::debug!(
                item_id = item.id,
                length = overview.chars().count(),
                min = self.min_overview_chars,
                "Overview below minimum length"
            );
            return Ok(TierAttempt::Skipped(SkipReason::TooShort));
        }

        let facts = item.facts();
        let metadata = retry_with_backoff(
            "free_text_extract",
            self.retry,
            Some(&self.llm_limiter),
            || self.extractor.extract(overview, &facts),
        )
        .await
        .map_err(EnrichError::Extraction)?;

        if !self.gate.is_accepted(&metadata, &item.genres) {
            tracing::debug!(
                item_id = item.id,
                vibes = metadata.vibes.len(),
                "Overview-tier result rejected by quality gate"
            );
            return Ok(TierAttempt::Skipped(SkipReason::GateRejected));
        }

        tracing::info!(item_id = item.id, title = %item.title, "Overview tier accepted");

        Ok(TierAttempt::Accepted(ExtractionResult {
            method: self.method(),
            metadata,
        }))
    }
}
