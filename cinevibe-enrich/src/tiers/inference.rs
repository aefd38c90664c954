// Tier 3: Structured inference from categorical facts
//
// When no free text qualifies, a distinct prompt infers metadata purely from
// categorical facts (genres, keywords, short synopsis, cast names). The
// prompt combines facts into compound descriptors rather than copying bare
// genre names; the gate enforces that downstream.
//
// Skipped entirely when the item has no genres, no keywords, and no synopsis:
// prompting on nothing would only hallucinate.

use crate::error::{EnrichError, EnrichResult};
use crate::limiter::ServiceLimiter;
use crate::providers::StructuredInferenceExtractor;
use crate::quality::QualityGate;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::tiers::{ExtractionTier, SkipReason, TierAttempt};
use crate::types::{CatalogItem, EnrichmentMethod, ExtractionResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct InferenceTier {
    extractor: Arc<dyn StructuredInferenceExtractor>,
    gate: QualityGate,
    llm_limiter: Arc<ServiceLimiter>,
    retry: RetryPolicy,
}

impl InferenceTier {
    pub fn new(
        extractor: Arc<dyn StructuredInferenceExtractor>,
        gate: QualityGate,
        llm_limiter: Arc<ServiceLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            extractor,
            gate,
            llm_limiter,
            retry,
        }
    }
}

#[async_trait]
impl ExtractionTier for InferenceTier {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Inference
    }

    async fn attempt(&self, item: &CatalogItem) -> EnrichResult<TierAttempt> {
        if item.has_no_signal() {
            tracing::debug!(
                item_id = item.id,
                title = %item.title,
                "No categorical signal, skipping inference tier without an LLM call"
            );
            return Ok(TierAttempt::Skipped(SkipReason::NoSignal));
        }

        let facts = item.facts();
        let metadata = retry_with_backoff(
            "structured_inference",
            self.retry,
            Some(&self.llm_limiter),
            || self.extractor.infer(&facts),
        )
        .await
        .map_err(EnrichError::Extraction)?;

        if !self.gate.is_accepted(&metadata, &item.genres) {
            tracing::debug!(
                item_id = item.id,
                vibes = metadata.vibes.len(),
                "Inference-tier result rejected by quality gate"
            );
            return Ok(TierAttempt::Skipped(SkipReason::GateRejected));
        }

        tracing::info!(item_id = item.id, title = %item.title, "Inference tier accepted");

        Ok(TierAttempt::Accepted(ExtractionResult {
            method: self.method(),
            metadata,
        }))
    }
}
