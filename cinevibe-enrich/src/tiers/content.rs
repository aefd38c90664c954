// Tier 1: Sourced long-form content
//
// Fetches descriptive text from the external content provider, requires it to
// meet the configured minimum length, runs the free-text extractor over it,
// and gates the result. On acceptance the source URL is recorded as
// provenance.

use crate::error::{EnrichError, EnrichResult};
use crate::limiter::ServiceLimiter;
use crate::providers::{ContentProvider, FreeTextExtractor};
use crate::quality::QualityGate;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::tiers::{ExtractionTier, SkipReason, TierAttempt};
use crate::types::{CatalogItem, EnrichmentMethod, ExtractionResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ContentTier {
    provider: Arc<dyn ContentProvider>,
    extractor: Arc<dyn FreeTextExtractor>,
    gate: QualityGate,
    content_limiter: Arc<ServiceLimiter>,
    llm_limiter: Arc<ServiceLimiter>,
    retry: RetryPolicy,
    min_content_chars: usize,
}

impl ContentTier {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        extractor: Arc<dyn FreeTextExtractor>,
        gate: QualityGate,
        content_limiter: Arc<ServiceLimiter>,
        llm_limiter: Arc<ServiceLimiter>,
        retry: RetryPolicy,
        min_content_chars: usize,
    ) -> Self {
        Self {
            provider,
            extractor,
            gate,
            content_limiter,
            llm_limiter,
            retry,
            min_content_chars,
        }
    }
}

#[async_trait]
impl ExtractionTier for ContentTier {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Content
    }

    async fn attempt(&self, item: &CatalogItem) -> EnrichResult<TierAttempt> {
        let document = retry_with_backoff(
            "content_fetch",
            self.retry,
            Some(&self.content_limiter),
            || self.provider.fetch(&item.title, item.release_year, item.kind),
        )
        .await
        .map_err(EnrichError::Extraction)?;

        let Some(text) = document.best_text() else {
            tracing::debug!(item_id = item.id, title = %item.title, "No sourced content found");
            return Ok(TierAttempt::Skipped(SkipReason::NoContent));
        };

        if text.chars().count() < self.min_content_chars {
            tracing::debug!(
                item_id = item.id,
                length = text.chars().count(),
                min = self.min_content_chars,
                "Sourced content below minimum length"
            );
            return Ok(TierAttempt::Skipped(SkipReason::TooShort));
        }

        let text = text.to_string();
        let facts = item.facts();
        let mut metadata = retry_with_backoff(
            "free_text_extract",
            self.retry,
            Some(&self.llm_limiter),
            || self.extractor.extract(&text, &facts),
        )
        .await
        .map_err(EnrichError::Extraction)?;

        if !self.gate.is_accepted(&metadata, &item.genres) {
            tracing::debug!(
                item_id = item.id,
                vibes = metadata.vibes.len(),
                "Content-tier result rejected by quality gate"
            );
            return Ok(TierAttempt::Skipped(SkipReason::GateRejected));
        }

        metadata.source_url = document.source_url.clone();

        tracing::info!(
            item_id = item.id,
            title = %item.title,
            source = document.source_url.as_deref().unwrap_or("unknown"),
            "Content tier accepted"
        );

        Ok(TierAttempt::Accepted(ExtractionResult {
            method: self.method(),
            metadata,
        }))
    }
}
