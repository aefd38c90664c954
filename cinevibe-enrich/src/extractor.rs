// Tier fallback chain
//
// Composes the ordered extraction tiers first-success-wins: the first tier to
// return a gate-accepted result decides the item's method, and no later tier
// runs. Skips and errors from non-terminal tiers are recorded as failure rows
// and the chain falls through; an error from the terminal tier is the only
// way the chain itself fails.

use crate::error::{EnrichError, EnrichResult, ErrorKind};
use crate::failures::FailureStore;
use crate::tiers::{ExtractionTier, SkipReason, TierAttempt};
use crate::types::{CatalogItem, ExtractionResult};

/// Failure-record phase for everything that happens inside the chain
pub const EXTRACTION_PHASE: &str = "extraction";

pub struct TierFallbackExtractor {
    tiers: Vec<Box<dyn ExtractionTier>>,
    failures: FailureStore,
    /// Dry runs log skips and errors but write no failure rows
    dry_run: bool,
}

impl TierFallbackExtractor {
    /// Build a chain over the given tiers, in fallback order.
    ///
    /// The last tier is terminal: the chain relies on it accepting every item
    /// it reaches (or failing the item outright).
    pub fn new(tiers: Vec<Box<dyn ExtractionTier>>, failures: FailureStore, dry_run: bool) -> Self {
        Self {
            tiers,
            failures,
            dry_run,
        }
    }

    /// Run the chain for one item.
    ///
    /// Returns the first accepted result. Returns `Err` only when the
    /// terminal tier errors or skips; the caller records that item with the
    /// error method and moves on.
    pub async fn extract(&self, item: &CatalogItem) -> EnrichResult<ExtractionResult> {
        let last = self.tiers.len().saturating_sub(1);

        for (index, tier) in self.tiers.iter().enumerate() {
            let method = tier.method();
            match tier.attempt(item).await {
                Ok(TierAttempt::Accepted(result)) => {
                    tracing::debug!(
                        item_id = item.id,
                        method = method.as_str(),
                        "Tier accepted, chain stops"
                    );
                    return Ok(result);
                }
                Ok(TierAttempt::Skipped(reason)) => {
                    self.record_skip(item, method.as_str(), reason).await?;
                    if index == last {
                        // The terminal tier is expected to always accept;
                        // reaching here means the chain is misconfigured.
                        return Err(EnrichError::Extraction(
                            crate::error::ProviderError::Other(format!(
                                "terminal tier {} skipped item {}",
                                method.as_str(),
                                item.id
                            )),
                        ));
                    }
                }
                Err(err) => {
                    if !self.dry_run {
                        let kind = ErrorKind::from_enrich(&err);
                        self.failures
                            .record_failure(
                                item.id,
                                EXTRACTION_PHASE,
                                kind,
                                &format!("{} tier: {}", method.as_str(), err),
                            )
                            .await?;
                    }
                    if index == last {
                        tracing::warn!(
                            item_id = item.id,
                            title = %item.title,
                            error = %err,
                            "Terminal tier failed, item recorded as error"
                        );
                        return Err(err);
                    }
                    tracing::warn!(
                        item_id = item.id,
                        method = method.as_str(),
                        error = %err,
                        "Tier failed, falling through"
                    );
                }
            }
        }

        Err(EnrichError::Extraction(crate::error::ProviderError::Other(
            "empty tier chain".to_string(),
        )))
    }

    /// Skips worth a durable record: absent content and gate rejections are
    /// audit signal; absent categorical input is not. Dry runs record nothing.
    async fn record_skip(
        &self,
        item: &CatalogItem,
        tier: &str,
        reason: SkipReason,
    ) -> EnrichResult<()> {
        if self.dry_run {
            tracing::debug!(item_id = item.id, tier, ?reason, "Tier skipped");
            return Ok(());
        }
        let (kind, message) = match reason {
            SkipReason::NoContent => (
                ErrorKind::ContentNotFound,
                format!("{} tier: no source text found", tier),
            ),
            SkipReason::TooShort => (
                ErrorKind::LowQualityContent,
                format!("{} tier: source text below minimum length", tier),
            ),
            SkipReason::GateRejected => (
                ErrorKind::LowQualityContent,
                format!("{} tier: result rejected by quality gate", tier),
            ),
            SkipReason::NoSignal => return Ok(()),
        };
        self.failures
            .record_failure(item.id, EXTRACTION_PHASE, kind, &message)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::{EnrichedMetadata, EnrichmentMethod, ItemKind};
    use async_trait::async_trait;
    use sqlx::SqlitePool;

    struct FixedTier {
        method: EnrichmentMethod,
        outcome: fn() -> EnrichResult<TierAttempt>,
    }

    #[async_trait]
    impl ExtractionTier for FixedTier {
        fn method(&self) -> EnrichmentMethod {
            self.method
        }

        async fn attempt(&self, _item: &CatalogItem) -> EnrichResult<TierAttempt> {
            (self.outcome)()
        }
    }

    fn accepted(method: EnrichmentMethod) -> ExtractionResult {
        ExtractionResult {
            method,
            metadata: EnrichedMetadata {
                vibes: vec!["coiled tension".to_string(), "slow dread".to_string()],
                tone: "tense".to_string(),
                pacing: "deliberate".to_string(),
                ..Default::default()
            },
        }
    }

    fn item() -> CatalogItem {
        CatalogItem {
            id: 11,
            kind: ItemKind::Movie,
            title: "The Long Quiet".to_string(),
            overview: "A ranger tracks a poacher through winter forest.".to_string(),
            release_year: Some(2019),
            genres: vec!["Thriller".to_string()],
            keywords: vec![],
            cast_names: vec![],
            popularity: 3.2,
        }
    }

    async fn failures() -> FailureStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        cinevibe_common::db::init_tables(&pool).await.unwrap();
        FailureStore::new(pool)
    }

    #[tokio::test]
    async fn test_first_accepting_tier_wins() {
        let failures = failures().await;
        let chain = TierFallbackExtractor::new(
            vec![
                Box::new(FixedTier {
                    method: EnrichmentMethod::Content,
                    outcome: || Ok(TierAttempt::Skipped(SkipReason::NoContent)),
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Overview,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Overview))),
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Defaults,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Defaults))),
                }),
            ],
            failures.clone(),
            false,
        );

        let result = chain.extract(&item()).await.unwrap();
        assert_eq!(result.method, EnrichmentMethod::Overview);

        // The skip left an audit row
        let rows = failures.unresolved(EXTRACTION_PHASE).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].error_kind, "content_not_found");
    }

    #[tokio::test]
    async fn test_tier_error_falls_through() {
        let failures = failures().await;
        let chain = TierFallbackExtractor::new(
            vec![
                Box::new(FixedTier {
                    method: EnrichmentMethod::Content,
                    outcome: || {
                        Err(EnrichError::Extraction(ProviderError::Timeout {
                            service: "content".to_string(),
                        }))
                    },
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Defaults,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Defaults))),
                }),
            ],
            failures.clone(),
            false,
        );

        let result = chain.extract(&item()).await.unwrap();
        assert_eq!(result.method, EnrichmentMethod::Defaults);

        let rows = failures.unresolved(EXTRACTION_PHASE).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].error_kind, "timeout");
    }

    #[tokio::test]
    async fn test_terminal_tier_error_is_fatal_for_item() {
        let failures = failures().await;
        let chain = TierFallbackExtractor::new(
            vec![Box::new(FixedTier {
                method: EnrichmentMethod::Defaults,
                outcome: || {
                    Err(EnrichError::Extraction(ProviderError::Other(
                        "unreachable".to_string(),
                    )))
                },
            })],
            failures.clone(),
            false,
        );

        assert!(chain.extract(&item()).await.is_err());
        assert_eq!(failures.unresolved(EXTRACTION_PHASE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_signal_skip_leaves_no_record() {
        let failures = failures().await;
        let chain = TierFallbackExtractor::new(
            vec![
                Box::new(FixedTier {
                    method: EnrichmentMethod::Inference,
                    outcome: || Ok(TierAttempt::Skipped(SkipReason::NoSignal)),
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Defaults,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Defaults))),
                }),
            ],
            failures.clone(),
            false,
        );

        let result = chain.extract(&item()).await.unwrap();
        assert_eq!(result.method, EnrichmentMethod::Defaults);
        assert!(failures.unresolved(EXTRACTION_PHASE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_chain_writes_no_failure_rows() {
        let failures = failures().await;
        let chain = TierFallbackExtractor::new(
            vec![
                Box::new(FixedTier {
                    method: EnrichmentMethod::Content,
                    outcome: || Ok(TierAttempt::Skipped(SkipReason::NoContent)),
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Overview,
                    outcome: || {
                        Err(EnrichError::Extraction(ProviderError::Timeout {
                            service: "llm".to_string(),
                        }))
                    },
                }),
                Box::new(FixedTier {
                    method: EnrichmentMethod::Defaults,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Defaults))),
                }),
            ],
            failures.clone(),
            true,
        );

        // Skip and error both fell through as usual, but neither left a row
        let result = chain.extract(&item()).await.unwrap();
        assert_eq!(result.method, EnrichmentMethod::Defaults);
        assert!(failures.unresolved(EXTRACTION_PHASE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_later_tier_runs_after_acceptance() {
        // The second tier would panic if attempted
        struct PanicTier;

        #[async_trait]
        impl ExtractionTier for PanicTier {
            fn method(&self) -> EnrichmentMethod {
                EnrichmentMethod::Defaults
            }
            async fn attempt(&self, _item: &CatalogItem) -> EnrichResult<TierAttempt> {
                panic!("tier after acceptance must not run");
            }
        }

        let chain = TierFallbackExtractor::new(
            vec![
                Box::new(FixedTier {
                    method: EnrichmentMethod::Content,
                    outcome: || Ok(TierAttempt::Accepted(accepted(EnrichmentMethod::Content))),
                }),
                Box::new(PanicTier),
            ],
            failures().await,
            false,
        );

        let result = chain.extract(&item()).await.unwrap();
        assert_eq!(result.method, EnrichmentMethod::Content);
    }
}
