// Ordered extraction tiers
//
// Each tier is an independent module with a single purpose and an explicit
// contract: given one catalog item, either produce a complete, gate-accepted
// ExtractionResult, decline with a skip reason, or fail with a typed error.
// The fallback chain in extractor.rs composes them first-success-wins.
//
// Tier order: content -> overview -> inference -> defaults (terminal).

use crate::error::EnrichResult;
use crate::types::{CatalogItem, EnrichmentMethod, ExtractionResult};
use async_trait::async_trait;

pub mod content;
pub mod defaults;
pub mod inference;
pub mod overview;

pub use content::ContentTier;
pub use defaults::DefaultsTier;
pub use inference::InferenceTier;
pub use overview::OverviewTier;

/// Why a tier declined without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The external source had nothing for this title
    NoContent,
    /// Source text exists but is below the tier's length threshold
    TooShort,
    /// Extraction ran but the quality gate rejected the result
    GateRejected,
    /// No genres, keywords, or overview: insufficient signal to prompt on
    NoSignal,
}

/// Outcome of one tier attempt
#[derive(Debug, Clone)]
pub enum TierAttempt {
    /// Complete, gate-accepted result; the chain stops here
    Accepted(ExtractionResult),
    /// Preconditions unmet or result rejected; the chain continues
    Skipped(SkipReason),
}

/// One strategy in the ordered fallback chain
#[async_trait]
pub trait ExtractionTier: Send + Sync {
    /// Method tag recorded when this tier's result is accepted
    fn method(&self) -> EnrichmentMethod;

    /// Try to produce a complete metadata bundle for the item.
    ///
    /// # Returns
    /// * `Ok(TierAttempt::Accepted(_))`: gate-accepted result, chain stops
    /// * `Ok(TierAttempt::Skipped(_))`: fall through to the next tier
    /// * `Err(_)`: external call failed after retries; logged as a failure
    ///   and treated as fallthrough by the chain (fatal only for the
    ///   terminal tier)
    async fn attempt(&self, item: &CatalogItem) -> EnrichResult<TierAttempt>;
}
