// External collaborator interfaces
//
// The enrichment core consumes four collaborators, specified here at their
// interface boundary. Each produces typed ProviderError values at its own
// boundary so the retry executor classifies failures structurally.
//
// Reference reqwest-backed implementations live in the submodules; tests
// substitute mocks.

use crate::error::ProviderError;
use crate::types::{EmbeddingKind, EnrichedMetadata, ItemFacts, ItemKind};
use async_trait::async_trait;

pub mod content;
pub mod embeddings;
pub mod llm;

pub use content::HttpContentProvider;
pub use embeddings::HttpEmbeddingProvider;
pub use llm::LlmExtractor;

/// Long-form descriptive text fetched for one title
///
/// Every field is optional: "not found" is an empty document, never an error.
#[derive(Debug, Clone, Default)]
pub struct ContentDocument {
    pub summary: Option<String>,
    pub plot: Option<String>,
    pub canonical_title: Option<String>,
    pub source_url: Option<String>,
}

impl ContentDocument {
    /// Best available long-form text: plot preferred over summary
    pub fn best_text(&self) -> Option<&str> {
        self.plot
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.summary.as_deref().filter(|t| !t.trim().is_empty()))
    }
}

/// External long-form content source (tier 1)
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetch descriptive text for a title; year and kind disambiguate.
    ///
    /// Returns an empty document when the title is unknown; absence is a
    /// normal outcome for this collaborator, not an error.
    async fn fetch(
        &self,
        title: &str,
        year: Option<i32>,
        kind: ItemKind,
    ) -> Result<ContentDocument, ProviderError>;
}

/// LLM extraction over free text (tiers 1 and 2)
#[async_trait]
pub trait FreeTextExtractor: Send + Sync {
    /// Extract slots/themes/vibes/tone/pacing from long-form text.
    ///
    /// # Errors
    /// Fails on malformed provider output (Parse) or transport issues.
    async fn extract(
        &self,
        text: &str,
        facts: &ItemFacts,
    ) -> Result<EnrichedMetadata, ProviderError>;
}

/// LLM inference from categorical facts alone (tier 3)
///
/// The prompt is instructed to combine categorical facts into compound
/// descriptors (e.g. "dark comedy") rather than copying bare genre names.
#[async_trait]
pub trait StructuredInferenceExtractor: Send + Sync {
    async fn infer(&self, facts: &ItemFacts) -> Result<EnrichedMetadata, ProviderError>;
}

/// Embedding vector source
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Produce one vector for one text.
    ///
    /// `Ok(None)` signals a per-item failure that must not fail the batch;
    /// the coordinator treats an incomplete bundle as an embedding error for
    /// that item only.
    async fn embed(
        &self,
        kind: EmbeddingKind,
        text: &str,
    ) -> Result<Option<Vec<f32>>, ProviderError>;
}

/// Map an HTTP error status to a typed provider error
pub(crate) fn status_error(service: &str, status: reqwest::StatusCode) -> ProviderError {
    use reqwest::StatusCode;
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            service: service.to_string(),
        },
        StatusCode::UNAUTHORIZED => ProviderError::Auth {
            service: service.to_string(),
        },
        StatusCode::FORBIDDEN => ProviderError::Permission {
            service: service.to_string(),
        },
        StatusCode::NOT_FOUND => ProviderError::NotFound(format!("{}: 404", service)),
        s if s.is_server_error() => {
            ProviderError::Network(format!("{}: server error {}", service, s))
        }
        s => ProviderError::Other(format!("{}: unexpected status {}", service, s)),
    }
}

/// Map a reqwest transport error to a typed provider error
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            service: service.to_string(),
        }
    } else if err.is_decode() {
        ProviderError::Parse(format!("{}: {}", service, err))
    } else {
        ProviderError::Network(format!("{}: {}", service, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_structural() {
        let err = status_error("content", reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(err.is_rate_limit());

        let err = status_error("llm", reqwest::StatusCode::UNAUTHORIZED);
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert!(!err.is_retryable());

        let err = status_error("llm", reqwest::StatusCode::BAD_GATEWAY);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_best_text_prefers_plot() {
        let doc = ContentDocument {
            summary: Some("short summary".to_string()),
            plot: Some("long plot".to_string()),
            ..Default::default()
        };
        assert_eq!(doc.best_text(), Some("long plot"));
    }

    #[test]
    fn test_best_text_skips_blank_plot() {
        let doc = ContentDocument {
            summary: Some("short summary".to_string()),
            plot: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(doc.best_text(), Some("short summary"));

        let empty = ContentDocument::default();
        assert_eq!(empty.best_text(), None);
    }
}
