//! Error types for the enrichment core
//!
//! Two layers, deliberately distinct:
//!
//! - [`ProviderError`] is produced at each collaborator's own boundary, so
//!   failure classification is structural (a typed variant) rather than
//!   inferred from free-text messages or status-code string matching.
//! - [`EnrichError`] is the pipeline-level error; the stored
//!   [`ErrorKind`] taxonomy is derived from it for failure records.

use thiserror::Error;

/// Result type for enrichment operations
pub type EnrichResult<T> = std::result::Result<T, EnrichError>;

/// Typed failure produced by an external collaborator at its boundary
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Service signalled rate limiting (HTTP 429 or provider-specific)
    #[error("rate limited by {service}")]
    RateLimited { service: String },

    /// Request or connect timeout
    #[error("timeout talking to {service}")]
    Timeout { service: String },

    /// Resource genuinely absent (HTTP 404 where absence is exceptional)
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level failure (DNS, connect, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Response arrived but could not be parsed into the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Credentials rejected (HTTP 401)
    #[error("authentication failed for {service}")]
    Auth { service: String },

    /// Credentials valid but operation forbidden (HTTP 403)
    #[error("permission denied for {service}")]
    Permission { service: String },

    /// Anything the collaborator could not classify
    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) | Self::Other(_)
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Pipeline-level error
#[derive(Debug, Error)]
pub enum EnrichError {
    /// A tier's external call failed (after retries)
    #[error("extraction failed: {0}")]
    Extraction(#[source] ProviderError),

    /// Embedding generation failed or returned a partial bundle
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Storage write failed
    #[error("write failed: {0}")]
    Write(#[source] sqlx::Error),

    /// Storage read failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Checkpoint row was modified by another writer (stale version)
    #[error("checkpoint version conflict for phase '{0}'")]
    CheckpointConflict(String),

    /// Stored row could not be decoded
    #[error("corrupt stored data: {0}")]
    Decode(String),

    /// Configuration or startup failure (fatal)
    #[error("configuration error: {0}")]
    Config(String),
}

/// Storable failure taxonomy
///
/// `LowQualityContent` is a gate rejection, not an exception; it never
/// surfaces as an `EnrichError` but is recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ContentNotFound,
    LowQualityContent,
    ExtractionError,
    EmbeddingError,
    WriteError,
    RateLimit,
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentNotFound => "content_not_found",
            Self::LowQualityContent => "low_quality_content",
            Self::ExtractionError => "extraction_error",
            Self::EmbeddingError => "embedding_error",
            Self::WriteError => "write_error",
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Classify a provider error structurally
    pub fn from_provider(err: &ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { .. } => Self::RateLimit,
            ProviderError::Timeout { .. } => Self::Timeout,
            ProviderError::NotFound(_) => Self::ContentNotFound,
            ProviderError::Network(_)
            | ProviderError::Parse(_)
            | ProviderError::Auth { .. }
            | ProviderError::Permission { .. } => Self::ExtractionError,
            ProviderError::Other(_) => Self::Unknown,
        }
    }

    /// Classify a pipeline error for failure records
    pub fn from_enrich(err: &EnrichError) -> Self {
        match err {
            EnrichError::Extraction(p) => Self::from_provider(p),
            EnrichError::Embedding(_) => Self::EmbeddingError,
            EnrichError::Write(_) => Self::WriteError,
            EnrichError::Database(_) => Self::WriteError,
            EnrichError::CheckpointConflict(_) => Self::WriteError,
            EnrichError::Decode(_) => Self::Unknown,
            EnrichError::Config(_) => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        let err = ProviderError::RateLimited {
            service: "content".to_string(),
        };
        assert_eq!(ErrorKind::from_provider(&err), ErrorKind::RateLimit);
        assert!(err.is_retryable());
        assert!(err.is_rate_limit());

        let err = ProviderError::Auth {
            service: "llm".to_string(),
        };
        assert_eq!(ErrorKind::from_provider(&err), ErrorKind::ExtractionError);
        assert!(!err.is_retryable());

        let err = ProviderError::NotFound("no article".to_string());
        assert_eq!(ErrorKind::from_provider(&err), ErrorKind::ContentNotFound);
    }

    #[test]
    fn test_enrich_error_kinds() {
        let err = EnrichError::Embedding("vibe vector missing".to_string());
        assert_eq!(ErrorKind::from_enrich(&err), ErrorKind::EmbeddingError);

        let err = EnrichError::Extraction(ProviderError::Timeout {
            service: "content".to_string(),
        });
        assert_eq!(ErrorKind::from_enrich(&err), ErrorKind::Timeout);
    }

    #[test]
    fn test_kind_strings_are_stable() {
        // These strings are stored in failure rows; changing them breaks
        // existing databases.
        assert_eq!(ErrorKind::ContentNotFound.as_str(), "content_not_found");
        assert_eq!(ErrorKind::LowQualityContent.as_str(), "low_quality_content");
        assert_eq!(ErrorKind::EmbeddingError.as_str(), "embedding_error");
        assert_eq!(ErrorKind::RateLimit.as_str(), "rate_limit");
    }
}
