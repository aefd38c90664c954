// Shared Types and Data Contracts
//
// This module defines the explicit data contracts between the enrichment
// tiers, the quality gate, the batch coordinator, and the storage layer.
// Each type represents a well-defined interface between independent modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog Items
// ============================================================================

/// Catalog entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Movie,
    Series,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            _ => None,
        }
    }
}

/// One catalog record as fetched from storage
///
/// Raw source fields are written by the ingestion tooling and read-only here;
/// the enrichment result columns are written only by the atomic commit.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: ItemKind,
    pub title: String,
    pub overview: String,
    pub release_year: Option<i32>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
    pub cast_names: Vec<String>,
    pub popularity: f64,
}

impl CatalogItem {
    /// Categorical facts passed to the extraction prompts
    pub fn facts(&self) -> ItemFacts {
        ItemFacts {
            title: self.title.clone(),
            kind: self.kind,
            release_year: self.release_year,
            genres: self.genres.clone(),
            keywords: self.keywords.clone(),
            cast_names: self.cast_names.clone(),
            overview: self.overview.clone(),
        }
    }

    /// True when the item carries no categorical signal at all
    /// (no genres, no keywords, no overview)
    pub fn has_no_signal(&self) -> bool {
        self.genres.is_empty() && self.keywords.is_empty() && self.overview.trim().is_empty()
    }
}

/// Categorical facts about an item (extraction prompt input)
#[derive(Debug, Clone, Serialize)]
pub struct ItemFacts {
    pub title: String,
    pub kind: ItemKind,
    pub release_year: Option<i32>,
    pub genres: Vec<String>,
    pub keywords: Vec<String>,
    pub cast_names: Vec<String>,
    pub overview: String,
}

// ============================================================================
// Enrichment Output
// ============================================================================

/// Six fixed narrative slots
///
/// Each slot is optional; a tier fills what the source text supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSlots {
    pub setting_place: Option<String>,
    pub setting_time: Option<String>,
    pub protagonist: Option<String>,
    pub goal: Option<String>,
    pub obstacle: Option<String>,
    pub stakes: Option<String>,
}

impl NarrativeSlots {
    /// Number of filled slots (of 6)
    pub fn filled_count(&self) -> usize {
        [
            &self.setting_place,
            &self.setting_time,
            &self.protagonist,
            &self.goal,
            &self.obstacle,
            &self.stakes,
        ]
        .iter()
        .filter(|s| s.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count()
    }
}

/// Complete derived metadata bundle for one item
///
/// Never stored partially filled: either a tier's full output passes the
/// quality gate and the whole bundle is committed, or it is discarded and the
/// next tier runs. Fields are never a blend of two tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMetadata {
    pub slots: NarrativeSlots,
    pub themes: Vec<String>,
    pub vibes: Vec<String>,
    pub tone: String,
    pub pacing: String,
    /// One-sentence logline
    pub profile: Option<String>,
    /// Provenance of sourced long-form text (tier 1 only)
    pub source_url: Option<String>,
}

/// Which tier produced the accepted result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMethod {
    /// Tier 1: sourced long-form content
    Content,
    /// Tier 2: the item's own overview
    Overview,
    /// Tier 3: structured inference from categorical facts
    Inference,
    /// Tier 4: deterministic genre/era defaults
    Defaults,
    /// All tiers exhausted with a terminal failure
    Error,
}

impl EnrichmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Overview => "overview",
            Self::Inference => "inference",
            Self::Defaults => "defaults",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "overview" => Some(Self::Overview),
            "inference" => Some(Self::Inference),
            "defaults" => Some(Self::Defaults),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Accepted output of the tier fallback chain
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub method: EnrichmentMethod,
    pub metadata: EnrichedMetadata,
}

// ============================================================================
// Embeddings
// ============================================================================

/// Which of the three companion vectors is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingKind {
    Vibe,
    Content,
    Metadata,
}

impl EmbeddingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vibe => "vibe",
            Self::Content => "content",
            Self::Metadata => "metadata",
        }
    }
}

/// The three companion vectors for one item
///
/// Any `None` signals a per-item provider failure; the commit is all-or-
/// nothing, so a partial bundle blocks the metadata write as well.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBundle {
    pub vibe: Option<Vec<f32>>,
    pub content: Option<Vec<f32>>,
    pub metadata: Option<Vec<f32>>,
}

impl EmbeddingBundle {
    pub fn is_complete(&self) -> bool {
        self.vibe.is_some() && self.content.is_some() && self.metadata.is_some()
    }

    /// Names of the missing vectors, for failure messages
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.vibe.is_none() {
            out.push("vibe");
        }
        if self.content.is_none() {
            out.push("content");
        }
        if self.metadata.is_none() {
            out.push("metadata");
        }
        out
    }
}

// ============================================================================
// Failure & Checkpoint Records
// ============================================================================

/// Durable record of one (item, phase) failure
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub id: Uuid,
    pub item_id: i64,
    pub phase: String,
    pub error_kind: String,
    pub message: String,
    pub retry_count: u32,
    pub resolved: bool,
    pub last_attempt_at: DateTime<Utc>,
}

/// Durable per-phase progress state
#[derive(Debug, Clone)]
pub struct CheckpointState {
    pub phase: String,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Resume cursor: every item counted exactly once across runs
    pub processed_ids: Vec<i64>,
    pub last_item_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter; bumped on every persisted mutation
    pub version: i64,
}

impl CheckpointState {
    pub fn new(phase: &str, total: u64) -> Self {
        let now = Utc::now();
        Self {
            phase: phase.to_string(),
            total,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            processed_ids: Vec::new(),
            last_item_id: None,
            started_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed() as f64 / self.total as f64) * 100.0
    }

    /// Estimated completion: elapsed ÷ processed × remaining
    pub fn estimated_remaining(&self) -> Option<chrono::Duration> {
        let processed = self.processed();
        if processed == 0 || self.total <= processed {
            return None;
        }
        let elapsed = self.updated_at - self.started_at;
        let remaining = self.total - processed;
        let per_item_ms = elapsed.num_milliseconds() as f64 / processed as f64;
        Some(chrono::Duration::milliseconds(
            (per_item_ms * remaining as f64) as i64,
        ))
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// End-of-run accounting printed to the operator
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub by_method: std::collections::HashMap<EnrichmentMethod, u64>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn record_method(&mut self, method: EnrichmentMethod) {
        *self.by_method.entry(method).or_insert(0) += 1;
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}: {} items ({} succeeded, {} failed, {} skipped)",
            if self.dry_run { "Dry run" } else { "Run" },
            self.total,
            self.succeeded,
            self.failed,
            self.skipped
        )?;
        let mut methods: Vec<_> = self.by_method.iter().collect();
        methods.sort_by_key(|(m, _)| m.as_str());
        for (method, count) in methods {
            writeln!(f, "  {:>9}: {}", method.as_str(), count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in [
            EnrichmentMethod::Content,
            EnrichmentMethod::Overview,
            EnrichmentMethod::Inference,
            EnrichmentMethod::Defaults,
            EnrichmentMethod::Error,
        ] {
            assert_eq!(EnrichmentMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(EnrichmentMethod::parse("blend"), None);
    }

    #[test]
    fn test_filled_slot_count_ignores_blank_strings() {
        let slots = NarrativeSlots {
            protagonist: Some("a retired gunslinger".to_string()),
            goal: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(slots.filled_count(), 1);
    }

    #[test]
    fn test_no_signal_detection() {
        let mut item = CatalogItem {
            id: 1,
            kind: ItemKind::Movie,
            title: "Untitled".to_string(),
            overview: String::new(),
            release_year: None,
            genres: vec![],
            keywords: vec![],
            cast_names: vec![],
            popularity: 0.0,
        };
        assert!(item.has_no_signal());

        item.genres.push("Western".to_string());
        assert!(!item.has_no_signal());
    }

    #[test]
    fn test_bundle_missing_names() {
        let bundle = EmbeddingBundle {
            vibe: Some(vec![0.1]),
            content: None,
            metadata: None,
        };
        assert!(!bundle.is_complete());
        assert_eq!(bundle.missing(), vec!["content", "metadata"]);
    }

    #[test]
    fn test_checkpoint_progress_math() {
        let mut state = CheckpointState::new("enrich", 200);
        state.succeeded = 40;
        state.failed = 8;
        state.skipped = 2;
        assert_eq!(state.processed(), 50);
        assert!((state.progress_percent() - 25.0).abs() < f64::EPSILON);

        state.updated_at = state.started_at + chrono::Duration::seconds(100);
        // 50 items in 100s → 2s per item → 150 remaining → ~300s
        let eta = state.estimated_remaining().unwrap();
        assert_eq!(eta.num_seconds(), 300);
    }

    #[test]
    fn test_empty_checkpoint_has_no_eta() {
        let state = CheckpointState::new("enrich", 100);
        assert!(state.estimated_remaining().is_none());
    }
}
