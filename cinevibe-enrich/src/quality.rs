// Quality gate and composite quality scoring
//
// Two related but distinct functions:
// - QualityGate: the cheap boolean acceptance check run inline after each
//   tier's extraction.
// - QualityScorer: the weighted 0-100 composite used offline for batch
//   auditing and re-enrichment targeting.

use crate::types::EnrichedMetadata;
use cinevibe_common::config::EnrichmentSettings;

/// Inline acceptance predicate for tier output
///
/// Rejection reasons, in check order:
/// 1. fewer vibes than the configured minimum
/// 2. empty tone
/// 3. every vibe, case-insensitively, is either one of the item's own genre
///    names or a member of the configured generic-vibe list; such a result
///    adds nothing over the raw genre column
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_vibes: usize,
    generic_vibes: Vec<String>,
}

impl QualityGate {
    pub fn new(settings: &EnrichmentSettings) -> Self {
        Self {
            min_vibes: settings.min_vibes,
            generic_vibes: settings
                .generic_vibes
                .iter()
                .map(|v| v.to_lowercase())
                .collect(),
        }
    }

    /// Accept or reject one tier's metadata for an item with `genres`
    pub fn is_accepted(&self, metadata: &EnrichedMetadata, genres: &[String]) -> bool {
        if metadata.vibes.len() < self.min_vibes {
            return false;
        }
        if metadata.tone.trim().is_empty() {
            return false;
        }

        let genres_lower: Vec<String> = genres.iter().map(|g| g.to_lowercase()).collect();
        let all_derivative = metadata.vibes.iter().all(|vibe| {
            let v = vibe.trim().to_lowercase();
            genres_lower.contains(&v) || self.generic_vibes.contains(&v)
        });

        !all_derivative
    }
}

/// Categorical quality tier derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Weights for the composite score
///
/// Every contribution is non-negative and count tiers are non-decreasing in
/// the count, so adding any missing signal never lowers the score.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Per filled narrative slot (6 slots)
    pub per_slot: f64,
    /// Theme count credit: [1 theme, 2 themes, >=3 themes]
    pub theme_tiers: [f64; 3],
    /// Vibe count credit: same shape as themes
    pub vibe_tiers: [f64; 3],
    pub tone_present: f64,
    pub pacing_present: f64,
    pub profile_present: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            per_slot: 5.0,               // 30 max
            theme_tiers: [6.0, 12.0, 20.0],
            vibe_tiers: [6.0, 12.0, 20.0],
            tone_present: 10.0,
            pacing_present: 10.0,
            profile_present: 10.0,       // 100 total
        }
    }
}

/// Composite 0-100 quality scorer (batch audit weight function)
#[derive(Debug, Clone)]
pub struct QualityScorer {
    weights: ScoreWeights,
    fair: f64,
    good: f64,
    excellent: f64,
}

impl QualityScorer {
    pub fn new(settings: &EnrichmentSettings) -> Self {
        Self {
            weights: ScoreWeights::default(),
            fair: settings.score_fair,
            good: settings.score_good,
            excellent: settings.score_excellent,
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Weighted composite score in [0, 100]
    pub fn score(&self, metadata: &EnrichedMetadata) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        score += w.per_slot * metadata.slots.filled_count() as f64;
        score += Self::count_tier_credit(&w.theme_tiers, metadata.themes.len());
        score += Self::count_tier_credit(&w.vibe_tiers, metadata.vibes.len());

        if !metadata.tone.trim().is_empty() {
            score += w.tone_present;
        }
        if !metadata.pacing.trim().is_empty() {
            score += w.pacing_present;
        }
        if metadata
            .profile
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
        {
            score += w.profile_present;
        }

        score.clamp(0.0, 100.0)
    }

    /// Categorical tier from the three ascending configured thresholds
    pub fn tier(&self, score: f64) -> QualityTier {
        if score >= self.excellent {
            QualityTier::Excellent
        } else if score >= self.good {
            QualityTier::Good
        } else if score >= self.fair {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }

    /// Credit for a count: full at >=3, partial at 2, minimal at 1, zero at 0
    fn count_tier_credit(tiers: &[f64; 3], count: usize) -> f64 {
        match count {
            0 => 0.0,
            1 => tiers[0],
            2 => tiers[1],
            _ => tiers[2],
        }
    }
}
