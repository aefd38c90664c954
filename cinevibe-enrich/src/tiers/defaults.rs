// Tier 4: Deterministic genre/era defaults (terminal)
//
// A pure lookup over a static genre -> {vibes, tone, pacing} table, modulated
// by era (older titles get nostalgic tone framings) and by kind (series
// pacing defaults to "episodic"). This tier never calls an external service
// and never fails; it is the terminal branch of the fallback chain and always
// accepts.

use crate::error::EnrichResult;
use crate::tiers::{ExtractionTier, TierAttempt};
use crate::types::{CatalogItem, EnrichedMetadata, EnrichmentMethod, ExtractionResult, ItemKind};
use async_trait::async_trait;
use std::collections::HashMap;

/// Default descriptors for one genre
#[derive(Debug, Clone)]
struct GenreDefaults {
    vibes: &'static [&'static str],
    tone: &'static str,
    pacing: &'static str,
}

/// Maximum vibes collected when an item spans several known genres
const MAX_DEFAULT_VIBES: usize = 4;

/// Deterministic defaults tier
pub struct DefaultsTier {
    mappings: HashMap<&'static str, GenreDefaults>,
}

impl Default for DefaultsTier {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultsTier {
    pub fn new() -> Self {
        Self {
            mappings: Self::build_genre_table(),
        }
    }

    /// Pure lookup: non-empty vibes, tone, and pacing for every input,
    /// including an empty genre list.
    pub fn defaults_for(
        &self,
        kind: ItemKind,
        genres: &[String],
        release_year: Option<i32>,
    ) -> EnrichedMetadata {
        let mut vibes: Vec<String> = Vec::new();
        let mut tone: Option<&'static str> = None;
        let mut pacing: Option<&'static str> = None;

        for genre in genres {
            let key = genre.trim().to_lowercase();
            let Some(entry) = self.mappings.get(key.as_str()) else {
                tracing::debug!(genre = %genre, "No default mapping for genre");
                continue;
            };
            // First recognized genre sets tone and pacing
            if tone.is_none() {
                tone = Some(entry.tone);
                pacing = Some(entry.pacing);
            }
            for vibe in entry.vibes {
                if vibes.len() >= MAX_DEFAULT_VIBES {
                    break;
                }
                if !vibes.iter().any(|v| v == vibe) {
                    vibes.push((*vibe).to_string());
                }
            }
        }

        let fallback = Self::fallback_defaults();
        if vibes.is_empty() {
            vibes = fallback.vibes.iter().map(|v| (*v).to_string()).collect();
        }
        let tone = tone.unwrap_or(fallback.tone);
        let pacing = pacing.unwrap_or(fallback.pacing);

        let tone = Self::apply_era(tone, release_year);
        let pacing = match kind {
            ItemKind::Series => "episodic".to_string(),
            ItemKind::Movie => pacing.to_string(),
        };

        EnrichedMetadata {
            vibes,
            tone,
            pacing,
            ..Default::default()
        }
    }

    /// Era modulation: older titles shift the tone toward nostalgic framings
    fn apply_era(tone: &str, release_year: Option<i32>) -> String {
        match release_year {
            Some(year) if year < 1960 => format!("classic {}", tone),
            Some(year) if year < 1980 => format!("retro {}", tone),
            Some(year) if year < 2000 => format!("nostalgic {}", tone),
            _ => tone.to_string(),
        }
    }

    /// Defaults for an empty or fully unknown genre list
    fn fallback_defaults() -> GenreDefaults {
        GenreDefaults {
            vibes: &["understated mood", "quiet character moments"],
            tone: "balanced",
            pacing: "steady",
        }
    }

    /// Static genre table (19 primary genres + 3 aliases)
    ///
    /// Vibes are deliberately compound/atmospheric so tier-4 output never
    /// collides with the generic-vibe rejection list.
    fn build_genre_table() -> HashMap<&'static str, GenreDefaults> {
        let mut map = HashMap::new();

        map.insert("western", GenreDefaults {
            vibes: &["Western frontier", "dusty plains"],
            tone: "rugged",
            pacing: "contemplative",
        });
        map.insert("horror", GenreDefaults {
            vibes: &["creeping dread", "shadowy menace"],
            tone: "ominous",
            pacing: "slow-burn",
        });
        map.insert("comedy", GenreDefaults {
            vibes: &["lighthearted mischief", "quick-witted banter"],
            tone: "playful",
            pacing: "brisk",
        });
        map.insert("drama", GenreDefaults {
            vibes: &["intimate character study", "emotional undercurrent"],
            tone: "earnest",
            pacing: "measured",
        });
        map.insert("action", GenreDefaults {
            vibes: &["high-octane set pieces", "relentless momentum"],
            tone: "adrenalized",
            pacing: "breakneck",
        });
        map.insert("thriller", GenreDefaults {
            vibes: &["coiled tension", "cat-and-mouse paranoia"],
            tone: "tense",
            pacing: "propulsive",
        });
        map.insert("romance", GenreDefaults {
            vibes: &["longing glances", "tender intimacy"],
            tone: "warm",
            pacing: "unhurried",
        });
        map.insert("science fiction", GenreDefaults {
            vibes: &["speculative wonder", "cold futurism"],
            tone: "cerebral",
            pacing: "deliberate",
        });
        map.insert("fantasy", GenreDefaults {
            vibes: &["mythic grandeur", "enchanted realms"],
            tone: "wondrous",
            pacing: "sweeping",
        });
        map.insert("documentary", GenreDefaults {
            vibes: &["observational candor", "archival texture"],
            tone: "sober",
            pacing: "methodical",
        });
        map.insert("animation", GenreDefaults {
            vibes: &["vivid whimsy", "boundless imagination"],
            tone: "buoyant",
            pacing: "lively",
        });
        map.insert("crime", GenreDefaults {
            vibes: &["urban underworld", "moral rot"],
            tone: "hard-boiled",
            pacing: "simmering",
        });
        map.insert("mystery", GenreDefaults {
            vibes: &["slowly unravelling secrets", "fog-bound intrigue"],
            tone: "enigmatic",
            pacing: "deliberate",
        });
        map.insert("war", GenreDefaults {
            vibes: &["battlefield chaos", "brotherhood under fire"],
            tone: "grim",
            pacing: "relentless",
        });
        map.insert("musical", GenreDefaults {
            vibes: &["show-stopping numbers", "backstage glamour"],
            tone: "exuberant",
            pacing: "buoyant",
        });
        map.insert("adventure", GenreDefaults {
            vibes: &["far-flung escapades", "restless wanderlust"],
            tone: "spirited",
            pacing: "rollicking",
        });
        map.insert("family", GenreDefaults {
            vibes: &["gentle warmth", "homespun charm"],
            tone: "wholesome",
            pacing: "easygoing",
        });
        map.insert("history", GenreDefaults {
            vibes: &["period authenticity", "sweep of great events"],
            tone: "stately",
            pacing: "measured",
        });
        map.insert("film-noir", GenreDefaults {
            vibes: &["rain-slicked streets", "long shadows and cigarette smoke"],
            tone: "cynical",
            pacing: "smoldering",
        });

        // Aliases
        map.insert("sci-fi", map["science fiction"].clone());
        map.insert("scifi", map["science fiction"].clone());
        map.insert("noir", map["film-noir"].clone());

        map
    }
}

#[async_trait]
impl ExtractionTier for DefaultsTier {
    fn method(&self) -> EnrichmentMethod {
        EnrichmentMethod::Defaults
    }

    async fn attempt(&self, item: &CatalogItem) -> EnrichResult<TierAttempt> {
        let metadata = self.defaults_for(item.kind, &item.genres, item.release_year);

        tracing::info!(
            item_id = item.id,
            title = %item.title,
            "Defaults tier applied (terminal)"
        );

        Ok(TierAttempt::Accepted(ExtractionResult {
            method: self.method(),
            metadata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_western_defaults() {
        let tier = DefaultsTier::new();
        let m = tier.defaults_for(ItemKind::Movie, &genres(&["Western"]), None);
        assert_eq!(m.vibes, vec!["Western frontier", "dusty plains"]);
        assert_eq!(m.tone, "rugged");
        assert_eq!(m.pacing, "contemplative");
    }

    #[test]
    fn test_empty_genres_still_non_empty() {
        let tier = DefaultsTier::new();
        let m = tier.defaults_for(ItemKind::Movie, &[], None);
        assert!(!m.vibes.is_empty());
        assert!(!m.tone.is_empty());
        assert!(!m.pacing.is_empty());
    }

    #[test]
    fn test_unknown_genres_fall_back() {
        let tier = DefaultsTier::new();
        let m = tier.defaults_for(ItemKind::Movie, &genres(&["Mumblecore", "Giallo"]), None);
        assert!(!m.vibes.is_empty());
        assert_eq!(m.tone, "balanced");
    }

    #[test]
    fn test_never_fails_across_kind_genre_grid() {
        let tier = DefaultsTier::new();
        let genre_lists: Vec<Vec<String>> = vec![
            vec![],
            genres(&["Horror"]),
            genres(&["Horror", "Comedy"]),
            genres(&["Sci-Fi", "Unknown Genre"]),
            genres(&["westERN"]),
        ];
        for kind in [ItemKind::Movie, ItemKind::Series] {
            for list in &genre_lists {
                for year in [None, Some(1940), Some(1972), Some(1995), Some(2021)] {
                    let m = tier.defaults_for(kind, list, year);
                    assert!(!m.vibes.is_empty(), "vibes empty for {:?}/{:?}", kind, list);
                    assert!(!m.tone.is_empty());
                    assert!(!m.pacing.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_series_pacing_is_episodic() {
        let tier = DefaultsTier::new();
        let m = tier.defaults_for(ItemKind::Series, &genres(&["Drama"]), None);
        assert_eq!(m.pacing, "episodic");
    }

    #[test]
    fn test_era_modulation() {
        let tier = DefaultsTier::new();
        let pre60 = tier.defaults_for(ItemKind::Movie, &genres(&["Western"]), Some(1948));
        assert_eq!(pre60.tone, "classic rugged");

        let seventies = tier.defaults_for(ItemKind::Movie, &genres(&["Western"]), Some(1971));
        assert_eq!(seventies.tone, "retro rugged");

        let nineties = tier.defaults_for(ItemKind::Movie, &genres(&["Western"]), Some(1992));
        assert_eq!(nineties.tone, "nostalgic rugged");

        let modern = tier.defaults_for(ItemKind::Movie, &genres(&["Western"]), Some(2015));
        assert_eq!(modern.tone, "rugged");
    }

    #[test]
    fn test_multi_genre_merges_vibes_caps_at_four() {
        let tier = DefaultsTier::new();
        let m = tier.defaults_for(
            ItemKind::Movie,
            &genres(&["Horror", "Comedy", "Western"]),
            None,
        );
        assert_eq!(m.vibes.len(), 4);
        // Tone and pacing come from the first recognized genre
        assert_eq!(m.tone, "ominous");
        assert_eq!(m.pacing, "slow-burn");
    }

    #[tokio::test]
    async fn test_tier_always_accepts() {
        let tier = DefaultsTier::new();
        let item = CatalogItem {
            id: 9,
            kind: ItemKind::Movie,
            title: "Signal-free".to_string(),
            overview: String::new(),
            release_year: None,
            genres: vec![],
            keywords: vec![],
            cast_names: vec![],
            popularity: 0.0,
        };
        let attempt = tier.attempt(&item).await.unwrap();
        match attempt {
            TierAttempt::Accepted(result) => {
                assert_eq!(result.method, EnrichmentMethod::Defaults);
                assert!(!result.metadata.vibes.is_empty());
            }
            TierAttempt::Skipped(reason) => panic!("defaults tier skipped: {:?}", reason),
        }
    }
}
