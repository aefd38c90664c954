//! Configuration loading and data folder resolution
//!
//! Configuration is read from a TOML file and merged with compiled defaults.
//! The data folder (SQLite database location) is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CINEVIBE_DATA_DIR` environment variable
//! 3. `data_folder` key in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "CINEVIBE_DATA_DIR";

/// Top-level TOML configuration file contents
///
/// All fields are optional in the file; accessors fall back to defaults so a
/// missing or empty config file is always usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder containing the catalog database
    pub data_folder: Option<String>,

    /// External collaborator credentials and endpoints
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Enrichment tuning knobs (thresholds, generic-vibe list, chunking)
    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// Per-service rate limit settings, keyed by service name
    /// (e.g. "content", "llm", "embeddings")
    #[serde(default)]
    pub services: HashMap<String, ServiceRateSettings>,
}

/// External provider endpoints and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the long-form content source
    pub content_base_url: Option<String>,
    /// API key for the content source (if the endpoint requires one)
    pub content_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible LLM endpoint
    pub llm_base_url: Option<String>,
    /// API key for the LLM endpoint
    pub llm_api_key: Option<String>,
    /// Model name for extraction prompts
    pub llm_model: Option<String>,
    /// Base URL of the embeddings endpoint (defaults to the LLM endpoint)
    pub embedding_base_url: Option<String>,
    /// API key for the embeddings endpoint (defaults to the LLM key)
    pub embedding_api_key: Option<String>,
    /// Embedding model name
    pub embedding_model: Option<String>,
}

/// Tunable enrichment constants
///
/// These are empirically chosen values, deliberately configuration rather
/// than hardcoded: deployments tune them per catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Minimum character count for sourced long-form content (tier 1)
    pub min_content_chars: usize,
    /// Minimum character count for the item's own overview (tier 2)
    pub min_overview_chars: usize,
    /// Minimum number of vibes the quality gate accepts
    pub min_vibes: usize,
    /// Vibes considered too generic to carry signal on their own
    pub generic_vibes: Vec<String>,
    /// Number of items processed per chunk
    pub chunk_size: usize,
    /// Composite-score boundary for the "fair" tier
    pub score_fair: f64,
    /// Composite-score boundary for the "good" tier
    pub score_good: f64,
    /// Composite-score boundary for the "excellent" tier
    pub score_excellent: f64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            min_content_chars: 400,
            min_overview_chars: 100,
            min_vibes: 2,
            generic_vibes: vec![
                "action".to_string(),
                "drama".to_string(),
                "comedy".to_string(),
                "thriller".to_string(),
                "horror".to_string(),
                "romance".to_string(),
            ],
            chunk_size: 25,
            score_fair: 40.0,
            score_good: 65.0,
            score_excellent: 85.0,
        }
    }
}

/// Rate limit settings for one external service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRateSettings {
    /// Sustained request rate (token bucket refill)
    pub requests_per_second: u32,
    /// Baseline inter-request delay applied after each acquired token
    pub delay_ms: u64,
    /// Hard cap for the adaptive delay under sustained rate limiting
    pub max_delay_ms: u64,
}

impl Default for ServiceRateSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            delay_ms: 250,
            max_delay_ms: 10_000,
        }
    }
}

impl TomlConfig {
    /// Load configuration from an explicit path, or from the platform config
    /// location when `path` is `None`.
    ///
    /// A missing file yields the compiled defaults; a present but malformed
    /// file is an error (silently ignoring a typo'd config is worse than
    /// refusing to start).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let Some(config_path) = resolved else {
            return Ok(Self::default());
        };

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let config: TomlConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", config_path.display(), e)))?;

        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Rate settings for a named service, falling back to defaults
    pub fn service_rate(&self, name: &str) -> ServiceRateSettings {
        self.services.get(name).cloned().unwrap_or_default()
    }
}

/// Resolve the data folder following the documented priority order
pub fn resolve_data_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(folder) = &config.data_folder {
        return PathBuf::from(folder);
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Platform config file path (~/.config/cinevibe/config.toml on Linux)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cinevibe").join("config.toml"))
}

/// OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cinevibe"))
        .unwrap_or_else(|| PathBuf::from("./cinevibe_data"))
}
