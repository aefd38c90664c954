//! cinevibe-enrich - Catalog Enrichment CLI
//!
//! Batch-enriches the CineVibe catalog database: derives structured metadata
//! for every unenriched item through the tier fallback chain, generates the
//! three companion embedding vectors, and commits each item atomically.
//! Interrupted runs resume from the durable checkpoint.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cinevibe_common::config::{resolve_data_folder, TomlConfig};
use cinevibe_enrich::coordinator::BatchCoordinator;
use cinevibe_enrich::db::CatalogStore;
use cinevibe_enrich::extractor::TierFallbackExtractor;
use cinevibe_enrich::failures::FailureStore;
use cinevibe_enrich::limiter::RateLimiterRegistry;
use cinevibe_enrich::providers::{HttpContentProvider, HttpEmbeddingProvider, LlmExtractor};
use cinevibe_enrich::quality::{QualityGate, QualityScorer, QualityTier};
use cinevibe_enrich::retry::RetryPolicy;
use cinevibe_enrich::tiers::{
    ContentTier, DefaultsTier, ExtractionTier, InferenceTier, OverviewTier,
};

#[derive(Parser)]
#[command(name = "cinevibe-enrich", version, about = "CineVibe catalog enrichment")]
struct Cli {
    /// Path to the TOML config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data folder containing catalog.db (overrides config and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an enrichment pass over unenriched items, most popular first
    Enrich {
        /// Maximum number of items to process
        #[arg(long)]
        limit: Option<u32>,

        /// Items per chunk (overrides the configured chunk size)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Run extraction only: no embeddings, no writes, no checkpoint
        #[arg(long)]
        dry_run: bool,
    },

    /// Score already-enriched items and report the quality distribution
    Audit {
        /// Maximum number of items to score
        #[arg(long)]
        limit: Option<u32>,

        /// Also list item ids scoring below this threshold
        #[arg(long)]
        below: Option<f64>,
    },

    /// Delete resolved failure records older than the retention window
    SweepFailures {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("cinevibe-enrich {}", env!("CARGO_PKG_VERSION"));

    let config = TomlConfig::load(cli.config.as_deref())?;
    let data_folder = resolve_data_folder(cli.data_dir.as_deref(), &config);
    let db_path = data_folder.join("catalog.db");
    info!("Database: {}", db_path.display());

    let pool = cinevibe_common::db::init_database_pool(&db_path).await?;

    match cli.command {
        Command::Enrich {
            limit,
            chunk_size,
            dry_run,
        } => run_enrich(pool, &config, limit, chunk_size, dry_run).await,
        Command::Audit { limit, below } => run_audit(pool, &config, limit, below).await,
        Command::SweepFailures { days } => run_sweep(pool, days).await,
    }
}

async fn run_enrich(
    pool: sqlx::SqlitePool,
    config: &TomlConfig,
    limit: Option<u32>,
    chunk_size: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let providers = &config.providers;

    // LLM and embedding credentials are required; refusing to start beats
    // failing every item one by one.
    let llm_base = providers
        .llm_base_url
        .as_deref()
        .context("llm_base_url is not configured")?;
    let llm_key = providers
        .llm_api_key
        .as_deref()
        .context("llm_api_key is not configured")?;
    let llm_model = providers
        .llm_model
        .as_deref()
        .context("llm_model is not configured")?;
    let embed_base = providers.embedding_base_url.as_deref().unwrap_or(llm_base);
    let embed_key = providers.embedding_api_key.as_deref().unwrap_or(llm_key);
    let embed_model = providers
        .embedding_model
        .as_deref()
        .context("embedding_model is not configured")?;

    let registry = RateLimiterRegistry::from_settings(config.services.clone());
    let llm_limiter = registry.limiter("llm");
    let embed_limiter = registry.limiter("embeddings");

    let settings = &config.enrichment;
    let gate = QualityGate::new(settings);
    let retry = RetryPolicy::default();

    let llm: Arc<LlmExtractor> = Arc::new(LlmExtractor::new(llm_base, llm_key, llm_model)?);
    let embedder = Arc::new(HttpEmbeddingProvider::new(embed_base, embed_key, embed_model)?);

    let mut tiers: Vec<Box<dyn ExtractionTier>> = Vec::with_capacity(4);
    match providers.content_base_url.as_deref() {
        Some(content_base) => {
            let content = Arc::new(HttpContentProvider::new(
                content_base,
                providers.content_api_key.as_deref(),
            )?);
            tiers.push(Box::new(ContentTier::new(
                content,
                llm.clone(),
                gate.clone(),
                registry.limiter("content"),
                llm_limiter.clone(),
                retry,
                settings.min_content_chars,
            )));
        }
        None => {
            warn!("content_base_url not configured, content tier disabled");
        }
    }
    tiers.push(Box::new(OverviewTier::new(
        llm.clone(),
        gate.clone(),
        llm_limiter.clone(),
        retry,
        settings.min_overview_chars,
    )));
    tiers.push(Box::new(InferenceTier::new(
        llm,
        gate,
        llm_limiter,
        retry,
    )));
    tiers.push(Box::new(DefaultsTier::new()));

    let failures = FailureStore::new(pool.clone());
    let extractor = TierFallbackExtractor::new(tiers, failures.clone(), dry_run);
    let store = CatalogStore::new(pool);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current item then stopping");
            signal_token.cancel();
        }
    });

    let coordinator = BatchCoordinator::new(
        store,
        extractor,
        embedder,
        embed_limiter,
        failures,
        retry,
        chunk_size.unwrap_or(settings.chunk_size),
        dry_run,
        cancel,
    );

    let summary = coordinator.run(limit).await?;
    print!("{}", summary);
    Ok(())
}

async fn run_audit(
    pool: sqlx::SqlitePool,
    config: &TomlConfig,
    limit: Option<u32>,
    below: Option<f64>,
) -> Result<()> {
    let store = CatalogStore::new(pool);
    let scorer = QualityScorer::new(&config.enrichment);

    let rows = store.fetch_enriched(limit).await?;
    if rows.is_empty() {
        println!("No enriched items to audit.");
        return Ok(());
    }

    let mut counts = [0u64; 4];
    let mut total_score = 0.0;
    let mut low_scorers: Vec<(i64, f64)> = Vec::new();
    for row in &rows {
        let score = scorer.score(&row.metadata);
        total_score += score;
        let slot = match scorer.tier(score) {
            QualityTier::Poor => 0,
            QualityTier::Fair => 1,
            QualityTier::Good => 2,
            QualityTier::Excellent => 3,
        };
        counts[slot] += 1;
        if below.is_some_and(|threshold| score < threshold) {
            low_scorers.push((row.item_id, score));
        }
    }

    println!("Audited {} enriched items", rows.len());
    println!("Mean score: {:.1}", total_score / rows.len() as f64);
    for (tier, count) in [
        (QualityTier::Poor, counts[0]),
        (QualityTier::Fair, counts[1]),
        (QualityTier::Good, counts[2]),
        (QualityTier::Excellent, counts[3]),
    ] {
        println!("  {:>9}: {}", tier.as_str(), count);
    }

    if let Some(threshold) = below {
        println!(
            "{} items below {:.0} (re-enrichment candidates):",
            low_scorers.len(),
            threshold
        );
        for (item_id, score) in low_scorers {
            println!("  {:>8}  {:.1}", item_id, score);
        }
    }
    Ok(())
}

async fn run_sweep(pool: sqlx::SqlitePool, days: i64) -> Result<()> {
    if days < 0 {
        bail!("retention window must be non-negative");
    }
    let failures = FailureStore::new(pool);
    let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
    let deleted = failures.sweep_resolved(cutoff).await?;
    println!("Deleted {} resolved failure records", deleted);
    Ok(())
}
