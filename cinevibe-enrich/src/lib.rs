//! CineVibe Enrichment Core
//!
//! Batch metadata enrichment for a film/series catalog. For every unenriched
//! item the pipeline derives a structured metadata bundle (narrative slots,
//! themes, vibes, tone, pacing, logline) through an ordered chain of
//! extraction tiers, generates three companion embedding vectors, and commits
//! metadata plus vectors atomically.
//!
//! Tier order, first gate-accepted result wins:
//! 1. Sourced long-form content ([`tiers::ContentTier`])
//! 2. The item's own overview ([`tiers::OverviewTier`])
//! 3. Structured inference from categorical facts ([`tiers::InferenceTier`])
//! 4. Deterministic genre/era defaults ([`tiers::DefaultsTier`], never fails)
//!
//! Runs are resumable: per-item progress is checkpointed durably
//! ([`checkpoint`]), failures are recorded per (item, phase) ([`failures`]),
//! and external services sit behind adaptive rate limiters ([`limiter`]) and
//! a retry executor ([`retry`]).

pub mod checkpoint;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod extractor;
pub mod failures;
pub mod limiter;
pub mod providers;
pub mod quality;
pub mod retry;
pub mod tiers;
pub mod types;

pub use error::{EnrichError, EnrichResult};
