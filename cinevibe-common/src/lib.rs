//! # CineVibe Common Library
//!
//! Shared code for the CineVibe enrichment tooling including:
//! - Common error type and `Result` alias
//! - TOML configuration loading and data folder resolution
//! - SQLite connection pool initialization and schema creation

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
