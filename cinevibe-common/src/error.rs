//! Error type shared by the CineVibe crates
//!
//! Deliberately small: the shared layer only loads configuration and opens
//! the catalog database, so only those failure modes live here. Pipeline
//! errors carry their own richer types in `cinevibe-enrich`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Config file present but unreadable as TOML, or a value failed
    /// validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure while locating or creating the data folder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog database could not be opened or initialized
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
