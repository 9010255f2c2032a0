//! Shared error type for the database, config, and filesystem layers

use thiserror::Error;

/// Result alias used throughout ladle-common and the services
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// sqlx failure; lock contention is detected from this variant
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML load, parse, or serialize failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row expected to exist was not there
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization and other failures with no recovery path
    #[error("Internal error: {0}")]
    Internal(String),
}
