//! Library error type.
//!
//! Only orchestration failures (config, cache and output I/O) ever abort a run.
//! Per-message problems are reported as counts by the stage that met them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Message has no Message-ID")]
    MissingMessageId,

    #[error("Cache error: {0}")]
    Cache(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Domain rank error: {0}")]
    DomainRank(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
