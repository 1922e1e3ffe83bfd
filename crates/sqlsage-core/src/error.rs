//! Error types for SQLSage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable category label exposed to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Embedding(_) => "embedding",
            Error::Provider(_) => "provider",
            Error::Timeout => "timeout",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Database(_) => "database",
            Error::Storage(_) => "storage",
            Error::Config(_) => "config",
            Error::Json(_) => "json",
            Error::Io(_) => "io",
            Error::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
