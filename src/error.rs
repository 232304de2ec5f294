//! Error types for the finance assistant
//!
//! The market-data path never surfaces these: fetch failures degrade to an
//! empty outcome. Everything else (configuration, the screener dataset,
//! generation backends) reports through `AssistantError`.

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Domain Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error("SQL execution error: {0}")]
    SqlError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
