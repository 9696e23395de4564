//! Error types for skim

use thiserror::Error;

/// skim error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error (weight tables, good-run lists, run config)
    #[error("Config error: {0}")]
    Config(String),

    /// Event source error
    #[error("Event source error: {0}")]
    Source(String),

    /// Output (columnar writer) error
    #[error("Output error: {0}")]
    Output(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
