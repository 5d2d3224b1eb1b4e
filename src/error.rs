//! Error types for docflow.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {id}")]
    NotFound { id: Uuid },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Intent classification errors.
///
/// These never escape the `Classifier` — a failed or slow remote call
/// degrades the classification instead of failing the request.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Unknown intent label: {label}")]
    UnknownLabel { label: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Payload extraction errors.
///
/// Agents absorb these into anomalies; only the file loader surfaces them.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),

    #[error("Payload is not valid UTF-8")]
    NotUtf8,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestrator-level errors — the only failures `process` reports.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
