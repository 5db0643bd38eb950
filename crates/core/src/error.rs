//! Error types for Trainer Insight.
//!
//! One enum covers every failure category in the workspace. Remote clients
//! classify their failures into `Transient` (worth retrying), `Status`
//! (the service answered with an error code) or a domain variant.

use thiserror::Error;

/// Unified error type for Trainer Insight.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic: errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generator (LLM) errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding backend errors that are not worth retrying
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Similarity index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Record store and record assembly errors
    #[error("Record store error: {0}")]
    Records(String),

    /// Retrieval pipeline errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A remote call failed in a way that may succeed on retry
    /// (model still loading, timeout, connection reset).
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A remote service answered with a non-success status code.
    #[error("{service} returned status {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    /// A structural invariant was violated; nothing was written.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
