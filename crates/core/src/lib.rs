//! Trainer Insight Core Library
//!
//! Foundational utilities shared by every crate in the workspace:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Layered configuration (defaults, YAML, environment, CLI flags)
//! - Retry/backoff policy shared by the remote model clients

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use retry::RetryPolicy;
