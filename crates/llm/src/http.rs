//! Failure classification for HTTP model backends.
//!
//! The generator and embedding providers share the same rules: a 503 means
//! the hosted model is still loading, timeouts and refused connections may
//! clear up, every other error status is final.

use insight_core::AppError;
use reqwest::StatusCode;

/// Map a transport error from `reqwest` to an `AppError`.
pub fn send_error(service: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() {
        AppError::Transient(format!("{} request failed: {}", service, err))
    } else {
        AppError::Other(format!("{} request failed: {}", service, err))
    }
}

/// Map a non-success status code to an `AppError`.
pub fn status_error(service: &str, status: StatusCode, body: String) -> AppError {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        AppError::Transient(format!("{} is loading or unavailable (503): {}", service, body))
    } else {
        AppError::Status {
            service: service.to_string(),
            status: status.as_u16(),
            message: truncate(&body, 300),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
