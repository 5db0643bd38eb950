//! Retrying completions.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use insight_core::{AppResult, RetryPolicy};
use tracing::{debug, warn};

/// Call `client.complete`, retrying transient failures with capped
/// exponential backoff. Non-transient errors are returned immediately.
pub async fn complete_with_retry(
    client: &dyn LlmClient,
    request: &LlmRequest,
    policy: &RetryPolicy,
) -> AppResult<LlmResponse> {
    let mut attempt = 0;

    loop {
        match client.complete(request).await {
            Ok(response) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Completion succeeded after retry");
                }
                return Ok(response);
            }
            Err(e) if e.is_transient() && policy.should_retry(attempt) => {
                let delay = policy.backoff(attempt);
                warn!(
                    provider = client.provider_name(),
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Generator unavailable, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
