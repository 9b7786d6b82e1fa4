//! Bounded exponential backoff for model calls
//!
//! Retries stay inside a single turn; nothing is persisted between attempts.

use std::future::Future;
use std::time::Duration;

use stack_advisor_config::AgentConfig;
use stack_advisor_llm::LlmError;

/// Retry policy for one model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled after each failure
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_attempts: config.generation_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }

    /// Policy without delays, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are spent. The last error is returned.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(
                    operation = operation,
                    error = %e,
                    "LLM call failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    policy.max_attempts
                );
                metrics::counter!("stack_advisor_llm_retries_total", "operation" => operation)
                    .increment(1);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
