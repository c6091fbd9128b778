use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Attempt cap and backoff curve for remote calls.
///
/// The delay before attempt `n + 1` is `base_delay_ms * exponential_base^n`,
/// capped at `max_delay_ms`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            exponential_base: 1.5,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: base_delay_ms.saturating_mul(30),
            ..Default::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

/// Result of a retried remote call.
///
/// Exhaustion is a value, not an error: callers decide what a failed
/// operation means for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome<T> {
    Completed(T),
    Exhausted { attempts: u32, last_error: String },
}

impl<T> RequestOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, RequestOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            RequestOutcome::Completed(value) => Some(value),
            RequestOutcome::Exhausted { .. } => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Completed(value) => RequestOutcome::Completed(f(value)),
            RequestOutcome::Exhausted {
                attempts,
                last_error,
            } => RequestOutcome::Exhausted {
                attempts,
                last_error,
            },
        }
    }
}

/// Runs `operation` up to `config.max_attempts` times (at least once),
/// sleeping between failures. Never returns an error.
pub async fn retry_request<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> RequestOutcome<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return RequestOutcome::Completed(result);
            }
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    debug!(
                        "{} failed after {} attempts: {:#}",
                        operation_name, attempt, e
                    );
                    return RequestOutcome::Exhausted {
                        attempts: attempt,
                        last_error: format!("{:#}", e),
                    };
                }

                let delay = config.calculate_delay(attempt - 1);
                debug!(
                    "{} failed (attempt {}/{}). Retrying in {:?}: {:#}",
                    operation_name, attempt, max_attempts, delay, e
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
