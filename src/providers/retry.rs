//! Retry configuration, delay calculation, and the retrying chat decorator.
//!
//! Every upstream client handed out by the adapter selector is wrapped in
//! [`RetryingChatProvider`], which delegates to the shared `with_retry()`
//! helper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::telemetry;

use super::traits::{ChatProvider, ChatStream};
use crate::types::{ChatOptions, ChatResponse, Message};
use crate::Result;

/// Retries granted to every upstream call after the initial attempt.
pub const MAX_RETRIES: u32 = 3;

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff capped at `max_delay`:
///
/// ```rust
/// # use byok_gateway::providers::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(1), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: `MAX_RETRIES + 1`.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES + 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retry.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// `initial_delay * 2^attempt`, capped at `max_delay` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// A provider `retry_after` hint takes precedence over the backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Run one upstream call, repeating it on transient errors.
///
/// Permanent errors and the error of the final attempt are returned as-is.
/// Only actual retries are counted in [`telemetry::RETRIES_TOTAL`].
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        attempt += 1;
        if !err.is_transient() || attempt >= attempts {
            return Err(err);
        }

        metrics::counter!(telemetry::RETRIES_TOTAL,
            "provider" => provider_name.to_owned(),
            "operation" => operation.to_owned(),
        )
        .increment(1);
        let delay = config.effective_delay(attempt - 1, err.retry_after());
        warn!(
            provider = provider_name,
            operation,
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "upstream call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Decorator that wraps a [`ChatProvider`] with retry logic.
///
/// Streaming calls retry only the initial connection; a failure after the
/// first event has been yielded propagates to the consumer.
pub struct RetryingChatProvider {
    inner: Arc<dyn ChatProvider>,
    config: RetryConfig,
}

impl RetryingChatProvider {
    pub fn new(inner: Arc<dyn ChatProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ChatProvider for RetryingChatProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        with_retry(&self.config, self.inner.name(), "chat", || {
            self.inner.chat(messages, options)
        })
        .await
    }

    async fn chat_stream(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatStream> {
        with_retry(&self.config, self.inner.name(), "chat_stream", || {
            self.inner.chat_stream(messages, options)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_three_retries() {
        assert_eq!(RetryConfig::default().max_attempts, 4);
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn retry_after_hint_wins() {
        let config = RetryConfig::new();
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_millis(42))),
            Duration::from_millis(42)
        );
    }
}
