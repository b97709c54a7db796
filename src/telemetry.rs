//! Telemetry metric name constants.
//!
//! Centralised metric names for gateway operations. Consumers install
//! their own `metrics` recorder; without one, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `byok_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: slug of the provider that served the call
//! - `mode`: `"stream"` or `"batch"`
//! - `outcome`: `"ok"`, `"rejected"` or `"upstream_failed"`
//! - `direction`: token direction: `"prompt"` or `"completion"`

/// Chat turns handled by the orchestrator.
///
/// Labels: `mode`, `outcome`.
pub const TURNS_TOTAL: &str = "byok_turns_total";

/// Upstream generation duration in seconds (stream: until the last event).
///
/// Labels: `provider`, `mode`.
pub const GENERATION_DURATION_SECONDS: &str = "byok_generation_duration_seconds";

/// Retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "byok_retries_total";

/// Tokens reported by upstream providers.
///
/// Labels: `provider`, `direction`.
pub const TOKENS_TOTAL: &str = "byok_tokens_total";

/// Requests served by the hosted default model instead of the requested provider.
///
/// Labels: `requested`.
pub const PROVIDER_FALLBACK_TOTAL: &str = "byok_provider_fallback_total";

/// Title synthesis attempts.
///
/// Labels: `status` (`"ok"` | `"error"`).
pub const TITLE_ATTEMPTS_TOTAL: &str = "byok_title_attempts_total";

pub(crate) const OUTCOME_OK: &str = "ok";
pub(crate) const OUTCOME_REJECTED: &str = "rejected";
pub(crate) const OUTCOME_UPSTREAM_FAILED: &str = "upstream_failed";

/// Record token usage for a completed generation.
pub(crate) fn record_usage(provider: &str, usage: &crate::types::Usage) {
    metrics::counter!(TOKENS_TOTAL, "provider" => provider.to_owned(), "direction" => "prompt")
        .increment(u64::from(usage.prompt_tokens));
    metrics::counter!(TOKENS_TOTAL, "provider" => provider.to_owned(), "direction" => "completion")
        .increment(u64::from(usage.completion_tokens));
}
