//! Generation backend selection.
//!
//! Backends are tried strictly in priority order and the first one that
//! returns text wins; no quality comparison is made across backends.
//!
//! # Architecture
//!
//! - [`GenerationBackend`]: one model endpoint, answering with a [`GenerationResult`]
//! - [`RetryBackend`]: decorator that retries rate-limited attempts on the same backend
//! - [`generate`]: walks the priority list and returns the first success
//!
//! # Retry Strategy
//!
//! Only `429`/`503` failures are retried, a bounded number of times, with
//! exponential backoff and jitter:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```
//!
//! Blocks and every other failure move straight on to the next backend.

use crate::models::{GenerationRequest, GenerationResult};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// One model endpoint.
pub trait GenerationBackend {
    /// Identifier used in logs and in the run record.
    fn id(&self) -> &str;

    /// Send the prompt and classify the answer.
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;
}

/// Adds bounded backoff retries for rate-limited attempts to any backend.
pub struct RetryBackend<T> {
    inner: T,
    /// Extra attempts after the first.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T: GenerationBackend> RetryBackend<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> RetryBackend<T> {
    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBackend")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: GenerationBackend> GenerationBackend for RetryBackend<T> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    #[instrument(level = "info", skip_all, fields(backend = %self.inner.id()))]
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut attempt = 0usize;
        loop {
            let result = self.inner.generate(request).await;
            let retryable = matches!(&result, GenerationResult::Failure { cause, .. } if cause.is_retryable());
            if !retryable || attempt >= self.max_retries {
                return result;
            }
            attempt += 1;

            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

            if let GenerationResult::Failure { cause, .. } = &result {
                warn!(attempt, max = self.max_retries, ?delay, cause = %cause, "Backend rate-limited; backing off");
            }
            sleep(delay).await;
        }
    }
}

/// A backend produced text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub backend_id: String,
    pub raw_text: String,
}

/// Every backend failed or refused.
#[derive(Debug, Error)]
#[error("all {} generation backends failed or refused", .attempts.len())]
pub struct Exhausted {
    /// One non-success result per backend, in priority order.
    pub attempts: Vec<GenerationResult>,
}

/// Try `backends` in order and return the first success.
///
/// Each backend is asked exactly once; retries, if any, happen inside the
/// backend itself (see [`RetryBackend`]). A block or a failure moves on to
/// the next entry.
///
/// # Arguments
///
/// * `request` - The prompt, shared unchanged by every backend
/// * `backends` - Priority list, highest first
///
/// # Returns
///
/// The winning backend's id and its raw text.
///
/// # Errors
///
/// [`Exhausted`] with one result per backend when none of them succeeded,
/// including when `backends` is empty.
#[instrument(level = "info", skip_all, fields(backends = backends.len()))]
pub async fn generate<B: GenerationBackend>(
    request: &GenerationRequest,
    backends: &[B],
) -> Result<Generated, Exhausted> {
    let total_t0 = Instant::now();
    let mut attempts = Vec::with_capacity(backends.len());

    for backend in backends {
        let t0 = Instant::now();
        let result = backend.generate(request).await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        match result {
            GenerationResult::Success { backend_id, raw_text } => {
                info!(
                    backend = %backend_id,
                    elapsed_ms,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    bytes = raw_text.len(),
                    "Backend produced an answer"
                );
                return Ok(Generated { backend_id, raw_text });
            }
            other => {
                match &other {
                    GenerationResult::Blocked { backend_id, reason } => {
                        warn!(backend = %backend_id, elapsed_ms, reason = %reason, "Backend blocked the prompt; trying next");
                    }
                    GenerationResult::Failure { backend_id, cause } => {
                        warn!(backend = %backend_id, elapsed_ms, cause = %cause, "Backend failed; trying next");
                    }
                    GenerationResult::Success { .. } => {}
                }
                attempts.push(other);
            }
        }
    }

    error!(
        attempts = attempts.len(),
        backends = ?attempts.iter().map(GenerationResult::backend_id).collect::<Vec<_>>(),
        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
        "All generation backends exhausted"
    );
    Err(Exhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureCause;
    use crate::testing::{Outcome, ScriptedBackend};

    fn request() -> GenerationRequest {
        GenerationRequest::new("prompt".into())
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let backends = vec![
            ScriptedBackend::new("a", vec![Outcome::Success("from a".into())]),
            ScriptedBackend::new("b", vec![Outcome::Success("from b".into())]),
        ];
        let generated = generate(&request(), &backends).await.unwrap();
        assert_eq!(generated.backend_id, "a");
        assert_eq!(generated.raw_text, "from a");
        assert_eq!(backends[0].calls(), 1);
        assert_eq!(backends[1].calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_through_failures_and_blocks_to_last() {
        let backends = vec![
            ScriptedBackend::new("a", vec![Outcome::Fail(FailureCause::Status(404))]),
            ScriptedBackend::new("b", vec![Outcome::Blocked("SAFETY".into())]),
            ScriptedBackend::new("c", vec![Outcome::Fail(FailureCause::Transport("reset".into()))]),
            ScriptedBackend::new("d", vec![Outcome::Success("ok".into())]),
        ];
        let generated = generate(&request(), &backends).await.unwrap();
        assert_eq!(generated.backend_id, "d");
        for backend in &backends {
            assert_eq!(backend.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_success_in_the_middle() {
        let backends = vec![
            ScriptedBackend::new("a", vec![Outcome::Blocked("SAFETY".into())]),
            ScriptedBackend::new("b", vec![Outcome::Success("ok".into())]),
            ScriptedBackend::new("c", vec![Outcome::Success("never".into())]),
        ];
        let generated = generate(&request(), &backends).await.unwrap();
        assert_eq!(generated.backend_id, "b");
        assert_eq!(backends[2].calls(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_attempt() {
        let backends = vec![
            ScriptedBackend::new("a", vec![Outcome::Fail(FailureCause::Status(500))]),
            ScriptedBackend::new("b", vec![Outcome::Blocked("PROHIBITED_CONTENT".into())]),
        ];
        let err = generate(&request(), &backends).await.unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.attempts[0].backend_id(), "a");
        assert!(matches!(err.attempts[1], GenerationResult::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_empty_backend_list_is_exhausted() {
        let backends: Vec<ScriptedBackend> = vec![];
        let err = generate(&request(), &backends).await.unwrap_err();
        assert!(err.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_retry_on_rate_limit() {
        let inner = ScriptedBackend::new(
            "a",
            vec![
                Outcome::Fail(FailureCause::Status(429)),
                Outcome::Success("second try".into()),
            ],
        );
        let backend = RetryBackend::new(inner, 1, StdDuration::from_millis(1));
        let result = backend.generate(&request()).await;
        assert!(matches!(result, GenerationResult::Success { .. }));
        assert_eq!(backend.inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let inner = ScriptedBackend::new("a", vec![Outcome::Fail(FailureCause::Status(503))]);
        let backend = RetryBackend::new(inner, 2, StdDuration::from_millis(1));
        let result = backend.generate(&request()).await;
        assert!(matches!(result, GenerationResult::Failure { .. }));
        assert_eq!(backend.inner.calls(), 3);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let backend = RetryBackend::new(ScriptedBackend::new("a", vec![]), 3, StdDuration::from_secs(2));
        assert_eq!(backend.backoff(1), StdDuration::from_secs(2));
        assert_eq!(backend.backoff(2), StdDuration::from_secs(4));
        assert_eq!(backend.backoff(3), StdDuration::from_secs(8));
        assert_eq!(backend.backoff(5), StdDuration::from_secs(30));
    }

    #[test]
    fn test_backoff_survives_huge_attempt_counts() {
        let backend = RetryBackend::new(ScriptedBackend::new("a", vec![]), 100, StdDuration::from_secs(2));
        for attempt in [32, 33, 40, 64, 100, usize::MAX] {
            assert_eq!(backend.backoff(attempt), StdDuration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn test_no_retry_on_block_or_client_error() {
        let blocked = RetryBackend::new(
            ScriptedBackend::new("a", vec![Outcome::Blocked("SAFETY".into())]),
            3,
            StdDuration::from_millis(1),
        );
        blocked.generate(&request()).await;
        assert_eq!(blocked.inner.calls(), 1);

        let not_found = RetryBackend::new(
            ScriptedBackend::new("b", vec![Outcome::Fail(FailureCause::Status(404))]),
            3,
            StdDuration::from_millis(1),
        );
        not_found.generate(&request()).await;
        assert_eq!(not_found.inner.calls(), 1);
    }
}
