//! Retries of transient source failures at the port boundary
//!
//! The engine never sees individual attempts: a wrapped port either returns
//! documents or the last error once the attempts run out. Every attempt gets
//! the full per-call timeout, and [`RetrievalPort::call_budget`] reports the
//! envelope so the engine waits for the retries.

use corroborate_domain::{
    CancellationToken, RetrievalError, RetrievalPort, SourceDocument, SourceKind, SubQuery,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default number of attempts per call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Granularity at which backoff sleeps check for cancellation
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Exponential backoff policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given (1-based) failed attempt: base, 2·base, 4·base, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Retrieval port wrapper retrying transient failures with backoff
///
/// Only [`RetrievalError::is_transient`] errors are retried. Each attempt
/// is given the timeout passed to the call.
pub struct Retrying<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: RetrievalPort> Retrying<P> {
    /// Wrap a port with the default policy
    pub fn new(inner: P) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    /// Wrap a port with a custom policy
    pub fn with_policy(inner: P, policy: RetryPolicy) -> Self {
        let policy = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        Self { inner, policy }
    }

    /// The wrapped port
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: RetrievalPort> RetrievalPort for Retrying<P> {
    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn retrieve(
        &self,
        sub_query: &SubQuery,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceDocument>, RetrievalError> {
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetrievalError::Canceled);
            }

            attempt += 1;
            let error = match self.inner.retrieve(sub_query, timeout, cancel) {
                Ok(documents) => return Ok(documents),
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= self.policy.max_attempts {
                if attempt > 1 {
                    warn!(
                        "Source '{}' failed after {} attempts: {}",
                        self.kind(),
                        attempt,
                        error
                    );
                }
                return Err(error);
            }

            let delay = self.policy.delay_after(attempt);
            debug!(
                "Source '{}' attempt {} failed ({}), retrying in {:?}",
                self.kind(),
                attempt,
                error,
                delay
            );
            if !sleep_unless_canceled(delay, cancel) {
                return Err(RetrievalError::Canceled);
            }
        }
    }

    fn call_budget(&self, timeout: Duration) -> Duration {
        let attempts = self.policy.max_attempts;
        let backoff: Duration = (1..attempts).map(|a| self.policy.delay_after(a)).sum();
        self.inner
            .call_budget(timeout)
            .saturating_mul(attempts)
            .saturating_add(backoff)
    }
}

/// Sleep for `delay`, waking early if `cancel` fires. Returns false on cancel.
pub(crate) fn sleep_unless_canceled(delay: Duration, cancel: &CancellationToken) -> bool {
    let until = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= until {
            return true;
        }
        std::thread::sleep(CANCEL_POLL.min(until - now));
    }
}
