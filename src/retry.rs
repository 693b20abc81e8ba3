//! Bounded polling with a fixed delay.
//!
//! The paginator has to wait for state it does not control (remote images
//! finishing inside the browser). [`poll_until`] keeps that wait logic apart
//! from the browser so it can be driven by a scripted predicate in tests.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often, and how long apart, a predicate is re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Re-checks after the first check; total checks = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before each re-check.
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate held after `retries` re-checks.
    Ready { retries: u32 },
    /// The predicate never held; `retries` re-checks were spent.
    Exhausted { retries: u32 },
}

impl PollOutcome {
    pub fn is_ready(self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn retries(self) -> u32 {
        match self {
            PollOutcome::Ready { retries } | PollOutcome::Exhausted { retries } => retries,
        }
    }
}

/// Check `predicate` until it returns `true` or the policy is spent.
///
/// Sleeps `policy.interval` before every re-check, never after the last one.
pub async fn poll_until<F, Fut>(policy: &PollPolicy, mut predicate: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            debug!(
                attempt,
                max_retries = policy.max_retries,
                delay_ms = policy.interval.as_millis() as u64,
                "re-checking after delay"
            );
            tokio::time::sleep(policy.interval).await;
        }
        if predicate().await {
            return PollOutcome::Ready { retries: attempt };
        }
    }
    PollOutcome::Exhausted {
        retries: policy.max_retries,
    }
}
