use std::future::Future;
use std::time::Duration;

/// Bounded retry cadence for the few fixed-count polls in the system.
/// The bound and spacing are data so callers and tests can inject their
/// own (tests use a zero interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Runs `attempt` up to `max_attempts` times, sleeping `interval`
    /// between tries, until it yields a value. Returns `None` when every
    /// attempt came back empty; the caller decides what giving up means.
    pub async fn poll<T, F, Fut>(&self, mut attempt: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for tried in 1..=self.max_attempts {
            if let Some(value) = attempt(tried).await {
                return Some(value);
            }
            if tried < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        None
    }
}
