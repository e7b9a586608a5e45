//! Reconnect backoff.

use std::time::Duration;

/// Default base delay between reconnect attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Exponential reconnect delay.
///
/// Every failure doubles the delay, every successful open resets it to the
/// base. There is no ceiling unless one is configured.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    current: Duration,
    ceiling: Option<Duration>,
}

impl Backoff {
    /// Create a backoff starting at `base`.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
            ceiling: None,
        }
    }

    /// Cap the delay at `ceiling`.
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: Option<Duration>) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// The delay to wait before the next attempt.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.current
    }

    /// Record a failure, doubling the delay.
    pub fn fail(&mut self) -> Duration {
        let doubled = self.current.saturating_mul(2);
        self.current = match self.ceiling {
            Some(ceiling) => doubled.min(ceiling),
            None => doubled,
        };
        self.current
    }

    /// Record a successful open.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}
