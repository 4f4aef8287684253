//! # Exponential Backoff
//!
//! Doubling backoff used in two places: the controller's per-object error
//! requeue (seconds to minutes) and the per-step retry wrapper around every
//! resource (milliseconds).
//!
//! Sequence for `ExponentialBackoff::new(10s, 600s)`: 10s, 20s, 40s, 80s,
//! 160s, 320s, 600s (max).

use std::time::Duration;

/// Exponential backoff calculator
///
/// Each backoff is twice the previous one, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial backoff value (for reset)
    initial: Duration,
    /// Backoff returned by the next call
    current: Duration,
    /// Maximum backoff value
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `initial` and capped at `max`
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            current: initial,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Backoff for the given zero-based attempt number (stateless)
    ///
    /// `initial * 2^attempt`, capped at `max`.
    #[must_use]
    pub fn for_attempt(attempt: u32, initial: Duration, max: Duration) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        std::cmp::min(initial.saturating_mul(factor), max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(600));

        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(20));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(40));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(80));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(160));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(320));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(600)); // capped
        assert_eq!(backoff.next_backoff(), Duration::from_secs(600));
    }

    #[test]
    fn test_exponential_backoff_reset() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(600));

        backoff.next_backoff();
        backoff.next_backoff();
        backoff.next_backoff();

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(20));
    }

    #[test]
    fn test_for_attempt_caps_large_attempts() {
        let initial = Duration::from_millis(200);
        let max = Duration::from_secs(2);

        assert_eq!(ExponentialBackoff::for_attempt(0, initial, max), Duration::from_millis(200));
        assert_eq!(ExponentialBackoff::for_attempt(2, initial, max), Duration::from_millis(800));
        assert_eq!(ExponentialBackoff::for_attempt(4, initial, max), max);
        assert_eq!(ExponentialBackoff::for_attempt(64, initial, max), max);
    }
}
