//! # Exponential backoff.
//!
//! [`BackoffPolicy`] controls how delays grow after repeated failures.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is computed as `first × factor^n`, clamped to `max`,
//! then jitter is applied. The base delay is derived purely from the attempt
//! number, so jitter output never feeds back into later calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use sessionvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(5),
//!     max: Duration::from_secs(300),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(5));
//! assert_eq!(backoff.next(1), Duration::from_secs(10));
//! // 5s × 2^7 = 640s → capped at max
//! assert_eq!(backoff.next(7), Duration::from_secs(300));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for attempt 0.
    pub first: Duration,
    /// Maximum delay cap (applied before jitter).
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `first = 1s`;
    /// - `factor = 2.0`;
    /// - `max = 300s`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(300),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`],
    /// then passed through [`BackoffPolicy::jitter`].
    pub fn next(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base(attempt))
    }

    /// Same as [`next`](Self::next) without jitter.
    pub fn base(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = exp(1000, 30_000);
        assert_eq!(policy.next(0), Duration::from_millis(1000));
        assert_eq!(policy.next(1), Duration::from_millis(2000));
        assert_eq!(policy.next(2), Duration::from_millis(4000));
        assert_eq!(policy.next(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_constant_factor() {
        let policy = BackoffPolicy {
            factor: 1.0,
            ..exp(500, 30_000)
        };
        for attempt in 0..10 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = exp(10_000, 5_000);
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_non_finite_overflow_clamps_to_max() {
        let policy = exp(100, 10_000);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_additive_jitter_never_below_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Additive(Duration::from_millis(1000)),
            ..exp(5000, 300_000)
        };
        for attempt in 0..10 {
            let base = policy.base(attempt);
            let delay = policy.next(attempt);
            assert!(delay >= base, "attempt {attempt}: {delay:?} < {base:?}");
            assert!(delay < base + Duration::from_millis(1000));
        }
    }
}
