//! # Jitter for retry delays and pre-action pauses.
//!
//! [`JitterPolicy`] randomizes a computed backoff delay so that many agents
//! failing at the same moment do not retry in lock-step.
//!
//! - [`JitterPolicy::None`]: no randomization, predictable delays
//! - [`JitterPolicy::Full`]: random delay in [0, backoff_delay]
//! - [`JitterPolicy::Equal`]: delay = backoff_delay/2 + random[0, backoff_delay/2]
//! - [`JitterPolicy::Additive`]: delay = backoff_delay + random[0, bound)
//!
//! [`JitterRange`] is a free-standing random pause (`min..=max`) applied before
//! outbound actions to decorrelate request timing across agents.

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    #[default]
    None,

    /// Full jitter: random delay in [0, backoff_delay].
    Full,

    /// Equal jitter: delay = backoff_delay/2 + random[0, backoff_delay/2].
    Equal,

    /// Additive jitter: delay = backoff_delay + random[0, bound).
    ///
    /// Never shortens the delay; the result stays inside the half-open
    /// interval `[delay, delay + bound)`.
    Additive(Duration),
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
            JitterPolicy::Additive(bound) => delay.saturating_add(additive_jitter(*bound)),
        }
    }
}

/// Full jitter: random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// Equal jitter: delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}

/// Additive jitter: random[0, bound)
fn additive_jitter(bound: Duration) -> Duration {
    let ms = bound.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..ms))
}

/// Inclusive range for a randomized pause.
///
/// Used before login and connect attempts so that a fleet of agents does not
/// produce a regular, correlated request pattern. Every place that uses one
/// takes an `Option<JitterRange>`; `None` disables the pause entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitterRange {
    /// Shortest pause.
    pub min: Duration,
    /// Longest pause (inclusive).
    pub max: Duration,
}

impl JitterRange {
    /// Creates a range from millisecond bounds. Bounds are swapped if reversed.
    pub fn from_millis(min: u64, max: u64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Draws one pause uniformly from `min..=max`.
    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        if hi <= lo {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}
