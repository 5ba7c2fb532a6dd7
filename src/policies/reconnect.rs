//! # Reconnect and login retry policies.
//!
//! [`ReconnectPolicy`] bounds how often a lost session is re-established and how
//! long to wait in between. [`LoginPolicy`] does the same for authentication,
//! with a steep curve for throttling and a flat one for everything else.
//!
//! ```text
//! reconnect n (1-based):  min(base × 2^(n-1), 300s) + U[0, 1000ms)
//! login throttle n:       min(60s × 2^(n-1), 600s)
//! login transient n:      min(5s × n, 30s)
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::policies::{BackoffPolicy, JitterPolicy};

/// Upper bound on a single reconnect delay before jitter.
pub const RECONNECT_DELAY_CAP: Duration = Duration::from_secs(300);

/// Random spread added on top of every reconnect delay.
pub const RECONNECT_JITTER: Duration = Duration::from_millis(1000);

/// Bounds for re-establishing a lost session.
///
/// Read-only configuration; copied into every agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed before the agent gives up.
    pub max_attempts: u32,
    /// Delay before the first reconnect; doubles on every further attempt.
    #[serde(rename = "delay", with = "millis")]
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    /// `max_attempts = 5`, `base_delay = 5s`.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), jitter included.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use sessionvisor::ReconnectPolicy;
    ///
    /// let policy = ReconnectPolicy { max_attempts: 5, base_delay: Duration::from_secs(5) };
    /// let d = policy.delay(2);
    /// assert!(d >= Duration::from_secs(10) && d < Duration::from_millis(11_000));
    /// ```
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff().next(attempt.saturating_sub(1))
    }

    /// True when another attempt is allowed after `attempts` have been made.
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: self.base_delay,
            max: RECONNECT_DELAY_CAP,
            factor: 2.0,
            jitter: JitterPolicy::Additive(RECONNECT_JITTER),
        }
    }
}

/// Retry limits and delays for the login phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoginPolicy {
    /// Retries allowed before the agent is destroyed.
    pub max_retries: u32,
    /// Delay curve for rate-limited logins.
    pub throttle: BackoffPolicy,
    /// Linear step for other transient failures.
    pub transient_step: Duration,
    /// Cap for the linear curve.
    pub transient_max: Duration,
}

impl Default for LoginPolicy {
    /// - `max_retries = 5`
    /// - `throttle = 60s × 2^(n-1)`, capped at 600s, no jitter
    /// - `transient = 5s × n`, capped at 30s
    fn default() -> Self {
        Self {
            max_retries: 5,
            throttle: BackoffPolicy {
                first: Duration::from_secs(60),
                max: Duration::from_secs(600),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            transient_step: Duration::from_secs(5),
            transient_max: Duration::from_secs(30),
        }
    }
}

impl LoginPolicy {
    /// Delay before login retry `retry` (1-based).
    pub fn delay(&self, retry: u32, throttled: bool) -> Duration {
        if throttled {
            self.throttle.next(retry.saturating_sub(1))
        } else {
            self.transient_step
                .saturating_mul(retry)
                .min(self.transient_max)
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
