//! # Respawn policy for agents that exit abnormally.
//!
//! [`RespawnPolicy`] decides whether the supervisor brings an agent back and
//! how long it waits first.
//!
//! - The delay is drawn uniformly from [`RespawnPolicy::choices`] and scaled by
//!   `2^k`, with `k` uniform in `0..=max_exponent`. There is no tight loop even
//!   if an agent dies immediately on every start.
//! - A circuit breaker counts consecutive abnormal exits per credential and stops
//!   respawning once [`RespawnPolicy::ceiling`] is reached.
//!
//! ```text
//! exit(abnormal) ─► consecutive += 1
//!                   ├─ consecutive >= ceiling ─► circuit open, agent retired
//!                   └─ otherwise              ─► sleep(choice × 2^k) ─► respawn
//! ```

use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Controls respawning of agents after abnormal exits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RespawnPolicy {
    /// Base delays to pick from.
    pub choices: Vec<Duration>,
    /// Largest random doubling applied to the chosen base.
    pub max_exponent: u32,
    /// Consecutive abnormal exits after which the credential is retired (`0` = never).
    pub ceiling: u32,
}

impl Default for RespawnPolicy {
    /// `choices = {5s, 10s, 20s}`, `max_exponent = 1`, `ceiling = 5`.
    fn default() -> Self {
        Self {
            choices: vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
            ],
            max_exponent: 1,
            ceiling: 5,
        }
    }
}

impl RespawnPolicy {
    /// Draws the delay before the next respawn.
    pub fn next_delay(&self) -> Duration {
        let mut rng = rand::rng();
        let base = self
            .choices
            .choose(&mut rng)
            .copied()
            .unwrap_or(Duration::from_secs(5));
        let exp = rng.random_range(0..=self.max_exponent.min(16));
        base.saturating_mul(1u32 << exp)
    }

    /// True when `consecutive_failures` has tripped the circuit breaker.
    pub fn is_tripped(&self, consecutive_failures: u32) -> bool {
        self.ceiling != 0 && consecutive_failures >= self.ceiling
    }

    /// Smallest delay [`next_delay`](Self::next_delay) can return.
    pub fn min_delay(&self) -> Duration {
        self.choices
            .iter()
            .copied()
            .min()
            .unwrap_or(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_drawn_from_scaled_choices() {
        let policy = RespawnPolicy::default();
        let allowed: Vec<u64> = vec![5, 10, 20, 40];
        for _ in 0..200 {
            let secs = policy.next_delay().as_secs();
            assert!(allowed.contains(&secs), "unexpected delay {secs}s");
        }
    }

    #[test]
    fn breaker_trips_at_ceiling() {
        let policy = RespawnPolicy::default();
        assert!(!policy.is_tripped(4));
        assert!(policy.is_tripped(5));
    }

    #[test]
    fn zero_ceiling_never_trips() {
        let policy = RespawnPolicy {
            ceiling: 0,
            ..RespawnPolicy::default()
        };
        assert!(!policy.is_tripped(1_000));
    }

    #[test]
    fn empty_choices_fall_back() {
        let policy = RespawnPolicy {
            choices: Vec::new(),
            max_exponent: 0,
            ceiling: 1,
        };
        assert_eq!(policy.next_delay(), Duration::from_secs(5));
        assert_eq!(policy.min_delay(), Duration::from_secs(5));
    }
}
