//! Retry, reconnect and respawn policies.
//!
//! This module groups the knobs that control **if/when** something is retried
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`BackoffPolicy`]   how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]    randomization of computed delays
//! - [`JitterRange`]     random pre-action pauses (optional everywhere)
//! - [`ReconnectPolicy`] session re-establishment bounds
//! - [`LoginPolicy`]     authentication retry bounds
//! - [`RespawnPolicy`]   supervisor-level respawn delay and circuit breaker
//!
//! ## Quick wiring
//! ```text
//! RateLimitedQueue ─► 2^n × retry_base on throttle
//! ConnectionStateMachine
//!   ├─ LoginPolicy::delay(n, throttled)
//!   ├─ ReconnectPolicy::delay(n)
//!   └─ JitterRange::sample() before login/connect
//! Supervisor ─► RespawnPolicy::next_delay() / is_tripped()
//! ```

mod backoff;
mod jitter;
mod reconnect;
mod respawn;

pub use backoff::BackoffPolicy;
pub use jitter::{JitterPolicy, JitterRange};
pub use reconnect::{LoginPolicy, RECONNECT_DELAY_CAP, RECONNECT_JITTER, ReconnectPolicy};
pub use respawn::RespawnPolicy;
