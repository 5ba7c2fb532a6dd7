//! # Runtime events emitted by agents and the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Agent transitions**: one event per connection-state transition
//! - **Supervision**: spawn, exit, respawn, circuit breaker
//! - **Shutdown**: request, clean drain, grace exceeded
//! - **Subscriber health**: overflow, panic
//!
//! The [`Event`] struct carries the human message plus structured metadata.
//! [`Event::record`] projects it onto the wire shape `{kind, message, shortId}`.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use sessionvisor::{ConnectionState, Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled, "reconnecting in 5s")
//!     .with_agent("1234", "…wxyz")
//!     .with_state(ConnectionState::Connecting)
//!     .with_attempt(1)
//!     .with_delay(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.short_id.as_deref(), Some("…wxyz"));
//! assert_eq!(ev.record().kind, "reconnect_scheduled");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::session::ConnectionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Agent transitions ===
    /// Idle → LoggingIn.
    LoginStarted,
    /// LoggingIn → LoggingIn after a throttled or transient failure.
    ///
    /// Sets `attempt` (1-based retry) and `delay_ms`.
    LoginRetry,
    /// LoggingIn → Connecting.
    LoginSucceeded,
    /// Connecting → Ready.
    SessionReady,
    /// Connecting → Reconnecting.
    ConnectFailed,
    /// Ready → Reconnecting.
    SessionLost,
    /// Reconnecting → Connecting after a backoff.
    ///
    /// Sets `attempt` (1-based reconnect) and `delay_ms`.
    ReconnectScheduled,
    /// Any → Destroyed for a reason other than shutdown.
    AgentFatal,
    /// Any → Destroyed because of a shutdown directive.
    AgentStopped,
    /// The agent received its shutdown directive.
    ShutdownDirective,

    // === Supervision ===
    /// An agent task was spawned for a credential.
    AgentSpawned,
    /// An agent task finished. `reason` holds the exit reason label.
    AgentExited,
    /// A respawn was scheduled after an abnormal exit.
    RespawnScheduled,
    /// Consecutive abnormal exits reached the ceiling; no more respawns.
    CircuitOpen,
    /// The credential is permanently out of rotation (e.g. rejected).
    AgentRetired,

    // === Shutdown ===
    /// Shutdown requested (OS signal or explicit trigger).
    ShutdownRequested,
    /// All agents stopped within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded; remaining agents were aborted.
    GraceExceeded,

    // === Subscriber health ===
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
}

impl EventKind {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LoginStarted => "login_started",
            EventKind::LoginRetry => "login_retry",
            EventKind::LoginSucceeded => "login_succeeded",
            EventKind::SessionReady => "session_ready",
            EventKind::ConnectFailed => "connect_failed",
            EventKind::SessionLost => "session_lost",
            EventKind::ReconnectScheduled => "reconnect_scheduled",
            EventKind::AgentFatal => "agent_fatal",
            EventKind::AgentStopped => "agent_stopped",
            EventKind::ShutdownDirective => "shutdown_directive",
            EventKind::AgentSpawned => "agent_spawned",
            EventKind::AgentExited => "agent_exited",
            EventKind::RespawnScheduled => "respawn_scheduled",
            EventKind::CircuitOpen => "circuit_open",
            EventKind::AgentRetired => "agent_retired",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::SubscriberPanicked => "subscriber_panicked",
        }
    }

    /// True for events that indicate something went wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventKind::LoginRetry
                | EventKind::ConnectFailed
                | EventKind::SessionLost
                | EventKind::AgentFatal
                | EventKind::CircuitOpen
                | EventKind::AgentRetired
                | EventKind::GraceExceeded
                | EventKind::SubscriberOverflow
                | EventKind::SubscriberPanicked
        )
    }
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Human-readable message.
    pub message: Arc<str>,
    /// Credential identifier of the agent, if applicable.
    pub agent: Option<Arc<str>>,
    /// Display-safe short id of the agent, if applicable.
    pub short_id: Option<Arc<str>>,
    /// Connection state entered by this transition.
    pub state: Option<ConnectionState>,
    /// Retry/reconnect/restart counter.
    pub attempt: Option<u32>,
    /// Scheduled delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Error label or exit reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event with current timestamp and next sequence number.
    pub fn new(kind: EventKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            message: message.into(),
            agent: None,
            short_id: None,
            state: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the agent identity.
    #[inline]
    pub fn with_agent(mut self, id: impl Into<Arc<str>>, short_id: impl Into<Arc<str>>) -> Self {
        self.agent = Some(id.into());
        self.short_id = Some(short_id.into());
        self
    }

    /// Attaches the connection state entered.
    #[inline]
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an error label or exit reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(
            EventKind::SubscriberOverflow,
            format!("subscriber={subscriber} dropped an event"),
        )
        .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(
            EventKind::SubscriberPanicked,
            format!("subscriber={subscriber} panicked"),
        )
        .with_reason(info)
    }

    /// Projects the event onto the agent → supervisor log record.
    pub fn record(&self) -> LogRecord {
        LogRecord {
            kind: self.kind.as_str(),
            message: self.message.to_string(),
            short_id: self.short_id.as_deref().unwrap_or("-").to_string(),
        }
    }
}

/// Serializable log record: `{kind, message, shortId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Event kind label.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Display-safe agent id, `-` for supervisor-level events.
    pub short_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::LoginStarted, "a");
        let b = Event::new(EventKind::LoginStarted, "b");
        assert!(b.seq > a.seq);
    }

    #[test]
    fn record_serializes_camel_case() -> Result<(), serde_json::Error> {
        let ev = Event::new(EventKind::SessionReady, "joined").with_agent("42", "…abcd");
        let json = serde_json::to_value(ev.record())?;
        assert_eq!(json["kind"], "session_ready");
        assert_eq!(json["message"], "joined");
        assert_eq!(json["shortId"], "…abcd");
        Ok(())
    }

    #[test]
    fn supervisor_events_have_placeholder_short_id() {
        let ev = Event::new(EventKind::ShutdownRequested, "signal received");
        assert_eq!(ev.record().short_id, "-");
    }
}
