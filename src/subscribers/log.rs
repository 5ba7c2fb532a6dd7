//! # LogWriter: events as `tracing` lines.
//!
//! Renders every [`Event`] as one structured `tracing` record. The level follows
//! the event kind: failures are `warn`, terminal failures and panics are `error`,
//! routine transitions are `info`.
//!
//! ## Example output (with the `fmt` subscriber)
//! ```text
//! INFO  sessionvisor: logging in kind="login_started" agent="…x9Qa"
//! WARN  sessionvisor: session lost: transport error: socket closed kind="session_lost" agent="…x9Qa" state=reconnecting
//! INFO  sessionvisor: reconnect 1/5 in 5.42s kind="reconnect_scheduled" agent="…x9Qa" attempt=1 delay_ms=5420
//! ERROR sessionvisor: reconnect attempts exhausted kind="agent_fatal" agent="…x9Qa"
//! ```

use async_trait::async_trait;
use tracing::Level;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Level an event is logged at.
    pub fn level_for(kind: EventKind) -> Level {
        match kind {
            EventKind::AgentFatal
            | EventKind::CircuitOpen
            | EventKind::GraceExceeded
            | EventKind::SubscriberPanicked => Level::ERROR,
            kind if kind.is_failure() => Level::WARN,
            EventKind::AgentSpawned | EventKind::AgentExited => Level::DEBUG,
            _ => Level::INFO,
        }
    }
}

macro_rules! emit {
    ($lvl:expr, $e:expr) => {{
        let e = $e;
        let rec = e.record();
        let state = e.state.map(|s| s.as_str());
        tracing::event!(
            target: "sessionvisor",
            $lvl,
            kind = rec.kind,
            agent = %rec.short_id,
            state,
            attempt = e.attempt,
            delay_ms = e.delay_ms,
            reason = e.reason.as_deref(),
            "{}",
            rec.message
        );
    }};
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match Self::level_for(e.kind) {
            Level::ERROR => emit!(Level::ERROR, e),
            Level::WARN => emit!(Level::WARN, e),
            Level::INFO => emit!(Level::INFO, e),
            _ => emit!(Level::DEBUG, e),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
