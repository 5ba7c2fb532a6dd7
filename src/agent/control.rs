//! # Supervisor → agent control channel.
//!
//! [`AgentControl`] is the supervisor's handle on a running agent. The only
//! message an agent understands is [`ControlMessage::Shutdown`]; anything else
//! is parsed into [`ControlMessage::Unknown`] and ignored.
//!
//! ```text
//! deliver("shutdown") ──► shutdown() ──► first call: ShutdownDirective + cancel token
//!                                    └─► later calls: no-op
//! deliver("reboot")   ──► ignored
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::credentials::Credential;
use crate::events::{Bus, Event, EventKind};

/// Control message addressed to one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop the session and exit.
    Shutdown,
    /// Anything the agent does not recognise.
    Unknown(String),
}

impl From<&str> for ControlMessage {
    fn from(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("shutdown") {
            ControlMessage::Shutdown
        } else {
            ControlMessage::Unknown(raw.to_string())
        }
    }
}

struct Inner {
    credential: Credential,
    token: CancellationToken,
    requested: AtomicBool,
    bus: Bus,
}

/// Cloneable handle used by the supervisor to stop an agent.
#[derive(Clone)]
pub struct AgentControl {
    inner: Arc<Inner>,
}

impl AgentControl {
    pub(crate) fn new(credential: Credential, token: CancellationToken, bus: Bus) -> Self {
        Self {
            inner: Arc::new(Inner {
                credential,
                token,
                requested: AtomicBool::new(false),
                bus,
            }),
        }
    }

    /// Asks the agent to shut down.
    ///
    /// Returns `true` for the call that actually initiated the shutdown; every
    /// later call returns `false` and has no effect.
    pub fn shutdown(&self) -> bool {
        if self.inner.requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        let cred = &self.inner.credential;
        self.inner.bus.publish(
            Event::new(EventKind::ShutdownDirective, "shutdown requested")
                .with_agent(cred.identifier(), cred.short_id()),
        );
        self.inner.token.cancel();
        true
    }

    /// Handles a control message; returns `true` if it changed anything.
    pub fn deliver(&self, msg: &ControlMessage) -> bool {
        match msg {
            ControlMessage::Shutdown => self.shutdown(),
            ControlMessage::Unknown(raw) => {
                tracing::debug!(
                    agent = %self.inner.credential.short_id(),
                    message = %raw,
                    "ignoring unknown control message"
                );
                false
            }
        }
    }

    /// True once a shutdown was requested through this handle.
    pub fn is_shutdown_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// The credential this agent runs for.
    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}
