//! Error types used by the sessionvisor runtime and its agents.
//!
//! This module defines three enums:
//!
//! - [`RuntimeError`]: errors raised by the supervising runtime itself.
//! - [`AgentError`]: failures observed by a single agent while talking to the remote service.
//! - [`ConfigError`]: problems with the externally supplied fleet configuration.
//!
//! All of them provide `as_label` for logs/metrics.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the sessionvisor runtime.
///
/// These represent failures of the supervision layer, never of an individual agent.
/// Agents only ever surface to the supervisor as an exit reason plus events.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No usable credential was supplied; there is nothing to supervise.
    #[error("no valid credentials to supervise")]
    NoCredentials,

    /// Shutdown grace period was exceeded; remaining agents were force-terminated.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Short ids of the agents that did not shut down in time.
        stuck: Vec<String>,
    },

    /// Registering OS signal handlers failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sessionvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoCredentials => "runtime_no_credentials",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }

    /// Process exit code a binary embedding the runtime should use.
    ///
    /// Every runtime error is unrecoverable, so this is always `1`.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// # Failures observed by an agent.
///
/// The variants form the retry taxonomy used by the request queue and the
/// connection state machine:
///
/// | Variant             | Queue             | Login             | Session            |
/// |---------------------|-------------------|-------------------|--------------------|
/// | `Throttled`         | retried w/ backoff| retried (60s×2ⁿ)  | reconnect          |
/// | `NotFound`          | surfaced          | retried (5s×n)    | reconnect          |
/// | `InvalidCredential` | surfaced          | agent destroyed   | agent destroyed    |
/// | `Transport`         | surfaced          | retried (5s×n)    | reconnect          |
/// | `ShutdownInProgress`| surfaced          | silent abort      | silent abort       |
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The remote service rejected the call because of rate limiting.
    #[error("rate limited (retry after {retry_after:?})")]
    Throttled {
        /// Server-provided hint, if any.
        retry_after: Option<Duration>,
    },

    /// The target container or channel could not be resolved.
    #[error("{what} not found")]
    NotFound {
        /// What was missing (e.g. "guild 123", "channel 456").
        what: String,
    },

    /// The credential was rejected; retrying cannot help.
    #[error("invalid credential: {reason}")]
    InvalidCredential {
        /// The underlying reason.
        reason: String,
    },

    /// Session transport failed (socket closed, handshake failed, ...).
    #[error("transport error: {reason}")]
    Transport {
        /// The underlying reason.
        reason: String,
    },

    /// The agent is shutting down; pending retry chains are abandoned.
    #[error("shutdown in progress")]
    ShutdownInProgress,
}

impl AgentError {
    /// Shorthand for a transport failure.
    pub fn transport(reason: impl Into<String>) -> Self {
        AgentError::Transport {
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        AgentError::NotFound { what: what.into() }
    }

    /// Shorthand for a rejected credential.
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        AgentError::InvalidCredential {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sessionvisor::AgentError;
    ///
    /// let err = AgentError::Throttled { retry_after: None };
    /// assert_eq!(err.as_label(), "agent_throttled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::Throttled { .. } => "agent_throttled",
            AgentError::NotFound { .. } => "agent_not_found",
            AgentError::InvalidCredential { .. } => "agent_invalid_credential",
            AgentError::Transport { .. } => "agent_transport",
            AgentError::ShutdownInProgress => "agent_shutdown",
        }
    }

    /// True when the remote service signalled rate limiting.
    pub fn is_throttle(&self) -> bool {
        matches!(self, AgentError::Throttled { .. })
    }

    /// Indicates whether retrying the same operation may succeed.
    ///
    /// # Example
    /// ```
    /// use sessionvisor::AgentError;
    ///
    /// assert!(AgentError::transport("reset").is_retryable());
    /// assert!(!AgentError::invalid_credential("401").is_retryable());
    /// assert!(!AgentError::ShutdownInProgress.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AgentError::InvalidCredential { .. } | AgentError::ShutdownInProgress
        )
    }
}

/// # Errors in the externally supplied fleet configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for [`FleetConfig`](crate::FleetConfig).
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value the runtime cannot use.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Json(_) => "config_json",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
