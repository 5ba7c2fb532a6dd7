use std::fmt;

/// Lifecycle state of one agent's session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    LoggingIn,
    Connecting,
    Ready,
    Reconnecting,
    Destroyed,
}

impl ConnectionState {
    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::LoggingIn => "logging_in",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Destroyed => "destroyed",
        }
    }

    /// A live state holds (or is acquiring) a session for its credential.
    pub fn is_live(&self) -> bool {
        !matches!(self, ConnectionState::Idle | ConnectionState::Destroyed)
    }

    /// Whether `self → next` is a legal edge.
    ///
    /// ```
    /// use sessionvisor::ConnectionState::*;
    ///
    /// assert!(LoggingIn.can_transition_to(LoggingIn));
    /// assert!(Ready.can_transition_to(Destroyed));
    /// assert!(!Ready.can_transition_to(Connecting));
    /// assert!(!Destroyed.can_transition_to(Idle));
    /// ```
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Idle, LoggingIn) => true,
            (LoggingIn, LoggingIn | Connecting) => true,
            (Connecting, Ready | Reconnecting) => true,
            (Ready, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an agent's lifecycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown directive honored.
    Shutdown,
    /// The credential was rejected; never restarted.
    InvalidCredential(String),
    /// Login retries exceeded.
    LoginExhausted,
    /// Reconnect attempts exceeded.
    ReconnectExhausted,
    /// The agent task panicked.
    Panicked(String),
}

impl ExitReason {
    /// Stable snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::Shutdown => "shutdown",
            ExitReason::InvalidCredential(_) => "invalid_credential",
            ExitReason::LoginExhausted => "login_exhausted",
            ExitReason::ReconnectExhausted => "reconnect_exhausted",
            ExitReason::Panicked(_) => "panicked",
        }
    }

    /// `0` for a shutdown exit, `1` for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::Shutdown => 0,
            _ => 1,
        }
    }

    /// Whether the supervisor may bring the agent back.
    pub fn is_restartable(&self) -> bool {
        !matches!(self, ExitReason::Shutdown | ExitReason::InvalidCredential(_))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Shutdown => f.write_str("stopped on shutdown"),
            ExitReason::InvalidCredential(why) => write!(f, "credential rejected: {why}"),
            ExitReason::LoginExhausted => f.write_str("login retries exhausted"),
            ExitReason::ReconnectExhausted => f.write_str("reconnect attempts exhausted"),
            ExitReason::Panicked(info) => write!(f, "panicked: {info}"),
        }
    }
}

/// Outcome of [`ConnectionStateMachine::run`](crate::ConnectionStateMachine::run).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Termination {
    pub reason: ExitReason,
    /// The session reached [`ConnectionState::Ready`] at least once.
    pub reached_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::*;
    use super::*;

    #[test]
    fn live_states() {
        assert!(!Idle.is_live());
        assert!(!Destroyed.is_live());
        for s in [LoggingIn, Connecting, Ready, Reconnecting] {
            assert!(s.is_live(), "{s} should be live");
        }
    }

    #[test]
    fn every_live_state_can_be_destroyed() {
        for s in [Idle, LoggingIn, Connecting, Ready, Reconnecting] {
            assert!(s.can_transition_to(Destroyed));
        }
    }

    #[test]
    fn reconnect_cycle_edges() {
        assert!(Ready.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(!Reconnecting.can_transition_to(Ready));
        assert!(!Idle.can_transition_to(Connecting));
    }

    #[test]
    fn exit_reason_restart_eligibility() {
        assert!(!ExitReason::Shutdown.is_restartable());
        assert!(!ExitReason::InvalidCredential("401".into()).is_restartable());
        assert!(ExitReason::ReconnectExhausted.is_restartable());
        assert!(ExitReason::LoginExhausted.is_restartable());
        assert_eq!(ExitReason::Shutdown.exit_code(), 0);
        assert_eq!(ExitReason::ReconnectExhausted.exit_code(), 1);
    }
}
