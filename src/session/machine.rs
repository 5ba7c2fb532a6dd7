//! # ConnectionStateMachine: one credential's session lifecycle.
//!
//! Drives a [`SessionClient`] through login, target resolution and handshake,
//! holds the resulting [`SessionLink`] while ready, and re-establishes it with
//! exponential backoff when it is lost.
//!
//! ## Event flow
//! ```text
//! LoginStarted ─► [LoginRetry × n] ─► LoginSucceeded ─► SessionReady
//!                                            ▲              │
//!                      ReconnectScheduled ◄──┴── ConnectFailed / SessionLost
//!
//! terminal: AgentStopped (shutdown) | AgentFatal (everything else)
//! ```
//!
//! ## Rules
//! - Transitions are strictly sequential; the machine is owned by one task.
//! - Every transition publishes **exactly one** event.
//! - The shutdown token is checked before every step and raced against every
//!   sleep and outbound call, so a scheduled retry never runs after shutdown.
//! - Login and connect calls go through the shared [`RateLimitedQueue`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::credentials::Credential;
use crate::error::AgentError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::JitterRange;
use crate::queue::RateLimitedQueue;
use crate::session::state::{ConnectionState, ExitReason, Termination};
use crate::session::transport::{PresencePayload, SessionClient, SessionLink, SessionTarget};

/// Per-agent session state, passed by ownership into [`run`](Self::run).
pub struct ConnectionStateMachine {
    state: ConnectionState,
    credential: Credential,
    target: SessionTarget,
    cfg: AgentConfig,
    client: Box<dyn SessionClient>,
    link: Option<Box<dyn SessionLink>>,
    queue: Arc<RateLimitedQueue>,
    bus: Bus,
    shutdown: CancellationToken,
    login_retries: u32,
    reconnect_attempts: u32,
    reached_ready: bool,
}

/// Result of one step: keep going, or destroy with a reason.
type Step = Result<(), ExitReason>;

impl ConnectionStateMachine {
    pub fn new(
        credential: Credential,
        target: SessionTarget,
        cfg: AgentConfig,
        client: Box<dyn SessionClient>,
        queue: Arc<RateLimitedQueue>,
        bus: Bus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: ConnectionState::Idle,
            credential,
            target,
            cfg,
            client,
            link: None,
            queue,
            bus,
            shutdown,
            login_retries: 0,
            reconnect_attempts: 0,
            reached_ready: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the lifecycle until the machine reaches [`ConnectionState::Destroyed`].
    pub async fn run(mut self) -> Termination {
        let reason = self.drive().await;

        if let Some(mut link) = self.link.take() {
            link.teardown().await;
        }
        self.client.logout().await;
        self.destroy(&reason);

        Termination {
            reason,
            reached_ready: self.reached_ready,
        }
    }

    async fn drive(&mut self) -> ExitReason {
        if self.shutdown.is_cancelled() {
            return ExitReason::Shutdown;
        }
        self.enter(
            ConnectionState::LoggingIn,
            EventKind::LoginStarted,
            "logging in".to_string(),
        );

        loop {
            if self.shutdown.is_cancelled() {
                return ExitReason::Shutdown;
            }
            let step = match self.state {
                ConnectionState::LoggingIn => self.login().await,
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Ready => self.hold().await,
                ConnectionState::Reconnecting => self.reconnect().await,
                ConnectionState::Idle | ConnectionState::Destroyed => Err(ExitReason::Shutdown),
            };
            if let Err(reason) = step {
                return reason;
            }
        }
    }

    /// LoggingIn → Connecting | LoggingIn (retry) | Destroyed.
    async fn login(&mut self) -> Step {
        pause(&self.shutdown, self.cfg.jitter.pre_login).await?;

        let client = &*self.client;
        let res = self
            .queue
            .submit_until_cancelled(&self.shutdown, move || client.login())
            .await;

        let err = match res {
            Ok(()) => {
                self.login_retries = 0;
                self.enter(
                    ConnectionState::Connecting,
                    EventKind::LoginSucceeded,
                    "logged in".to_string(),
                );
                return Ok(());
            }
            Err(err) => err,
        };

        match err {
            AgentError::ShutdownInProgress => Err(ExitReason::Shutdown),
            AgentError::InvalidCredential { reason } => Err(ExitReason::InvalidCredential(reason)),
            err => {
                self.login_retries += 1;
                if self.login_retries > self.cfg.login.max_retries {
                    return Err(ExitReason::LoginExhausted);
                }
                let delay = self.cfg.login.delay(self.login_retries, err.is_throttle());
                let ev = self
                    .event(
                        EventKind::LoginRetry,
                        format!(
                            "login failed ({err}); retry {}/{} in {delay:?}",
                            self.login_retries, self.cfg.login.max_retries
                        ),
                    )
                    .with_attempt(self.login_retries)
                    .with_delay(delay)
                    .with_reason(err.as_label());
                self.transition(ConnectionState::LoggingIn);
                self.bus.publish(ev.with_state(self.state));
                sleep(&self.shutdown, delay).await
            }
        }
    }

    /// Connecting → Ready | Reconnecting | Destroyed.
    async fn connect(&mut self) -> Step {
        pause(&self.shutdown, self.cfg.jitter.pre_connect).await?;

        let client = &*self.client;
        let target = &self.target;
        let res = self
            .queue
            .submit_until_cancelled(&self.shutdown, move || async move {
                client.resolve(target).await?;
                client.join(target).await
            })
            .await;

        match res {
            Ok(mut link) => {
                if let Err(err) = self.announce(link.as_mut()) {
                    link.teardown().await;
                    return self.lose(EventKind::ConnectFailed, err);
                }
                self.link = Some(link);
                self.reconnect_attempts = 0;
                self.reached_ready = true;
                let msg = format!(
                    "session ready in {}/{}",
                    self.target.container_id, self.target.channel_id
                );
                self.enter(ConnectionState::Ready, EventKind::SessionReady, msg);
                Ok(())
            }
            Err(err) => self.lose(EventKind::ConnectFailed, err),
        }
    }

    /// Ready → Reconnecting | Destroyed. Waits for session loss or shutdown.
    async fn hold(&mut self) -> Step {
        let Some(link) = self.link.as_mut() else {
            return self.lose(
                EventKind::SessionLost,
                AgentError::transport("no session link"),
            );
        };

        let cause = tokio::select! {
            cause = link.closed() => cause,
            _ = self.shutdown.cancelled() => return Err(ExitReason::Shutdown),
        };

        if let Some(mut link) = self.link.take() {
            link.teardown().await;
        }
        self.lose(EventKind::SessionLost, cause)
    }

    /// Reconnecting → Connecting (after backoff) | Destroyed.
    async fn reconnect(&mut self) -> Step {
        let policy = self.cfg.reconnect;
        if !policy.allows(self.reconnect_attempts) {
            return Err(ExitReason::ReconnectExhausted);
        }
        self.reconnect_attempts += 1;
        let delay = policy.delay(self.reconnect_attempts);

        let ev = self
            .event(
                EventKind::ReconnectScheduled,
                format!(
                    "reconnect {}/{} in {delay:?}",
                    self.reconnect_attempts, policy.max_attempts
                ),
            )
            .with_attempt(self.reconnect_attempts)
            .with_delay(delay);
        self.bus.publish(ev);

        sleep(&self.shutdown, delay).await?;
        self.transition(ConnectionState::Connecting);
        Ok(())
    }

    /// Routes a failure observed while connecting or connected.
    fn lose(&mut self, kind: EventKind, err: AgentError) -> Step {
        match err {
            AgentError::ShutdownInProgress => Err(ExitReason::Shutdown),
            AgentError::InvalidCredential { reason } => Err(ExitReason::InvalidCredential(reason)),
            err => {
                let label = err.as_label();
                let msg = match kind {
                    EventKind::SessionLost => format!("session lost: {err}"),
                    _ => format!("connect failed: {err}"),
                };
                let ev = self
                    .event(kind, msg)
                    .with_reason(label)
                    .with_attempt(self.reconnect_attempts);
                self.transition(ConnectionState::Reconnecting);
                self.bus.publish(ev.with_state(self.state));
                Ok(())
            }
        }
    }

    /// Sends the desired presence over a fresh link.
    fn announce(&self, link: &mut dyn SessionLink) -> Result<(), AgentError> {
        let payload = PresencePayload::for_credential(&self.credential, &self.target);
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| AgentError::transport(format!("encode presence: {e}")))?;
        if link.send_control_payload(&bytes) {
            Ok(())
        } else {
            Err(AgentError::transport("presence update rejected"))
        }
    }

    /// Any → Destroyed; publishes the terminal event.
    fn destroy(&mut self, reason: &ExitReason) {
        let kind = match reason {
            ExitReason::Shutdown => EventKind::AgentStopped,
            _ => EventKind::AgentFatal,
        };
        let ev = self
            .event(kind, reason.to_string())
            .with_reason(reason.as_label());
        self.transition(ConnectionState::Destroyed);
        self.bus.publish(ev.with_state(self.state));
    }

    fn enter(&mut self, next: ConnectionState, kind: EventKind, message: String) {
        self.transition(next);
        let ev = self.event(kind, message);
        self.bus.publish(ev);
    }

    fn transition(&mut self, next: ConnectionState) {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                agent = %self.credential.short_id(),
                from = %self.state,
                to = %next,
                "illegal connection state transition"
            );
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }
        self.state = next;
    }

    fn event(&self, kind: EventKind, message: String) -> Event {
        Event::new(kind, message)
            .with_agent(self.credential.identifier(), self.credential.short_id())
            .with_state(self.state)
    }
}

/// Sleeps for a random pause drawn from `range`, if any.
async fn pause(shutdown: &CancellationToken, range: Option<JitterRange>) -> Step {
    match range {
        Some(range) => sleep(shutdown, range.sample()).await,
        None => Ok(()),
    }
}

/// Sleep that ends early, with [`ExitReason::Shutdown`], when `shutdown` fires.
async fn sleep(shutdown: &CancellationToken, delay: Duration) -> Step {
    tokio::select! {
        _ = time::sleep(delay) => Ok(()),
        _ = shutdown.cancelled() => Err(ExitReason::Shutdown),
    }
}
