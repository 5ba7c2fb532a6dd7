//! # AgentRuntime: one credential, one task.
//!
//! Owns a [`Credential`], builds a [`SessionClient`](crate::session::SessionClient)
//! for it through the [`SessionFactory`], and drives a [`ConnectionStateMachine`]
//! to completion. The result is reported to the supervisor as an [`AgentExit`].
//!
//! ## Architecture
//! ```text
//! Supervisor ──► AgentRuntime::start(&mut JoinSet) ──► AgentControl
//!                     │
//!                     └─► run()
//!                          ├─► factory.client(&credential)
//!                          ├─► ConnectionStateMachine::run()   (events → Bus)
//!                          └─► AgentExit { reason, reached_ready }
//!
//! panic anywhere inside ──► AgentFatal event + ExitReason::Panicked
//! ```
//!
//! ## Rules
//! - The agent token is cancelled by [`AgentControl::shutdown`] or by the
//!   runtime-wide token it was derived from.
//! - All outbound login/join calls share the supervisor's [`RateLimitedQueue`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent::control::AgentControl;
use crate::config::AgentConfig;
use crate::credentials::Credential;
use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::queue::RateLimitedQueue;
use crate::session::{ConnectionStateMachine, ExitReason, SessionFactory, SessionTarget};

/// Shared collaborators every agent needs.
#[derive(Clone)]
pub struct AgentDeps {
    /// Builds the session client for a credential.
    pub factory: Arc<dyn SessionFactory>,
    /// Queue all outbound calls are funnelled through.
    pub queue: Arc<RateLimitedQueue>,
    /// Event bus.
    pub bus: Bus,
}

/// Terminal report of one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentExit {
    /// Credential identifier.
    pub agent: String,
    /// Display-safe id.
    pub short_id: String,
    pub reason: ExitReason,
    /// Whether the session was ever established during this run.
    pub reached_ready: bool,
}

impl AgentExit {
    /// `0` for a shutdown exit, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// Runs one credential's session until shutdown or a terminal failure.
pub struct AgentRuntime {
    credential: Credential,
    target: SessionTarget,
    cfg: AgentConfig,
    deps: AgentDeps,
    control: AgentControl,
}

impl AgentRuntime {
    /// Creates a runtime; `token` is the agent's own cancellation token.
    pub fn new(
        credential: Credential,
        target: SessionTarget,
        cfg: AgentConfig,
        deps: AgentDeps,
        token: CancellationToken,
    ) -> Self {
        let control = AgentControl::new(credential.clone(), token, deps.bus.clone());
        Self {
            credential,
            target,
            cfg,
            deps,
            control,
        }
    }

    /// Handle for stopping this agent.
    pub fn control(&self) -> AgentControl {
        self.control.clone()
    }

    /// Spawns [`run`](Self::run) into `set` and returns the control handle.
    pub fn start(self, set: &mut JoinSet<AgentExit>) -> AgentControl {
        let control = self.control();
        set.spawn(self.run());
        control
    }

    /// Drives the session to completion.
    pub async fn run(self) -> AgentExit {
        let Self {
            credential,
            target,
            cfg,
            deps,
            control,
        } = self;
        let span = tracing::info_span!("agent", agent = %credential.short_id());
        let token = control.token().clone();

        let session = {
            let credential = credential.clone();
            let deps = deps.clone();
            async move {
                let client = deps.factory.client(&credential);
                ConnectionStateMachine::new(
                    credential, target, cfg, client, deps.queue, deps.bus, token,
                )
                .run()
                .await
            }
        };

        let (reason, reached_ready) = match AssertUnwindSafe(session)
            .catch_unwind()
            .instrument(span)
            .await
        {
            Ok(done) => (done.reason, done.reached_ready),
            Err(payload) => {
                let info = panic_message(&*payload);
                tracing::error!(agent = %credential.short_id(), panic = %info, "agent panicked");
                let reason = ExitReason::Panicked(info);
                deps.bus.publish(
                    Event::new(EventKind::AgentFatal, reason.to_string())
                        .with_agent(credential.identifier(), credential.short_id())
                        .with_reason(reason.as_label()),
                );
                (reason, false)
            }
        };

        AgentExit {
            agent: credential.identifier().to_string(),
            short_id: credential.short_id().to_string(),
            reason,
            reached_ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::sync::broadcast;

    use super::*;
    use crate::agent::ControlMessage;
    use crate::error::AgentError;
    use crate::session::SessionClient;
    use crate::test_support::{FakeFactory, agent_cfg, credential, quick_queue, script};

    fn deps(factory: Arc<dyn SessionFactory>) -> (AgentDeps, broadcast::Receiver<Event>) {
        let bus = Bus::new(256);
        let rx = bus.subscribe();
        (
            AgentDeps {
                factory,
                queue: quick_queue(),
                bus,
            },
            rx,
        )
    }

    fn runtime(factory: Arc<dyn SessionFactory>) -> (AgentRuntime, broadcast::Receiver<Event>) {
        let (deps, rx) = deps(factory);
        let rt = AgentRuntime::new(
            credential("7"),
            SessionTarget::new("g", "c"),
            agent_cfg(3, 3),
            deps,
            CancellationToken::new(),
        );
        (rt, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_directive_stops_a_ready_agent() {
        let factory = Arc::new(FakeFactory::default());
        let (rt, mut rx) = runtime(factory.clone());
        let mut set = JoinSet::new();
        let control = rt.start(&mut set);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(control.deliver(&ControlMessage::from("shutdown")));
        assert!(!control.shutdown());

        let exit = set.join_next().await.unwrap().unwrap();
        assert_eq!(exit.reason, ExitReason::Shutdown);
        assert_eq!(exit.exit_code(), 0);
        assert!(exit.reached_ready);
        assert_eq!(exit.agent, "7");

        let script = factory.script("7");
        assert_eq!(script.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(script.logouts.load(Ordering::SeqCst), 1);

        let mut directives = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ShutdownDirective {
                directives += 1;
            }
        }
        assert_eq!(directives, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credential_exits_with_code_one() {
        let factory = Arc::new(FakeFactory::default().with_script(
            "7",
            script(vec![Err(AgentError::invalid_credential("401"))], vec![]),
        ));
        let (rt, _rx) = runtime(factory);
        let exit = rt.run().await;

        assert_eq!(exit.reason, ExitReason::InvalidCredential("401".into()));
        assert_eq!(exit.exit_code(), 1);
        assert!(!exit.reason.is_restartable());
    }

    struct PanickingFactory;

    impl SessionFactory for PanickingFactory {
        fn client(&self, _credential: &Credential) -> Box<dyn SessionClient> {
            panic!("client construction failed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panics_become_fatal_exits() {
        let (rt, mut rx) = runtime(Arc::new(PanickingFactory));
        let exit = rt.run().await;

        assert_eq!(
            exit.reason,
            ExitReason::Panicked("client construction failed".into())
        );
        assert!(exit.reason.is_restartable());
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::AgentFatal);
        assert_eq!(ev.reason.as_deref(), Some("panicked"));
    }
}
