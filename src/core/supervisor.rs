//! # Supervisor: staggered spawning, respawn with a circuit breaker, graceful shutdown.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the shared
//! [`RateLimitedQueue`] and a [`ShutdownCoordinator`]. [`Supervisor::run`] starts
//! one [`AgentRuntime`] per credential and reacts to their exits until either
//! shutdown is requested or no credential is left to run.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<Credential> + SessionTarget + SessionFactory
//!
//! Preparation:
//!   - de-duplicate credentials by identifier (empty → RuntimeError::NoCredentials)
//!   - subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   - optional OS signal listener ─► coordinator.trigger()
//!
//! Single loop (owns the registry, nothing else touches it):
//!   timers.join_next()  ─► spawn AgentRuntime (staggered start or respawn)
//!   agents.join_next()  ─► on_exit(AgentExit)
//!                           ├─ Shutdown           ─► remove handle
//!                           ├─ InvalidCredential  ─► AgentRetired, remove handle
//!                           └─ other              ─► restart_count += 1
//!                                                    ├─ breaker tripped ─► CircuitOpen, remove
//!                                                    └─ RespawnScheduled ─► timer(delay)
//!   events.recv()       ─► registry.observe(&Event)  (current_state tracking)
//!   coordinator token   ─► shutdown path
//!
//! Shutdown path:
//!   Bus.publish(ShutdownRequested)
//!   └─► abort pending timers, drop handles that are not running
//!   └─► deliver ControlMessage::Shutdown to every running agent
//!   └─► coordinator.enforce_grace(drain):
//!          ├─ Ok (all joined)  → Bus.publish(AllStoppedWithin)
//!          └─ grace elapsed    → Bus.publish(GraceExceeded), abort the rest,
//!                                RuntimeError::GraceExceeded { stuck }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::registry::Registry;
use super::report::FleetReport;
use super::shutdown::ShutdownCoordinator;
use super::status::StatusHandle;
use crate::agent::{AgentDeps, AgentExit, AgentRuntime, ControlMessage};
use crate::config::SupervisorConfig;
use crate::credentials::Credential;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::RateLimitedQueue;
use crate::session::{ExitReason, SessionFactory, SessionTarget};
use crate::subscribers::SubscriberSet;

/// Coordinates agents, event delivery (via [`SubscriberSet`]) and graceful shutdown.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    coordinator: Arc<ShutdownCoordinator>,
    queue: Arc<RateLimitedQueue>,
    status: StatusHandle,
    handle_signals: bool,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        coordinator: Arc<ShutdownCoordinator>,
        queue: Arc<RateLimitedQueue>,
        status: StatusHandle,
        handle_signals: bool,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            coordinator,
            queue,
            status,
            handle_signals,
        }
    }

    /// Read-only status for a health endpoint.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// The coordinator driving this supervisor's shutdown.
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// The event bus; subscribe here to observe the raw event stream.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The request queue shared by all agents.
    pub fn queue(&self) -> &Arc<RateLimitedQueue> {
        &self.queue
    }

    /// Supervises `credentials` until shutdown or until every credential is gone.
    ///
    /// Returns [`RuntimeError::NoCredentials`] if nothing is left after
    /// de-duplication and [`RuntimeError::GraceExceeded`] if agents outlive the
    /// grace period after a shutdown request.
    pub async fn run(
        &self,
        credentials: Vec<Credential>,
        target: SessionTarget,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<FleetReport, RuntimeError> {
        let credentials = dedup(credentials);
        if credentials.is_empty() {
            return Err(RuntimeError::NoCredentials);
        }

        if self.handle_signals {
            self.coordinator.listen_for_signals()?;
        }
        let events = self.bus.subscribe();
        let listener_done = CancellationToken::new();
        let listener = self.subscriber_listener(listener_done.clone());

        let mut fleet = FleetRun {
            sup: self,
            target,
            deps: AgentDeps {
                factory,
                queue: Arc::clone(&self.queue),
                bus: self.bus.clone(),
            },
            registry: Registry::default(),
            agents: JoinSet::new(),
            timers: JoinSet::new(),
            report: FleetReport::default(),
        };
        fleet.schedule_initial(credentials);
        let res = fleet.drive(events).await;

        listener_done.cancel();
        let _ = listener.await;
        res
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    ///
    /// When `done` fires, whatever is still buffered is forwarded before the task ends.
    fn subscriber_listener(&self, done: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = done.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
        })
    }
}

/// Keeps the first credential of every identifier.
fn dedup(credentials: Vec<Credential>) -> Vec<Credential> {
    let mut seen = HashSet::new();
    credentials
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.identifier().to_string());
            if !fresh {
                tracing::warn!(agent = %c.short_id(), "duplicate credential ignored");
            }
            fresh
        })
        .collect()
}

/// State of one `run` call. Lives on the supervisor's task only.
struct FleetRun<'a> {
    sup: &'a Supervisor,
    target: SessionTarget,
    deps: AgentDeps,
    registry: Registry,
    agents: JoinSet<AgentExit>,
    /// Staggered starts and respawns; each yields the identifier to spawn.
    timers: JoinSet<String>,
    report: FleetReport,
}

impl FleetRun<'_> {
    fn schedule_initial(&mut self, credentials: Vec<Credential>) {
        for (index, credential) in credentials.into_iter().enumerate() {
            let id = credential.identifier().to_string();
            if self.registry.schedule(credential) {
                self.start_timer(id, self.sup.cfg.stagger_for(index));
            }
        }
    }

    fn start_timer(&mut self, id: String, delay: std::time::Duration) {
        self.timers.spawn(async move {
            time::sleep(delay).await;
            id
        });
    }

    async fn drive(
        &mut self,
        mut events: broadcast::Receiver<Event>,
    ) -> Result<FleetReport, RuntimeError> {
        let shutdown = self.sup.coordinator.token();

        while !self.registry.is_empty() {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return self.shutdown().await;
                }
                Some(res) = self.agents.join_next() => self.on_joined(res),
                Some(res) = self.timers.join_next() => match res {
                    Ok(id) => self.spawn(&id),
                    Err(err) => tracing::debug!(error = %err, "spawn timer cancelled"),
                },
                msg = events.recv() => match msg {
                    Ok(ev) => self.registry.observe(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "supervisor lagged behind agent events");
                    }
                    Err(RecvError::Closed) => {}
                },
            }
        }

        tracing::warn!("no agents left to supervise");
        Ok(std::mem::take(&mut self.report))
    }

    /// Starts the agent for `id` if it is still registered and not running.
    fn spawn(&mut self, id: &str) {
        if self.sup.coordinator.is_shutting_down() {
            return;
        }
        let Some(handle) = self.registry.get(id) else {
            return;
        };
        if handle.running {
            return;
        }
        let credential = handle.credential.clone();
        let restarts = handle.restart_count;

        let runtime = AgentRuntime::new(
            credential.clone(),
            self.target.clone(),
            self.sup.cfg.agent,
            self.deps.clone(),
            self.sup.coordinator.token().child_token(),
        );
        let control = runtime.start(&mut self.agents);
        self.registry.attach(id, control);
        self.report.spawned += 1;
        self.sync_status();

        tracing::debug!(agent = %credential.short_id(), restarts, "agent spawned");
        self.sup.bus.publish(
            Event::new(EventKind::AgentSpawned, format!("agent started (restarts: {restarts})"))
                .with_agent(credential.identifier(), credential.short_id())
                .with_attempt(restarts),
        );
    }

    fn on_joined(&mut self, res: Result<AgentExit, JoinError>) {
        match res {
            Ok(exit) => self.on_exit(exit),
            Err(err) => tracing::error!(error = %err, "agent task failed to join"),
        }
    }

    fn on_exit(&mut self, exit: AgentExit) {
        let sup = self.sup;
        sup.bus.publish(
            Event::new(
                EventKind::AgentExited,
                format!("agent exited with code {}: {}", exit.exit_code(), exit.reason),
            )
            .with_agent(exit.agent.as_str(), exit.short_id.as_str())
            .with_reason(exit.reason.as_label()),
        );

        let shutting_down = sup.coordinator.is_shutting_down();
        let policy = &sup.cfg.respawn;
        let Some(handle) = self.registry.detach(&exit) else {
            return;
        };

        if shutting_down || exit.reason == ExitReason::Shutdown {
            self.registry.remove(&exit.agent);
            self.report.stopped.push(exit.short_id);
            self.sync_status();
            return;
        }

        if let ExitReason::InvalidCredential(why) = &exit.reason {
            tracing::warn!(agent = %exit.short_id, reason = %why, "credential retired");
            sup.bus.publish(
                Event::new(EventKind::AgentRetired, format!("credential retired: {why}"))
                    .with_agent(exit.agent.as_str(), exit.short_id.as_str())
                    .with_reason(exit.reason.as_label()),
            );
            self.registry.remove(&exit.agent);
            self.report.retired.push(exit.short_id);
            self.sync_status();
            return;
        }

        handle.consecutive_failures = if exit.reached_ready {
            1
        } else {
            handle.consecutive_failures.saturating_add(1)
        };
        let failures = handle.consecutive_failures;

        if policy.is_tripped(failures) {
            tracing::error!(agent = %exit.short_id, failures, "circuit breaker open");
            sup.bus.publish(
                Event::new(
                    EventKind::CircuitOpen,
                    format!("{failures} consecutive failures; not respawning"),
                )
                .with_agent(exit.agent.as_str(), exit.short_id.as_str())
                .with_attempt(failures)
                .with_reason(exit.reason.as_label()),
            );
            self.registry.remove(&exit.agent);
            self.report.circuit_open.push(exit.short_id);
            self.sync_status();
            return;
        }

        handle.restart_count = handle.restart_count.saturating_add(1);
        let restarts = handle.restart_count;
        let delay = policy.next_delay();
        self.report.restarts += 1;

        sup.bus.publish(
            Event::new(
                EventKind::RespawnScheduled,
                format!("respawn #{restarts} in {delay:?}"),
            )
            .with_agent(exit.agent.as_str(), exit.short_id.as_str())
            .with_attempt(restarts)
            .with_delay(delay)
            .with_reason(exit.reason.as_label()),
        );
        self.start_timer(exit.agent, delay);
        self.sync_status();
    }

    /// Shutdown path: directive fan-out, bounded drain, forced abort on expiry.
    async fn shutdown(&mut self) -> Result<FleetReport, RuntimeError> {
        let coordinator = Arc::clone(&self.sup.coordinator);
        self.report.shutdown_requested = true;
        self.sup.bus.publish(Event::new(
            EventKind::ShutdownRequested,
            format!("shutting down {} agents", self.registry.running_count()),
        ));

        self.timers.abort_all();
        self.registry.prune_idle();
        for control in self.registry.controls() {
            control.deliver(&ControlMessage::Shutdown);
        }

        let drained = coordinator
            .enforce_grace(async {
                while let Some(res) = self.agents.join_next().await {
                    self.on_joined(res);
                }
            })
            .await;

        match drained {
            Ok(()) => {
                self.sup.bus.publish(Event::new(
                    EventKind::AllStoppedWithin,
                    "all agents stopped within grace",
                ));
                Ok(std::mem::take(&mut self.report))
            }
            Err(_elapsed) => {
                let grace = coordinator.grace();
                let stuck = self.registry.stuck();
                self.sup.bus.publish(
                    Event::new(
                        EventKind::GraceExceeded,
                        format!("grace {grace:?} exceeded; forcing termination"),
                    )
                    .with_reason(stuck.join(",")),
                );
                self.agents.abort_all();
                while self.agents.join_next().await.is_some() {}
                self.registry.prune_idle();
                self.sync_status_to(0);
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    fn sync_status(&self) {
        self.sync_status_to(self.registry.running_count());
    }

    fn sync_status_to(&self, n: usize) {
        self.sup.status.set_agent_count(n);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::config::SupervisorConfig;
    use crate::error::AgentError;
    use crate::policies::RespawnPolicy;
    use crate::queue::QueueConfig;
    use crate::test_support::{FakeFactory, agent_cfg, credential, script};

    fn cfg() -> SupervisorConfig {
        SupervisorConfig {
            stagger: Duration::from_secs(2),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            respawn: RespawnPolicy {
                choices: vec![Duration::from_secs(5)],
                max_exponent: 0,
                ceiling: 3,
            },
            queue: QueueConfig {
                request_delay: Duration::ZERO,
                max_retries: 0,
                retry_base: Duration::ZERO,
                settle_delay: Duration::ZERO,
            },
            agent: agent_cfg(0, 0),
        }
    }

    fn supervisor(cfg: SupervisorConfig) -> Supervisor {
        Supervisor::builder(cfg).handle_signals(false).build()
    }

    fn target() -> SessionTarget {
        SessionTarget::new("g", "c")
    }

    #[tokio::test(start_paused = true)]
    async fn no_credentials_is_an_error() {
        let sup = supervisor(cfg());
        let res = sup
            .run(Vec::new(), target(), Arc::new(FakeFactory::default()))
            .await;
        assert!(matches!(res, Err(RuntimeError::NoCredentials)));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_credentials_run_once() {
        let factory = Arc::new(FakeFactory::default());
        let sup = supervisor(cfg());
        let coordinator = sup.coordinator();
        let status = sup.status();

        let stopper = tokio::spawn(async move {
            time::sleep(Duration::from_secs(5)).await;
            assert_eq!(status.agent_count(), 1);
            coordinator.trigger();
        });
        let report = sup
            .run(
                vec![credential("1"), credential("1")],
                target(),
                factory.clone(),
            )
            .await
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(report.spawned, 1);
        assert_eq!(factory.clients_built.load(Ordering::SeqCst), 1);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn agents_start_staggered() {
        let factory = Arc::new(FakeFactory::default());
        let sup = supervisor(cfg());
        let coordinator = sup.coordinator();
        let start = time::Instant::now();

        let stopper = tokio::spawn(async move {
            time::sleep(Duration::from_secs(20)).await;
            coordinator.trigger();
        });
        let creds: Vec<Credential> = (0..5).map(|i| credential(&i.to_string())).collect();
        let report = sup.run(creds, target(), factory.clone()).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(report.spawned, 5);
        for i in 0..5u64 {
            let script = factory.script(&i.to_string());
            let first = script.login_times.lock().unwrap()[0];
            assert_eq!(first - start, Duration::from_secs(2 * i));
        }
        assert_eq!(report.stopped.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_credential_is_retired_not_respawned() {
        let factory = Arc::new(FakeFactory::default().with_script(
            "1",
            script(vec![Err(AgentError::invalid_credential("401"))], vec![]),
        ));
        let sup = supervisor(cfg());
        let mut rx = sup.bus().subscribe();

        let report = sup
            .run(vec![credential("1")], target(), factory.clone())
            .await
            .unwrap();

        assert_eq!(report.retired.len(), 1);
        assert_eq!(report.spawned, 1);
        assert_eq!(report.restarts, 0);
        assert_eq!(report.exit_code(), 1);
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::AgentRetired));
        assert!(!kinds.contains(&EventKind::RespawnScheduled));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_open_the_circuit() {
        let failing = || Err(AgentError::transport("503"));
        let factory = Arc::new(FakeFactory::default().with_script(
            "1",
            script(vec![failing(), failing(), failing(), failing()], vec![]),
        ));
        let sup = supervisor(cfg());

        let start = time::Instant::now();
        let report = sup
            .run(vec![credential("1")], target(), factory.clone())
            .await
            .unwrap();

        // ceiling 3: two respawns, then the breaker opens.
        assert_eq!(report.spawned, 3);
        assert_eq!(report.restarts, 2);
        assert_eq!(report.circuit_open.len(), 1);
        assert_eq!(factory.script("1").login_calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_run_resets_the_breaker() {
        let factory = Arc::new(FakeFactory::default());
        let script = factory.script("1");
        let sup = supervisor(SupervisorConfig {
            respawn: RespawnPolicy {
                choices: vec![Duration::from_secs(5)],
                max_exponent: 0,
                ceiling: 2,
            },
            ..cfg()
        });
        let coordinator = sup.coordinator();

        // Every run reaches ready, then loses its session with no reconnect budget.
        let killer = tokio::spawn(async move {
            for _ in 0..4 {
                time::sleep(Duration::from_secs(1)).await;
                let closer = script.closers.lock().unwrap().pop();
                if let Some(closer) = closer {
                    let _ = closer.send(AgentError::transport("dropped"));
                }
                time::sleep(Duration::from_secs(5)).await;
            }
            coordinator.trigger();
        });
        let report = sup
            .run(vec![credential("1")], target(), factory.clone())
            .await
            .unwrap();
        killer.await.unwrap();

        assert!(report.circuit_open.is_empty());
        assert!(report.restarts >= 3, "restarts: {}", report.restarts);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_stagger_skips_pending_spawns() {
        let factory = Arc::new(FakeFactory::default());
        let sup = supervisor(cfg());
        let coordinator = sup.coordinator();

        let stopper = tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            coordinator.trigger();
        });
        let creds: Vec<Credential> = (0..5).map(|i| credential(&i.to_string())).collect();
        let report = sup.run(creds, target(), factory.clone()).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(report.spawned, 2);
        assert_eq!(report.stopped.len(), 2);
        assert_eq!(factory.clients_built.load(Ordering::SeqCst), 2);
        assert_eq!(sup.status().agent_count(), 0);
    }
}
