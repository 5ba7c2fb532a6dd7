//! # Example: simulated_fleet
//!
//! Runs three agents against an in-memory session service that throttles,
//! drops sessions at random and rejects one credential outright.
//!
//! Shows how to:
//! - Implement [`SessionClient`] / [`SessionLink`] / [`SessionFactory`].
//! - Wire the built-in [`LogWriter`] and a custom [`Subscribe`] into the supervisor.
//! - Read the status snapshot an HTTP health endpoint would serve.
//!
//! ## Flow
//! ```text
//! Supervisor::run()
//!     ├─► agent …0000  (t=0)  ─► login ─► join ─► ready ─► dropped ─► reconnect ...
//!     ├─► agent …0001  (t=2s) ─► login throttled ─► retry 60s later
//!     └─► agent …0002  (t=4s) ─► credential rejected ─► retired
//! Ctrl-C ─► shutdown directive to every agent ─► drained within grace
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=sessionvisor=debug cargo run --example simulated_fleet
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sessionvisor::{
    AgentError, Credential, Event, EventKind, LogWriter, SessionClient, SessionFactory,
    SessionLink, SessionTarget, Subscribe, Supervisor, SupervisorConfig,
};
use tracing::{error, info};

/// Counts respawns and circuit trips.
#[derive(Default)]
struct FleetStats {
    respawns: AtomicU32,
    circuits: AtomicU32,
}

#[async_trait]
impl Subscribe for FleetStats {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::RespawnScheduled => {
                self.respawns.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::CircuitOpen => {
                self.circuits.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "fleet-stats"
    }
}

struct FlakyService;

struct FlakyClient {
    credential: Credential,
    logins: AtomicU32,
}

struct FlakyLink {
    lifetime: Duration,
}

impl SessionFactory for FlakyService {
    fn client(&self, credential: &Credential) -> Box<dyn SessionClient> {
        Box::new(FlakyClient {
            credential: credential.clone(),
            logins: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SessionClient for FlakyClient {
    async fn login(&self) -> Result<(), AgentError> {
        tokio::time::sleep(Duration::from_millis(120)).await;
        let n = self.logins.fetch_add(1, Ordering::Relaxed);
        match self.credential.identifier() {
            "1002" => Err(AgentError::invalid_credential("401 unauthorized")),
            "1001" if n == 0 => Err(AgentError::Throttled {
                retry_after: Some(Duration::from_secs(60)),
            }),
            _ => Ok(()),
        }
    }

    async fn resolve(&self, target: &SessionTarget) -> Result<(), AgentError> {
        if target.channel_id.is_empty() {
            return Err(AgentError::not_found("channel"));
        }
        Ok(())
    }

    async fn join(&self, _target: &SessionTarget) -> Result<Box<dyn SessionLink>, AgentError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        if rand::rng().random_bool(0.2) {
            return Err(AgentError::transport("handshake timed out"));
        }
        let secs = rand::rng().random_range(15..45);
        Ok(Box::new(FlakyLink {
            lifetime: Duration::from_secs(secs),
        }))
    }

    async fn logout(&self) {
        info!(agent = %self.credential.short_id(), "logged out");
    }
}

#[async_trait]
impl SessionLink for FlakyLink {
    fn send_control_payload(&mut self, payload: &[u8]) -> bool {
        serde_json::from_slice::<serde_json::Value>(payload).is_ok()
    }

    async fn closed(&mut self) -> AgentError {
        tokio::time::sleep(self.lifetime).await;
        AgentError::transport("socket closed by peer")
    }

    async fn teardown(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let stats = Arc::new(FleetStats::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), stats.clone()];
    let sup = Supervisor::builder(SupervisorConfig::default())
        .with_subscribers(subs)
        .build();

    let status = sup.status();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(15));
        loop {
            tick.tick().await;
            match serde_json::to_string(&status.snapshot()) {
                Ok(json) => info!(status = %json, "health"),
                Err(e) => error!("status encode failed: {e}"),
            }
        }
    });

    let credentials: Vec<Credential> = (0..3)
        .map(|i| Credential::new(format!("{}", 1000 + i), format!("demo-token-{i:04}")))
        .collect();
    let target = SessionTarget::new("guild-1", "voice-1");

    match sup.run(credentials, target, Arc::new(FlakyService)).await {
        Ok(report) => {
            info!(
                spawned = report.spawned,
                restarts = report.restarts,
                respawns_seen = stats.respawns.load(Ordering::Relaxed),
                circuits = stats.circuits.load(Ordering::Relaxed),
                "fleet stopped"
            );
            std::process::exit(report.exit_code());
        }
        Err(e) => {
            error!("fatal: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
