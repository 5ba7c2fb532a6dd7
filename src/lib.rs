//! # sessionvisor
//!
//! **Sessionvisor** supervises a fleet of long-lived session agents, one per
//! credential, against a remote service that rate-limits its clients.
//!
//! It spawns agents with a fixed stagger, funnels their outbound calls through a
//! shared rate-limited queue, reconnects lost sessions with exponential backoff,
//! respawns crashed agents behind a circuit breaker, and shuts the whole fleet
//! down within a bounded grace period.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Credential  │   │  Credential  │   │  Credential  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ t=0              ▼ t=stagger        ▼ t=2×stagger
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single loop)                                         │
//! │  - Registry (AgentHandle per credential)                          │
//! │  - RespawnPolicy (jittered delay + circuit breaker)               │
//! │  - ShutdownCoordinator (flag, signals, grace)                     │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ AgentRuntime │   │ AgentRuntime │   │ AgentRuntime │   │
//!     │ (state mach.)│   │ (state mach.)│   │ (state mach.)│   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ login / join     │                  │                 │
//!      ▼                  ▼                  ▼                 │
//! ┌───────────────────────────────────────────────────────┐    │
//! │ RateLimitedQueue (FIFO, 1 in flight, throttle retry)  │    │
//! └───────────────────────────────────────────────────────┘    │
//!      │ events           │                  │                 │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Agent lifecycle
//! ```text
//! Idle ─► LoggingIn ─► Connecting ─► Ready
//!            │  ▲          │  ▲        │
//!            └──┘ retry    ▼  │        ▼
//!                      Reconnecting ◄──┘ session lost
//!
//! any state ─► Destroyed (shutdown, rejected credential, retries exhausted)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                               |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------------|
//! | **Supervision**   | Staggered start, respawn, circuit breaker, graceful shutdown. | [`Supervisor`], [`ShutdownCoordinator`]          |
//! | **Agents**        | One task per credential driving a connection state machine.   | [`AgentRuntime`], [`ConnectionStateMachine`]     |
//! | **Rate limiting** | Shared FIFO queue with spacing and throttle retries.          | [`RateLimitedQueue`]                             |
//! | **Transport**     | Capability traits the session protocol is plugged in through. | [`SessionClient`], [`SessionLink`]               |
//! | **Policies**      | Reconnect, login, respawn and jitter knobs.                   | [`ReconnectPolicy`], [`RespawnPolicy`]           |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, alerts).          | [`Subscribe`]                                    |
//! | **Configuration** | Runtime settings and the external fleet document.             | [`SupervisorConfig`], [`FleetConfig`]            |
//! | **Errors**        | Typed errors for the runtime, agents and configuration.       | [`RuntimeError`], [`AgentError`], [`ConfigError`]|
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use sessionvisor::{FleetConfig, SessionFactory, Subscribe, Supervisor};
//!
//! async fn serve(raw: &str, factory: Arc<dyn SessionFactory>) -> Result<i32, Box<dyn std::error::Error>> {
//!     let fleet = FleetConfig::from_json(raw)?;
//!     let loaded = fleet.credentials();
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(sessionvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(fleet.supervisor_config())
//!         .with_subscribers(subs)
//!         .build();
//!     let report = sup.run(loaded.valid, fleet.target(), factory).await?;
//!     Ok(report.exit_code())
//! }
//! ```

mod agent;
mod config;
mod core;
mod credentials;
mod error;
mod events;
mod policies;
mod queue;
mod session;
mod subscribers;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use agent::{AgentControl, AgentDeps, AgentExit, AgentRuntime, ControlMessage};
pub use config::{AgentConfig, FleetConfig, JitterConfig, LoadedCredentials, SupervisorConfig, TokenEntry};
pub use crate::core::{
    FleetReport, ShutdownCoordinator, StatusHandle, StatusSnapshot, Supervisor,
    SupervisorBuilder,
};
pub use credentials::{Credential, PresenceStatus, TokenRejection, validate_token};
pub use error::{AgentError, ConfigError, RuntimeError};
pub use events::{Bus, Event, EventKind, LogRecord};
pub use policies::{
    BackoffPolicy, JitterPolicy, JitterRange, LoginPolicy, RECONNECT_DELAY_CAP, RECONNECT_JITTER,
    ReconnectPolicy, RespawnPolicy,
};
pub use queue::{Cancelled, QueueConfig, RateLimitedQueue, Throttled};
pub use session::{
    ConnectionState, ConnectionStateMachine, ExitReason, PresencePayload, SessionClient,
    SessionFactory, SessionLink, SessionTarget, Termination,
};
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
pub use subscribers::{Subscribe, SubscriberSet};
