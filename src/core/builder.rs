use std::sync::Arc;

use super::shutdown::ShutdownCoordinator;
use super::status::StatusHandle;
use super::supervisor::Supervisor;
use crate::{
    config::SupervisorConfig,
    events::Bus,
    queue::RateLimitedQueue,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    coordinator: Option<Arc<ShutdownCoordinator>>,
    handle_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            coordinator: None,
            handle_signals: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive every runtime event (agent transitions, respawns,
    /// shutdown progress) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses an externally owned coordinator, so callers can trigger shutdown
    /// themselves. Its grace period takes precedence over [`SupervisorConfig::grace`].
    pub fn with_coordinator(mut self, coordinator: Arc<ShutdownCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Whether [`Supervisor::run`] installs OS signal handlers (default `true`).
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Builds the supervisor: event bus, subscriber workers, shared request queue.
    ///
    /// Must be called inside a Tokio runtime (subscriber workers are spawned here).
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let coordinator = self
            .coordinator
            .unwrap_or_else(|| Arc::new(ShutdownCoordinator::new(self.cfg.grace)));
        let queue = Arc::new(RateLimitedQueue::new(self.cfg.queue));

        Supervisor::new_internal(
            self.cfg,
            bus,
            subs,
            coordinator,
            queue,
            StatusHandle::default(),
            self.handle_signals,
        )
    }
}
