//! # Shutdown coordination.
//!
//! [`ShutdownCoordinator`] owns the global "shutting down" flag and the root
//! cancellation token every agent token is derived from.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT`
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! ## Protocol
//! ```text
//! signal / trigger() ─► flag set (first call only) ─► root token cancelled
//!                                                       └─► supervisor delivers Shutdown to every agent
//! enforce_grace(drain) ─► drain finished within grace ─► Ok
//!                     └─► grace elapsed               ─► Err(Elapsed), supervisor aborts the rest
//! ```
//! A second trigger has no effect beyond the already running grace timer.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// Global shutdown flag plus grace-period enforcement.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace: Duration,
    triggered: AtomicBool,
}

impl Default for ShutdownCoordinator {
    /// Grace period of 10s.
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace,
            triggered: AtomicBool::new(false),
        }
    }

    /// Starts the shutdown. Returns `true` only for the first call.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    /// True once [`trigger`](Self::trigger) has been called. Never resets.
    pub fn is_shutting_down(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Root token; agent tokens are children of it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Runs `drain` for at most the grace period.
    pub async fn enforce_grace<F: Future>(&self, drain: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout(self.grace, drain).await
    }

    /// Installs OS signal handlers that call [`trigger`](Self::trigger).
    ///
    /// Handlers are registered before this returns, so a registration failure is
    /// reported as [`RuntimeError::Signal`]. The listener task lives until the
    /// process exits and logs repeated signals without acting on them.
    pub fn listen_for_signals(self: &Arc<Self>) -> Result<JoinHandle<()>, RuntimeError> {
        let mut signals = ShutdownSignals::install()?;
        let me = Arc::clone(self);
        Ok(tokio::spawn(async move {
            loop {
                if let Err(err) = signals.recv().await {
                    tracing::warn!(error = %err, "signal listener stopped");
                    return;
                }
                if me.trigger() {
                    tracing::info!(grace = ?me.grace, "termination signal received, shutting down");
                } else {
                    tracing::info!("termination signal received again, already shutting down");
                }
            }
        }))
    }
}

#[cfg(unix)]
struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<()> {
        tokio::select! {
            _ = self.sigint.recv()  => {},
            _ = self.sigterm.recv() => {},
            _ = self.sigquit.recv() => {},
        }
        Ok(())
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent() {
        let coord = ShutdownCoordinator::default();
        assert!(!coord.is_shutting_down());
        assert!(coord.trigger());
        assert!(!coord.trigger());
        assert!(coord.is_shutting_down());
        assert!(coord.token().is_cancelled());
    }

    #[test]
    fn child_tokens_follow_the_root() {
        let coord = ShutdownCoordinator::default();
        let child = coord.token().child_token();
        coord.trigger();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn grace_bounds_the_drain() {
        let coord = ShutdownCoordinator::new(Duration::from_secs(10));

        let quick = coord
            .enforce_grace(tokio::time::sleep(Duration::from_secs(9)))
            .await;
        assert!(quick.is_ok());

        let slow = coord
            .enforce_grace(tokio::time::sleep(Duration::from_secs(11)))
            .await;
        assert!(slow.is_err());
    }
}
