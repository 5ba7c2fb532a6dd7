use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::AgentError;

/// Classifies a failure as rate limiting.
pub trait Throttled {
    /// True when the remote service rejected the call because of its rate limit.
    fn is_throttled(&self) -> bool;
}

impl Throttled for AgentError {
    fn is_throttled(&self) -> bool {
        self.is_throttle()
    }
}

/// Marker returned when a queued call is abandoned because of shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for AgentError {
    fn from(_: Cancelled) -> Self {
        AgentError::ShutdownInProgress
    }
}

/// Timing knobs of the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Minimum time between the completion of one dispatch and the start of the next.
    pub request_delay: Duration,
    /// Throttle retries before the failure is surfaced.
    pub max_retries: u32,
    /// Retry `n` (0-based) waits `2^n × retry_base`.
    pub retry_base: Duration,
    /// Pause held after every final outcome before the next head is considered.
    pub settle_delay: Duration,
}

impl Default for QueueConfig {
    /// `request_delay = 1s`, `max_retries = 3`, `retry_base = 1s`, `settle_delay = 50ms`.
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            max_retries: 3,
            retry_base: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(50),
        }
    }
}

/// FIFO queue with a single in-flight dispatch and throttle-aware retries.
///
/// ### Rules
/// - Requests dispatch in submission order (the gate is a fair mutex).
/// - Fresh requests start no sooner than `request_delay` after the previous completion.
/// - A throttled request keeps its place at the head and is re-dispatched after its
///   own backoff only; nothing else runs in between.
/// - Dropping a `submit` future (e.g. on shutdown) releases the gate; a dispatch
///   that was in flight still counts as completed for spacing purposes.
pub struct RateLimitedQueue {
    cfg: QueueConfig,
    gate: Mutex<Gate>,
    pending: AtomicUsize,
    dispatched: AtomicU64,
}

#[derive(Default)]
struct Gate {
    last_completed: Option<Instant>,
}

impl RateLimitedQueue {
    pub fn new(cfg: QueueConfig) -> Self {
        Self {
            cfg,
            gate: Mutex::new(Gate::default()),
            pending: AtomicUsize::new(0),
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.cfg
    }

    /// Requests waiting for or holding the gate.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Total dispatches (retries included) since creation.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Delay before throttle retry `retry_count` (0-based).
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.cfg.retry_base.saturating_mul(factor)
    }

    /// Runs `call` under the queue discipline and returns its final outcome.
    ///
    /// `call` is invoked once per dispatch, so it must build a fresh future each time.
    pub async fn submit<T, E, F, Fut>(&self, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Throttled,
    {
        let _pending = PendingGuard::enter(&self.pending);
        let mut slot = Slot {
            gate: self.gate.lock().await,
            in_flight: false,
        };

        if let Some(last) = slot.gate.last_completed {
            time::sleep_until(last + self.cfg.request_delay).await;
        }

        let mut retry_count: u32 = 0;
        let outcome = loop {
            slot.in_flight = true;
            let res = call().await;
            self.dispatched.fetch_add(1, Ordering::Relaxed);

            match res {
                Err(e) if e.is_throttled() && retry_count < self.cfg.max_retries => {
                    let delay = self.retry_delay(retry_count);
                    retry_count += 1;
                    debug!(
                        retry = retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "throttled dispatch, retrying at head of queue"
                    );
                    time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_throttled() {
                        debug!(retries = retry_count, "throttle retries exhausted");
                    }
                    break Err(e);
                }
                Ok(v) => break Ok(v),
            }
        };

        slot.complete();
        time::sleep(self.cfg.settle_delay).await;
        outcome
    }

    /// Like [`submit`](Self::submit), but gives up as soon as `token` is cancelled.
    ///
    /// A cancelled wait is reported as `E::from(Cancelled)`; for [`AgentError`]
    /// that is [`AgentError::ShutdownInProgress`].
    pub async fn submit_until_cancelled<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        call: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Throttled + From<Cancelled>,
    {
        if token.is_cancelled() {
            return Err(E::from(Cancelled));
        }
        tokio::select! {
            res = self.submit(call) => res,
            _ = token.cancelled() => Err(E::from(Cancelled)),
        }
    }
}

impl Default for RateLimitedQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

/// Exclusive dispatch right; records completion even when dropped mid-call.
struct Slot<'a> {
    gate: MutexGuard<'a, Gate>,
    in_flight: bool,
}

impl Slot<'_> {
    fn complete(&mut self) {
        self.gate.last_completed = Some(Instant::now());
        self.in_flight = false;
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        if self.in_flight {
            self.complete();
        }
    }
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
