//! Scripted session fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::{AgentConfig, JitterConfig};
use crate::credentials::Credential;
use crate::error::AgentError;
use crate::policies::{LoginPolicy, ReconnectPolicy};
use crate::queue::{QueueConfig, RateLimitedQueue};
use crate::session::{SessionClient, SessionFactory, SessionLink, SessionTarget};

/// Scripted outcomes for one credential. Empty queues mean success.
#[derive(Default)]
pub struct Script {
    pub logins: Mutex<VecDeque<Result<(), AgentError>>>,
    pub joins: Mutex<VecDeque<Result<(), AgentError>>>,
    pub login_calls: AtomicU32,
    pub join_calls: AtomicU32,
    pub login_times: Mutex<Vec<Instant>>,
    pub teardowns: Arc<AtomicU32>,
    pub logouts: AtomicU32,
    /// Closers for established links, in join order.
    pub closers: Mutex<Vec<oneshot::Sender<AgentError>>>,
}

pub fn script(logins: Vec<Result<(), AgentError>>, joins: Vec<Result<(), AgentError>>) -> Script {
    Script {
        logins: Mutex::new(logins.into()),
        joins: Mutex::new(joins.into()),
        ..Script::default()
    }
}

pub struct FakeClient(pub Arc<Script>);

pub struct FakeLink {
    closed: Option<oneshot::Receiver<AgentError>>,
    teardowns: Arc<AtomicU32>,
}

#[async_trait]
impl SessionClient for FakeClient {
    async fn login(&self) -> Result<(), AgentError> {
        self.0.login_calls.fetch_add(1, Ordering::SeqCst);
        self.0.login_times.lock().unwrap().push(Instant::now());
        self.0.logins.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn resolve(&self, _target: &SessionTarget) -> Result<(), AgentError> {
        Ok(())
    }

    async fn join(&self, _target: &SessionTarget) -> Result<Box<dyn SessionLink>, AgentError> {
        self.0.join_calls.fetch_add(1, Ordering::SeqCst);
        self.0.joins.lock().unwrap().pop_front().unwrap_or(Ok(()))?;
        let (tx, rx) = oneshot::channel();
        self.0.closers.lock().unwrap().push(tx);
        Ok(Box::new(FakeLink {
            closed: Some(rx),
            teardowns: self.0.teardowns.clone(),
        }))
    }

    async fn logout(&self) {
        self.0.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionLink for FakeLink {
    fn send_control_payload(&mut self, payload: &[u8]) -> bool {
        serde_json::from_slice::<serde_json::Value>(payload).is_ok()
    }

    async fn closed(&mut self) -> AgentError {
        let Some(rx) = self.closed.take() else {
            return std::future::pending().await;
        };
        rx.await
            .unwrap_or_else(|_| AgentError::transport("closer dropped"))
    }

    async fn teardown(&mut self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one [`Script`] per credential identifier.
#[derive(Default)]
pub struct FakeFactory {
    scripts: Mutex<HashMap<String, Arc<Script>>>,
    pub clients_built: AtomicU32,
}

impl FakeFactory {
    pub fn with_script(self, identifier: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(identifier.to_string(), Arc::new(script));
        self
    }

    pub fn script(&self, identifier: &str) -> Arc<Script> {
        self.scripts
            .lock()
            .unwrap()
            .entry(identifier.to_string())
            .or_default()
            .clone()
    }
}

impl SessionFactory for FakeFactory {
    fn client(&self, credential: &Credential) -> Box<dyn SessionClient> {
        self.clients_built.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeClient(self.script(credential.identifier())))
    }
}

pub fn quick_queue() -> Arc<RateLimitedQueue> {
    Arc::new(RateLimitedQueue::new(QueueConfig {
        request_delay: Duration::ZERO,
        max_retries: 0,
        retry_base: Duration::ZERO,
        settle_delay: Duration::ZERO,
    }))
}

pub fn agent_cfg(max_login_retries: u32, max_attempts: u32) -> AgentConfig {
    AgentConfig {
        reconnect: ReconnectPolicy {
            max_attempts,
            base_delay: Duration::from_secs(5),
        },
        login: LoginPolicy {
            max_retries: max_login_retries,
            ..LoginPolicy::default()
        },
        jitter: JitterConfig::disabled(),
    }
}

pub fn credential(identifier: &str) -> Credential {
    Credential::new(identifier, format!("token-for-{identifier}"))
}
