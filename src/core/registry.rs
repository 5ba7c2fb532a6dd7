//! # Agent registry: the supervisor's authoritative view of the fleet.
//!
//! One [`AgentHandle`] per credential, keyed by identifier. The registry is
//! owned by the supervisor loop and never shared, so it needs no locking.
//!
//! ## Lifecycle
//! ```text
//! schedule(credential)      ─► handle inserted (running = false)
//! attach(control)           ─► running = true
//! detach(exit)              ─► running = false, exit code/time recorded
//! remove(id)                ─► shutdown exit, retired credential, circuit open
//! ```
//!
//! ## Rules
//! - At most one handle per identifier; a duplicate is refused.
//! - `restart_count` never decreases.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::agent::{AgentControl, AgentExit};
use crate::credentials::Credential;
use crate::events::Event;
use crate::session::ConnectionState;

/// Supervisor-side record for one credential.
#[derive(Clone)]
pub struct AgentHandle {
    pub credential: Credential,
    /// Control handle of the live run, if any.
    pub control: Option<AgentControl>,
    /// Last state reported by the agent's events.
    pub current_state: ConnectionState,
    /// Respawns performed so far.
    pub restart_count: u32,
    /// Abnormal exits since the last run that reached ready.
    pub consecutive_failures: u32,
    pub last_exit_code: Option<i32>,
    pub last_exit_time: Option<SystemTime>,
    pub running: bool,
}

impl AgentHandle {
    fn new(credential: Credential) -> Self {
        Self {
            credential,
            control: None,
            current_state: ConnectionState::Idle,
            restart_count: 0,
            consecutive_failures: 0,
            last_exit_code: None,
            last_exit_time: None,
            running: false,
        }
    }
}

/// Handles of every credential that is running or waiting to (re)spawn.
#[derive(Default)]
pub struct Registry {
    handles: HashMap<String, AgentHandle>,
}

impl Registry {
    /// Inserts a fresh handle; returns `false` if the identifier is already known.
    pub fn schedule(&mut self, credential: Credential) -> bool {
        let id = credential.identifier().to_string();
        if self.handles.contains_key(&id) {
            return false;
        }
        self.handles.insert(id, AgentHandle::new(credential));
        true
    }

    pub fn get(&self, id: &str) -> Option<&AgentHandle> {
        self.handles.get(id)
    }

    /// Marks the handle as running under `control`.
    pub fn attach(&mut self, id: &str, control: AgentControl) -> bool {
        match self.handles.get_mut(id) {
            Some(h) if !h.running => {
                h.control = Some(control);
                h.current_state = ConnectionState::Idle;
                h.running = true;
                true
            }
            _ => false,
        }
    }

    /// Records a finished run and returns the handle for further decisions.
    pub fn detach(&mut self, exit: &AgentExit) -> Option<&mut AgentHandle> {
        let h = self.handles.get_mut(&exit.agent)?;
        h.control = None;
        h.running = false;
        h.current_state = ConnectionState::Destroyed;
        h.last_exit_code = Some(exit.exit_code());
        h.last_exit_time = Some(SystemTime::now());
        Some(h)
    }

    pub fn remove(&mut self, id: &str) -> Option<AgentHandle> {
        self.handles.remove(id)
    }

    /// Drops every handle that is not currently running.
    pub fn prune_idle(&mut self) {
        self.handles.retain(|_, h| h.running);
    }

    /// Applies the state carried by an agent event.
    pub fn observe(&mut self, ev: &Event) {
        let (Some(agent), Some(state)) = (ev.agent.as_deref(), ev.state) else {
            return;
        };
        match self.handles.get_mut(agent) {
            Some(h) if h.running => h.current_state = state,
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn running_count(&self) -> usize {
        self.handles.values().filter(|h| h.running).count()
    }

    /// Controls of every running agent.
    pub fn controls(&self) -> Vec<AgentControl> {
        self.handles
            .values()
            .filter_map(|h| h.control.clone())
            .collect()
    }

    /// Sorted short ids of agents that are still running.
    pub fn stuck(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .handles
            .values()
            .filter(|h| h.running)
            .map(|h| h.credential.short_id().to_string())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::events::{Bus, EventKind};
    use crate::session::ExitReason;
    use crate::test_support::credential;

    fn control(cred: &Credential) -> AgentControl {
        AgentControl::new(cred.clone(), CancellationToken::new(), Bus::new(4))
    }

    fn exit(id: &str, reason: ExitReason) -> AgentExit {
        AgentExit {
            agent: id.into(),
            short_id: format!("…{id}"),
            reason,
            reached_ready: false,
        }
    }

    #[test]
    fn refuses_duplicate_identifiers() {
        let mut reg = Registry::default();
        assert!(reg.schedule(credential("1")));
        assert!(!reg.schedule(credential("1")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn attach_detach_tracks_running_and_exit_code() {
        let mut reg = Registry::default();
        let cred = credential("1");
        reg.schedule(cred.clone());

        assert!(reg.attach("1", control(&cred)));
        assert!(!reg.attach("1", control(&cred)));
        assert_eq!(reg.running_count(), 1);
        assert_eq!(reg.stuck(), vec![cred.short_id().to_string()]);

        let h = reg.detach(&exit("1", ExitReason::LoginExhausted)).unwrap();
        assert!(!h.running);
        assert!(h.control.is_none());
        assert_eq!(h.last_exit_code, Some(1));
        assert!(h.last_exit_time.is_some());
        assert_eq!(reg.running_count(), 0);
    }

    #[test]
    fn observes_state_only_for_running_agents() {
        let mut reg = Registry::default();
        let cred = credential("1");
        reg.schedule(cred.clone());
        let ev = Event::new(EventKind::SessionReady, "ready")
            .with_agent("1", cred.short_id())
            .with_state(ConnectionState::Ready);

        reg.observe(&ev);
        assert_eq!(reg.get("1").unwrap().current_state, ConnectionState::Idle);

        reg.attach("1", control(&cred));
        reg.observe(&ev);
        assert_eq!(reg.get("1").unwrap().current_state, ConnectionState::Ready);
    }

    #[test]
    fn prune_keeps_running_handles() {
        let mut reg = Registry::default();
        let a = credential("1");
        reg.schedule(a.clone());
        reg.schedule(credential("2"));
        reg.attach("1", control(&a));

        reg.prune_idle();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("1").is_some());
    }
}
