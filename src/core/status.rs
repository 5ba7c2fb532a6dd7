//! Read-only status view for an external health endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Point-in-time health of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Always `"online"` while the supervisor process is serving.
    pub status: &'static str,
    /// Number of agents currently running.
    pub agent_count: usize,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Cloneable reader of the live agent count.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle {
    agents: Arc<AtomicUsize>,
}

impl StatusHandle {
    pub fn snapshot(&self) -> StatusSnapshot {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        StatusSnapshot {
            status: "online",
            agent_count: self.agent_count(),
            timestamp,
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.load(Ordering::Relaxed)
    }

    pub(crate) fn set_agent_count(&self, n: usize) {
        self.agents.store(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case() -> Result<(), serde_json::Error> {
        let status = StatusHandle::default();
        status.set_agent_count(3);
        let json = serde_json::to_value(status.snapshot())?;
        assert_eq!(json["status"], "online");
        assert_eq!(json["agentCount"], 3);
        assert!(json["timestamp"].as_u64().unwrap() > 0);
        Ok(())
    }
}
