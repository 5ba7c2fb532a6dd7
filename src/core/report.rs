//! Summary of one [`Supervisor::run`](crate::Supervisor::run).

/// What happened to the fleet over the supervisor's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    /// Agent runs started, respawns included.
    pub spawned: u32,
    /// Respawns performed after abnormal exits.
    pub restarts: u32,
    /// Short ids of agents that stopped because of a shutdown directive.
    pub stopped: Vec<String>,
    /// Short ids of credentials rejected by the remote service.
    pub retired: Vec<String>,
    /// Short ids of credentials whose circuit breaker opened.
    pub circuit_open: Vec<String>,
    /// The run ended because shutdown was requested.
    pub shutdown_requested: bool,
}

impl FleetReport {
    /// `0` after a clean shutdown, `1` when every agent ended unrecoverably.
    pub fn exit_code(&self) -> i32 {
        if self.shutdown_requested { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_reflects_how_the_run_ended() {
        let clean = FleetReport {
            shutdown_requested: true,
            ..FleetReport::default()
        };
        assert_eq!(clean.exit_code(), 0);

        let dead = FleetReport {
            retired: vec!["…abcd".into()],
            ..FleetReport::default()
        };
        assert_eq!(dead.exit_code(), 1);
    }
}
