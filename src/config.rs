//! # Runtime and fleet configuration.
//!
//! Two layers:
//! 1. [`SupervisorConfig`] / [`AgentConfig`] / [`JitterConfig`]: plain structs
//!    with public fields and documented defaults, consumed by the runtime.
//! 2. [`FleetConfig`]: the externally supplied document (`serde`), turned into a
//!    [`SessionTarget`], a [`SupervisorConfig`] and a validated credential list.
//!
//! ## Sentinel values
//! - `RespawnPolicy::ceiling = 0` → circuit breaker disabled
//! - `JitterConfig::{pre_login, pre_connect} = None` → no pre-action pause

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::{Credential, PresenceStatus, TokenRejection, validate_token};
use crate::error::ConfigError;
use crate::policies::{JitterRange, LoginPolicy, ReconnectPolicy, RespawnPolicy};
use crate::queue::QueueConfig;
use crate::session::SessionTarget;

/// Randomized pauses applied before outbound actions.
///
/// These pauses spread the fleet's requests out in time so that they do not
/// form a regular pattern. Correctness never depends on them; set a field to
/// `None` (or use [`JitterConfig::disabled`]) to remove it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitterConfig {
    /// Pause before every login attempt.
    pub pre_login: Option<JitterRange>,
    /// Pause before every connect (resolve + join) attempt.
    pub pre_connect: Option<JitterRange>,
}

impl JitterConfig {
    /// No pauses at all.
    pub fn disabled() -> Self {
        Self {
            pre_login: None,
            pre_connect: None,
        }
    }
}

impl Default for JitterConfig {
    /// `pre_login = 200..=1000ms`, `pre_connect = 500..=3000ms`.
    fn default() -> Self {
        Self {
            pre_login: Some(JitterRange::from_millis(200, 1000)),
            pre_connect: Some(JitterRange::from_millis(500, 3000)),
        }
    }
}

/// Per-agent behavior shared by every agent of a supervisor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentConfig {
    /// Session re-establishment bounds.
    pub reconnect: ReconnectPolicy,
    /// Login retry bounds.
    pub login: LoginPolicy,
    /// Pre-action pauses.
    pub jitter: JitterConfig,
}

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `stagger`: agent `i` is started `i × stagger` after the supervisor starts
/// - `grace`: maximum wait for agents to stop after a shutdown request
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `respawn`: delay and circuit breaker for abnormal exits
/// - `queue`: request queue timing
/// - `agent`: reconnect/login/jitter policies handed to every agent
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    pub stagger: Duration,
    pub grace: Duration,
    pub bus_capacity: usize,
    pub respawn: RespawnPolicy,
    pub queue: QueueConfig,
    pub agent: AgentConfig,
}

impl SupervisorConfig {
    /// Start offset for the agent at `index`.
    #[inline]
    pub fn stagger_for(&self, index: usize) -> Duration {
        self.stagger
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `stagger = 2s`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `respawn = RespawnPolicy::default()` ({5s,10s,20s}, ceiling 5)
    /// - `queue = QueueConfig::default()` (1s spacing, 3 throttle retries)
    /// - `agent = AgentConfig::default()`
    fn default() -> Self {
        Self {
            stagger: Duration::from_secs(2),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            respawn: RespawnPolicy::default(),
            queue: QueueConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// One configured token with its desired session settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenEntry {
    pub token: Option<String>,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub status: PresenceStatus,
}

/// Externally supplied fleet document.
///
/// ```
/// use sessionvisor::FleetConfig;
///
/// let cfg = FleetConfig::from_json(r#"{
///     "guildId": "1", "channelId": "2", "port": 3000,
///     "reconnect": { "maxAttempts": 3, "delay": 1000 },
///     "tokens": [ { "token": "YOUR_TOKEN_HERE" } ]
/// }"#).unwrap();
/// let loaded = cfg.credentials();
/// assert!(loaded.valid.is_empty());
/// assert_eq!(loaded.rejected.len(), 1);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    pub guild_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

fn default_port() -> u16 {
    3000
}

/// Result of filtering the configured tokens.
#[derive(Debug, Default)]
pub struct LoadedCredentials {
    /// Valid, de-duplicated credentials in configuration order.
    pub valid: Vec<Credential>,
    /// Rejected entries: position in `tokens` and why.
    pub rejected: Vec<(usize, TokenRejection)>,
}

impl FleetConfig {
    /// Parses and checks a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: FleetConfig = serde_json::from_str(raw)?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.guild_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "guildId",
                reason: "must not be empty".into(),
            });
        }
        if self.channel_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "channelId",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn target(&self) -> SessionTarget {
        SessionTarget::new(self.guild_id.clone(), self.channel_id.clone())
    }

    /// Default supervisor configuration with this fleet's reconnect policy.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let mut cfg = SupervisorConfig::default();
        cfg.agent.reconnect = self.reconnect;
        cfg
    }

    /// Filters `tokens` into usable credentials.
    ///
    /// Entries are checked with [`validate_token`]; a token whose account
    /// identifier was already seen is rejected as a duplicate.
    pub fn credentials(&self) -> LoadedCredentials {
        let mut loaded = LoadedCredentials::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, entry) in self.tokens.iter().enumerate() {
            let token = entry.token.as_deref().unwrap_or_default();
            let identifier = match validate_token(token) {
                Ok(id) => id,
                Err(why) => {
                    loaded.rejected.push((index, why));
                    continue;
                }
            };
            if let Some(&first) = seen.get(&identifier) {
                loaded
                    .rejected
                    .push((index, TokenRejection::Duplicate { first }));
                continue;
            }
            seen.insert(identifier.clone(), index);
            loaded.valid.push(Credential::with_settings(
                identifier,
                token.trim(),
                entry.self_mute,
                entry.self_deaf,
                entry.status,
            ));
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    fn token_for(id: &str, tail: char) -> String {
        format!(
            "{}.GhAbCd.{}",
            URL_SAFE_NO_PAD.encode(id),
            tail.to_string().repeat(40)
        )
    }

    fn fleet(tokens: &[String]) -> FleetConfig {
        let entries: Vec<String> = tokens
            .iter()
            .map(|t| format!(r#"{{"token": "{t}", "selfDeaf": true, "status": "dnd"}}"#))
            .collect();
        let raw = format!(
            r#"{{"guildId": "g", "channelId": "c", "port": 8080,
                 "reconnect": {{"maxAttempts": 9, "delay": 2000}},
                 "tokens": [{}]}}"#,
            entries.join(",")
        );
        FleetConfig::from_json(&raw).expect("valid fleet config")
    }

    #[test]
    fn defaults_match_documentation() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.stagger, Duration::from_secs(2));
        assert_eq!(cfg.grace, Duration::from_secs(10));
        assert_eq!(cfg.stagger_for(4), Duration::from_secs(8));
        assert_eq!(cfg.queue.request_delay, Duration::from_secs(1));
    }

    #[test]
    fn fleet_credentials_are_filtered_and_deduplicated() {
        let cfg = fleet(&[
            token_for("111111", 'a'),
            "YOUR_TOKEN_HERE".to_string(),
            token_for("222222", 'b'),
            token_for("111111", 'c'),
        ]);
        let loaded = cfg.credentials();

        let ids: Vec<&str> = loaded.valid.iter().map(|c| c.identifier()).collect();
        assert_eq!(ids, vec!["111111", "222222"]);
        assert!(loaded.valid[0].desired_deaf());
        assert_eq!(loaded.valid[0].desired_status(), PresenceStatus::Dnd);
        assert_eq!(
            loaded.rejected,
            vec![
                (1, TokenRejection::Placeholder),
                (3, TokenRejection::Duplicate { first: 0 })
            ]
        );
    }

    #[test]
    fn fleet_reconnect_policy_flows_into_supervisor_config() {
        let cfg = fleet(&[]);
        let sup = cfg.supervisor_config();
        assert_eq!(sup.agent.reconnect.max_attempts, 9);
        assert_eq!(sup.agent.reconnect.base_delay, Duration::from_secs(2));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.target(), SessionTarget::new("g", "c"));
    }

    #[test]
    fn empty_channel_is_rejected() {
        let err = FleetConfig::from_json(r#"{"guildId": "g", "channelId": " "}"#)
            .expect_err("empty channel");
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[test]
    fn missing_token_field_is_rejected_as_missing() {
        let cfg = FleetConfig::from_json(r#"{"guildId": "g", "channelId": "c", "tokens": [{}]}"#)
            .expect("parses");
        assert_eq!(cfg.credentials().rejected, vec![(0, TokenRejection::Missing)]);
    }
}
