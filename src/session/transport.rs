//! # Capability interface to the external session library.
//!
//! The core never speaks the remote protocol. It asks a [`SessionClient`] to
//! log in, resolve the target and join it, and then holds a [`SessionLink`]
//! that can carry one control payload, report session loss, and tear down.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::{Credential, PresenceStatus};
use crate::error::AgentError;

/// Where every agent of the fleet connects to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTarget {
    /// Target container (server/guild) identifier.
    pub container_id: String,
    /// Target channel identifier inside the container.
    pub channel_id: String,
}

impl SessionTarget {
    pub fn new(container_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// Desired session settings sent once the session is established.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub container_id: String,
    pub channel_id: String,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub status: PresenceStatus,
}

impl PresencePayload {
    pub fn for_credential(credential: &Credential, target: &SessionTarget) -> Self {
        Self {
            container_id: target.container_id.clone(),
            channel_id: target.channel_id.clone(),
            self_mute: credential.desired_mute(),
            self_deaf: credential.desired_deaf(),
            status: credential.desired_status(),
        }
    }
}

/// Authenticated client bound to one credential.
///
/// Methods take `&self` so calls can be routed through the shared request queue.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Authenticates the credential.
    async fn login(&self) -> Result<(), AgentError>;

    /// Checks that the target container and channel exist and are reachable.
    async fn resolve(&self, target: &SessionTarget) -> Result<(), AgentError>;

    /// Performs the session handshake with the resolved target.
    async fn join(&self, target: &SessionTarget) -> Result<Box<dyn SessionLink>, AgentError>;

    /// Releases the client. Called once when the agent is destroyed.
    async fn logout(&self) {}
}

/// An established session.
#[async_trait]
pub trait SessionLink: Send {
    /// Sends a control payload; `false` when the transport refused it.
    fn send_control_payload(&mut self, payload: &[u8]) -> bool;

    /// Resolves when the transport detects that the session is gone.
    async fn closed(&mut self) -> AgentError;

    /// Leaves the session and releases its resources.
    async fn teardown(&mut self);
}

/// Builds a [`SessionClient`] for a credential. One client per agent run.
pub trait SessionFactory: Send + Sync + 'static {
    fn client(&self, credential: &Credential) -> Box<dyn SessionClient>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_payload_reflects_credential() -> Result<(), serde_json::Error> {
        let c = Credential::with_settings("7", "t", true, false, PresenceStatus::Idle);
        let target = SessionTarget::new("g1", "c1");
        let json = serde_json::to_value(PresencePayload::for_credential(&c, &target))?;
        assert_eq!(json["containerId"], "g1");
        assert_eq!(json["channelId"], "c1");
        assert_eq!(json["selfMute"], true);
        assert_eq!(json["selfDeaf"], false);
        assert_eq!(json["status"], "idle");
        Ok(())
    }
}
