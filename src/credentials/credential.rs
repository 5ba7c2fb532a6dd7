use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Number of trailing token characters exposed by [`Credential::short_id`].
const SHORT_ID_CHARS: usize = 4;

/// Presence the agent advertises once its session is ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Idle => "idle",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Invisible => "invisible",
        }
    }
}

/// Secret and desired session settings for one agent.
///
/// Immutable once built and cheap to clone. `Debug` never prints the token.
#[derive(Clone)]
pub struct Credential {
    inner: Arc<Inner>,
}

struct Inner {
    identifier: String,
    secret_token: String,
    short_id: String,
    desired_mute: bool,
    desired_deaf: bool,
    desired_status: PresenceStatus,
}

impl Credential {
    /// Builds a credential with default session settings (unmuted, undeafened, online).
    pub fn new(identifier: impl Into<String>, secret_token: impl Into<String>) -> Self {
        Self::with_settings(identifier, secret_token, false, false, PresenceStatus::Online)
    }

    /// Builds a credential with explicit session settings.
    pub fn with_settings(
        identifier: impl Into<String>,
        secret_token: impl Into<String>,
        desired_mute: bool,
        desired_deaf: bool,
        desired_status: PresenceStatus,
    ) -> Self {
        let secret_token = secret_token.into();
        let short_id = short_id_of(&secret_token);
        Self {
            inner: Arc::new(Inner {
                identifier: identifier.into(),
                secret_token,
                short_id,
                desired_mute,
                desired_deaf,
                desired_status,
            }),
        }
    }

    /// Stable identifier of the account behind the token. Not secret.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// The secret token. Only session clients should read this.
    pub fn secret_token(&self) -> &str {
        &self.inner.secret_token
    }

    /// Display-safe id: an ellipsis followed by the last few token characters.
    ///
    /// ```
    /// use sessionvisor::Credential;
    ///
    /// let c = Credential::new("42", "aaaa.bbbb.cccc-WXYZ");
    /// assert_eq!(c.short_id(), "…WXYZ");
    /// ```
    pub fn short_id(&self) -> &str {
        &self.inner.short_id
    }

    pub fn desired_mute(&self) -> bool {
        self.inner.desired_mute
    }

    pub fn desired_deaf(&self) -> bool {
        self.inner.desired_deaf
    }

    pub fn desired_status(&self) -> PresenceStatus {
        self.inner.desired_status
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.inner.identifier)
            .field("short_id", &self.inner.short_id)
            .field("desired_mute", &self.inner.desired_mute)
            .field("desired_deaf", &self.inner.desired_deaf)
            .field("desired_status", &self.inner.desired_status)
            .finish_non_exhaustive()
    }
}

fn short_id_of(token: &str) -> String {
    let count = token.chars().count();
    let tail: String = token.chars().skip(count.saturating_sub(SHORT_ID_CHARS)).collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let c = Credential::new("1", "super-secret-token-value");
        let printed = format!("{c:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("…alue"));
    }

    #[test]
    fn short_token_short_id() {
        let c = Credential::new("1", "ab");
        assert_eq!(c.short_id(), "…ab");
    }

    #[test]
    fn status_deserializes_lowercase() -> Result<(), serde_json::Error> {
        let s: PresenceStatus = serde_json::from_str("\"dnd\"")?;
        assert_eq!(s, PresenceStatus::Dnd);
        Ok(())
    }
}
