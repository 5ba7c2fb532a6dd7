//! # Credentials: the identity each agent runs under.
//!
//! - [`Credential`] immutable record bound to exactly one agent at a time
//! - [`PresenceStatus`] desired presence advertised once the session is ready
//! - [`validate_token`] structural token check used when loading a fleet

mod credential;
mod validate;

pub use credential::{Credential, PresenceStatus};
pub use validate::{TokenRejection, validate_token};
