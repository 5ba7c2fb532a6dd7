//! # Session lifecycle of a single agent.
//!
//! - [`ConnectionState`] the six lifecycle states and their legal edges
//! - [`ExitReason`] / [`Termination`] how a lifecycle ended
//! - [`SessionClient`], [`SessionLink`], [`SessionFactory`] the narrow capability
//!   interface the core needs from a concrete session library
//! - [`ConnectionStateMachine`] drives one credential through the lifecycle
//!
//! ```text
//!            start            auth ok              session ready
//!   Idle ───────────► LoggingIn ───────► Connecting ─────────────► Ready
//!                     │   ▲  │               ▲   │                  │
//!          retryable  └───┘  │ invalid /     │   │ resolve/handshake│ session lost
//!          (bounded)         │ exhausted     │   ▼ failure          ▼
//!                            │           backoff ◄──────────── Reconnecting
//!                            ▼                                      │ attempts >= max
//!                        Destroyed ◄────────────────────────────────┘
//!                            ▲
//!                            └──────── any state on shutdown
//! ```

mod machine;
mod state;
mod transport;

pub use machine::ConnectionStateMachine;
pub use state::{ConnectionState, ExitReason, Termination};
pub use transport::{PresencePayload, SessionClient, SessionFactory, SessionLink, SessionTarget};
