//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by agents, the supervisor and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`LogRecord`] the `{kind, message, shortId}` projection of an event
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ConnectionStateMachine`, `AgentControl`, `Supervisor`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor loop (registry state tracking) and the
//!   subscriber listener (fan-out to `SubscriberSet`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, LogRecord};
