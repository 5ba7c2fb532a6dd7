//! # Event subscribers.
//!
//! Agents and the supervisor publish [`Event`](crate::events::Event)s on the
//! [`Bus`](crate::events::Bus). The supervisor forwards them to a
//! [`SubscriberSet`], which fans them out to every registered [`Subscribe`]
//! implementation through its own bounded queue.
//!
//! ```text
//! AgentRuntime ── publish(Event) ──► Bus ──► supervisor listener ──► SubscriberSet
//!                                                                  ┌──────┼──────┐
//!                                                                  ▼      ▼      ▼
//!                                                             LogWriter Metrics Custom
//! ```
//!
//! - [`Subscribe`]: the extension trait.
//! - [`SubscriberSet`]: fan-out with overflow and panic isolation.
//! - [`LogWriter`] (feature `logging`): renders events through `tracing`.

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
