//! Agents: one supervised task per credential.
//!
//! - [`AgentRuntime`] owns a credential and drives its connection state machine.
//! - [`AgentControl`] is the supervisor's handle for stopping it.
//! - [`AgentExit`] is what the supervisor learns when the task finishes.

mod control;
mod runtime;

pub use control::{AgentControl, ControlMessage};
pub use runtime::{AgentDeps, AgentExit, AgentRuntime};
