//! Runtime core: supervision and lifecycle.
//!
//! The public entry point is [`Supervisor`], built with [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`supervisor`]: the single supervising loop (spawn, respawn, shutdown);
//! - [`registry`]: the supervisor-owned agent handles;
//! - [`shutdown`]: shutdown flag, OS signals and grace enforcement;
//! - [`status`]: read-only status snapshot;
//! - [`report`]: the summary returned by a run.

mod builder;
mod registry;
mod report;
mod shutdown;
mod status;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use report::FleetReport;
pub use shutdown::ShutdownCoordinator;
pub use status::{StatusHandle, StatusSnapshot};
pub use supervisor::Supervisor;
