//! # Process-wide serialization of throttle-sensitive calls.
//!
//! [`RateLimitedQueue`] is the single resource shared by every agent. Login and
//! session-join calls go through it so that a fleet starting at once cannot burst
//! the remote service.
//!
//! ## Dispatch model
//! ```text
//! submit(a) ─┐
//! submit(b) ─┼─► fair gate (FIFO) ─► wait request_delay since last completion
//! submit(c) ─┘                       ─► call()
//!                                       ├─ Ok / non-throttle Err ─► settle ─► release
//!                                       └─ throttled Err
//!                                            ├─ retries < max ─► sleep 2^n × base ─► call() again (keeps head)
//!                                            └─ otherwise     ─► settle ─► release, Err surfaced
//! ```

mod rate_limited;

pub use rate_limited::{Cancelled, QueueConfig, RateLimitedQueue, Throttled};
