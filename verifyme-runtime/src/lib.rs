//! VerifyMe Runtime
//!
//! Watches an inbox and hands every new message to the classifier:
//! - Poller task with explicit Idle / Polling / Stopped states
//! - Cancellation through a watch channel
//! - Result sink persisting the last found artifact and dismissed message

pub mod sink;
pub mod poller;

pub use sink::*;
pub use poller::*;
