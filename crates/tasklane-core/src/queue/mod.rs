//! Queue module: state machine, execution loop and the public controller.
//!
//! - `machine`: pure transition table over the backlog and lifecycle state
//! - `runner`: the execution loop (one task in flight at a time)
//! - `controller`: `TaskQueue`, the handle callers share
//! - `builder`: `QueueBuilder`

mod builder;
mod controller;
mod machine;
mod runner;

pub use builder::QueueBuilder;
pub use controller::TaskQueue;
