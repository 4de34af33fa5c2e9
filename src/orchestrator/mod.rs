//! Query lifecycle orchestration.
//!
//! `lifecycle` holds the per-query state machine and bounded history;
//! `controller` runs it as a task that UI layers talk to over channels.

mod controller;
mod lifecycle;

pub use controller::{run_controller, UiCommand};
pub use lifecycle::{LifecycleController, LifecycleState, Settlement, SubmitRejected, HISTORY_LIMIT};
