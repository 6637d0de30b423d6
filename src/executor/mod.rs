//! Batch execution of package operations and the task primitives it runs on.

pub mod actions;
#[cfg(feature = "signals")]
pub mod signals;
pub mod task;

pub use actions::{
    ActionExecutor, ActionOutcome, ActionRequest, BatchEvent, BatchReport, Operation,
};
pub use task::{CancelToken, TaskHandle, spawn_task};
