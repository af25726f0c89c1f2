//! Task system.
//!
//! Plugins and users contribute [`TaskDefinition`]s. Definitions sharing a
//! path are merged into one node of the task tree; each new action overrides
//! the previous one and can reach it through [`TaskNext`].

mod action;
mod definition;
mod manager;

pub use action::{TaskAction, TaskArguments, TaskFuture, TaskNext, task_action};
pub use definition::{PositionalArgument, TaskActionSource, TaskDefinition, TaskOption};
pub use manager::{TaskDescription, TaskManager, TaskNode, TaskState};

/// Owner id of the tasks supplied directly by the user.
pub const USER_TASKS_OWNER: &str = "user";
