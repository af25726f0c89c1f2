//! Hook system.
//!
//! Plugins declare one handler module per hook category. The [`HookManager`]
//! loads a category the first time one of its hooks is dispatched and runs
//! handlers with one of two protocols:
//!
//! - **Sequential**: every handler runs once, in plugin resolution order.
//! - **Chain**: handlers wrap each other, the most recently resolved plugin
//!   outermost, with a default implementation innermost.

mod context;
mod interruptions;
mod manager;
mod types;

pub use context::HookContext;
pub use interruptions::{ConsoleIo, InterruptionIo, NonInteractiveIo, UserInterruptionManager};
pub use manager::{HandlerRegistration, HookManager};
pub use types::{ChainHandlerFn, HookFuture, HookHandlers, HookProtocol, Next, SequentialHandlerFn};

// ============================================================================
// BUILT-IN HOOKS
// ============================================================================

/// Runtime environment lifecycle.
pub const HRE: &str = "hre";
/// Sequential, no arguments: the runtime environment is ready.
pub const CREATED: &str = "created";

/// User interruption routing.
pub const USER_INTERRUPTIONS: &str = "userInterruptions";
/// Chain over `(interruptor, message)` returning `()`.
pub const DISPLAY_MESSAGE: &str = "displayMessage";
/// Chain over `(interruptor, prompt)` returning `String`.
pub const REQUEST_INPUT: &str = "requestInput";
/// Chain over `(interruptor, prompt)` returning `String`.
pub const REQUEST_SECRET_INPUT: &str = "requestSecretInput";

/// Task tree construction.
pub const TASKS: &str = "tasks";
/// Chain over the collected `Vec<(owner, TaskDefinition)>`.
pub const EXTEND_TASK_DEFINITIONS: &str = "extendTaskDefinitions";
