//! # Hardhat Core
//!
//! Plugin resolution, hook dispatch and task composition for Hardhat.
//!
//! ## Features
//!
//! - **Plugin resolution**: dependencies are expanded into a deterministic,
//!   deduplicated, cycle-free order
//! - **Global options**: typed options resolved from caller input, the
//!   environment and defaults
//! - **Hooks**: lazily loaded handlers dispatched sequentially or as a
//!   chain of responsibility
//! - **Tasks**: a tree of commands whose actions plugins can override
//!
//! ## Example
//!
//! ```rust,ignore
//! use hardhat_core::{
//!     EngineConfig, PluginDescriptor, RuntimeEnvironment, RuntimeOptions, TaskArguments,
//!     TaskDefinition,
//! };
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let plugin = PluginDescriptor::new("hello").with_task(
//!         TaskDefinition::new(["hello"])
//!             .with_inline_action(|_args, _ctx, _next| async move { Ok("hi".into()) }),
//!     );
//!
//!     let hre = RuntimeEnvironment::create(
//!         EngineConfig::default(),
//!         vec![Arc::new(plugin)],
//!         HashMap::new(),
//!         RuntimeOptions::default(),
//!     )
//!     .await?;
//!
//!     println!("{}", hre.run_task(&["hello"], TaskArguments::new()).await?);
//!     Ok(())
//! }
//! ```

pub mod arguments;
pub mod config;
pub mod error;
pub mod global_options;
pub mod hooks;
pub mod loader;
pub mod plugin;
pub mod reserved;
pub mod resolver;
pub mod runtime;
pub mod tasks;

// Re-exports for convenience
pub use arguments::{ArgumentType, ArgumentValue};
pub use config::{EngineConfig, Extensions, ResolvedConfig};
pub use error::{HardhatError, Result};
pub use global_options::{
    EnvironmentSource, GlobalOptionCatalog, GlobalOptionDefinition, GlobalOptions,
    ProcessEnvironment, build_global_options_map, resolve_global_options,
};
pub use hooks::{
    HandlerRegistration, HookContext, HookHandlers, HookManager, InterruptionIo, Next,
    UserInterruptionManager,
};
pub use loader::{ModuleLoader, StaticModuleRegistry};
pub use plugin::{LoadableRef, PluginDependency, PluginDescriptor};
pub use reserved::ReservedNames;
pub use resolver::{ResolvedPluginList, resolve_plugin_list};
pub use runtime::{RuntimeEnvironment, RuntimeOptions};
pub use tasks::{
    PositionalArgument, TaskArguments, TaskDefinition, TaskManager, TaskNext, TaskOption,
};

/// Default prefix of the environment variables feeding global options.
pub const DEFAULT_ENV_PREFIX: &str = "HARDHAT";
