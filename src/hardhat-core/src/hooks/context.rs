//! Context handed to every hook handler and task action.

use std::sync::{Arc, Weak};

use super::interruptions::{InterruptionIo, UserInterruptionManager};
use super::manager::HookManager;
use crate::config::ResolvedConfig;
use crate::global_options::GlobalOptions;
use crate::{HardhatError, Result};

/// Shared state of one runtime environment.
pub struct HookContext {
    /// Resolved configuration and plugin extensions
    pub config: Arc<ResolvedConfig>,

    /// Resolved global option values
    pub global_options: Arc<GlobalOptions>,

    /// IO boundary for messages and prompts
    pub interruptions: UserInterruptionManager,

    hooks: Weak<HookManager>,
}

impl HookContext {
    /// Create a context. It is bound to a hook manager by
    /// [`HookManager::set_context`].
    pub fn new(
        config: Arc<ResolvedConfig>,
        global_options: Arc<GlobalOptions>,
        io: Arc<dyn InterruptionIo>,
    ) -> Self {
        Self {
            config,
            global_options,
            interruptions: UserInterruptionManager::new(io),
            hooks: Weak::new(),
        }
    }

    pub(crate) fn bind(&mut self, hooks: Weak<HookManager>) {
        self.interruptions.bind(hooks.clone());
        self.hooks = hooks;
    }

    /// The hook manager this context is attached to.
    pub fn hooks(&self) -> Result<Arc<HookManager>> {
        self.hooks
            .upgrade()
            .ok_or_else(|| HardhatError::invariant("hook context is not attached to a hook manager"))
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("config", &self.config)
            .field("global_options", &self.global_options)
            .field("attached", &(self.hooks.strong_count() > 0))
            .finish()
    }
}
