//! Module loading for deferred plugin dependencies, hook handlers and task
//! actions.
//!
//! The engine never interprets a [`LoadableRef`]; it hands the reference and
//! the id of the plugin that declared it to a [`ModuleLoader`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::hooks::HookHandlers;
use crate::plugin::{LoadableRef, PluginDescriptor};
use crate::tasks::TaskAction;
use crate::{HardhatError, Result};

/// Resolves loadable references into executable modules.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Load a deferred dependency declared by `owner`.
    async fn load_plugin(&self, owner: &str, reference: &LoadableRef)
    -> Result<Arc<PluginDescriptor>>;

    /// Load the handlers of one hook category of `plugin_id`.
    async fn load_hook_handlers(
        &self,
        plugin_id: &str,
        category: &str,
        reference: &LoadableRef,
    ) -> Result<HookHandlers>;

    /// Load the action of `task` declared by `plugin_id`.
    async fn load_task_action(
        &self,
        plugin_id: &str,
        task: &str,
        reference: &LoadableRef,
    ) -> Result<TaskAction>;
}

/// Factory producing a plugin's handlers for one category.
pub type HookHandlersFactory = Arc<dyn Fn() -> Result<HookHandlers> + Send + Sync>;

type ModuleKey = (String, LoadableRef);

/// In-memory module registry keyed by `(plugin id, reference)`.
///
/// Hook handler factories run on every load; callers cache the result.
#[derive(Default)]
pub struct StaticModuleRegistry {
    plugins: HashMap<ModuleKey, Arc<PluginDescriptor>>,
    hook_handlers: HashMap<ModuleKey, HookHandlersFactory>,
    task_actions: HashMap<ModuleKey, TaskAction>,
}

impl StaticModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the plugin that `owner` reaches through `reference`.
    pub fn with_plugin(
        mut self,
        owner: impl Into<String>,
        reference: impl Into<LoadableRef>,
        plugin: Arc<PluginDescriptor>,
    ) -> Self {
        self.plugins
            .insert((owner.into(), reference.into()), plugin);
        self
    }

    /// Register a hook handler factory.
    pub fn with_hook_handlers<F>(
        mut self,
        plugin_id: impl Into<String>,
        reference: impl Into<LoadableRef>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Result<HookHandlers> + Send + Sync + 'static,
    {
        self.hook_handlers
            .insert((plugin_id.into(), reference.into()), Arc::new(factory));
        self
    }

    /// Register a task action.
    pub fn with_task_action(
        mut self,
        plugin_id: impl Into<String>,
        reference: impl Into<LoadableRef>,
        action: TaskAction,
    ) -> Self {
        self.task_actions
            .insert((plugin_id.into(), reference.into()), action);
        self
    }

    /// Number of registered modules of every kind.
    pub fn len(&self) -> usize {
        self.plugins.len() + self.hook_handlers.len() + self.task_actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(plugin_id: &str, reference: &LoadableRef) -> ModuleKey {
    (plugin_id.to_string(), reference.clone())
}

#[async_trait]
impl ModuleLoader for StaticModuleRegistry {
    async fn load_plugin(
        &self,
        owner: &str,
        reference: &LoadableRef,
    ) -> Result<Arc<PluginDescriptor>> {
        self.plugins
            .get(&key(owner, reference))
            .cloned()
            .ok_or_else(|| HardhatError::PluginLoad {
                plugin: owner.to_string(),
                reference: reference.to_string(),
                message: "no plugin registered for this reference".to_string(),
            })
    }

    async fn load_hook_handlers(
        &self,
        plugin_id: &str,
        category: &str,
        reference: &LoadableRef,
    ) -> Result<HookHandlers> {
        let factory = self
            .hook_handlers
            .get(&key(plugin_id, reference))
            .ok_or_else(|| HardhatError::HandlerLoad {
                plugin: plugin_id.to_string(),
                category: category.to_string(),
                message: format!("no module registered for '{}'", reference),
            })?;

        factory()
    }

    async fn load_task_action(
        &self,
        plugin_id: &str,
        task: &str,
        reference: &LoadableRef,
    ) -> Result<TaskAction> {
        self.task_actions
            .get(&key(plugin_id, reference))
            .cloned()
            .ok_or_else(|| HardhatError::ActionLoad {
                task: task.to_string(),
                plugin: plugin_id.to_string(),
                message: format!("no action registered for '{}'", reference),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_load_plugin_scoped_by_owner() {
        let network = Arc::new(PluginDescriptor::new("network"));
        let registry =
            StaticModuleRegistry::new().with_plugin("toolbox", "./network", network.clone());

        let loaded = registry
            .load_plugin("toolbox", &LoadableRef::new("./network"))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&loaded, &network));

        // Same reference from another plugin is a different module
        let err = registry
            .load_plugin("other", &LoadableRef::new("./network"))
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::PluginLoad { .. }));
    }

    #[tokio::test]
    async fn test_hook_factory_runs_per_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = StaticModuleRegistry::new().with_hook_handlers("p", "./hooks", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HookHandlers::new())
        });

        let reference = LoadableRef::new("./hooks");
        registry.load_hook_handlers("p", "hre", &reference).await.unwrap();
        registry.load_hook_handlers("p", "hre", &reference).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_modules() {
        let registry = StaticModuleRegistry::new();
        assert!(registry.is_empty());

        let reference = LoadableRef::new("./missing");
        assert!(matches!(
            registry.load_hook_handlers("p", "hre", &reference).await,
            Err(HardhatError::HandlerLoad { .. })
        ));
        assert!(matches!(
            registry.load_task_action("p", "compile", &reference).await,
            Err(HardhatError::ActionLoad { .. })
        ));
    }
}
