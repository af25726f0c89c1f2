//! Runtime environment - the main entry point of the engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arguments::ArgumentValue;
use crate::config::{EngineConfig, Extensions, ResolvedConfig};
use crate::global_options::{
    EnvironmentSource, GlobalOptionCatalog, GlobalOptions, ProcessEnvironment,
    build_global_options_map, resolve_global_options,
};
use crate::hooks::{CREATED, HRE, HookContext, HookManager, InterruptionIo, NonInteractiveIo};
use crate::loader::{ModuleLoader, StaticModuleRegistry};
use crate::plugin::PluginDescriptor;
use crate::reserved::ReservedNames;
use crate::resolver::{ResolvedPluginList, resolve_plugin_list};
use crate::tasks::{TaskArguments, TaskDefinition, TaskManager};
use crate::Result;

/// Collaborators injected into [`RuntimeEnvironment::create`].
#[derive(Clone)]
pub struct RuntimeOptions {
    /// Source of option environment variables
    pub env: Arc<dyn EnvironmentSource>,

    /// Terminal side of user interruptions
    pub interruptions: Arc<dyn InterruptionIo>,

    /// Resolves deferred plugins, hook handlers and task actions
    pub loader: Arc<dyn ModuleLoader>,

    /// Tasks defined by the user, registered after every plugin task
    pub user_tasks: Vec<TaskDefinition>,

    /// Plugin configuration extensions
    pub extensions: Extensions,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            env: Arc::new(ProcessEnvironment),
            interruptions: Arc::new(NonInteractiveIo),
            loader: Arc::new(StaticModuleRegistry::new()),
            user_tasks: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

impl RuntimeOptions {
    pub fn with_env(mut self, env: impl EnvironmentSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_interruptions(mut self, io: impl InterruptionIo + 'static) -> Self {
        self.interruptions = Arc::new(io);
        self
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn with_user_task(mut self, task: TaskDefinition) -> Self {
        self.user_tasks.push(task);
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }
}

/// A fully initialized engine.
///
/// Creation runs, in order: plugin resolution, the global option catalog,
/// option values, the hook manager and its context, the task tree, and
/// finally the `hre.created` sequential hook.
pub struct RuntimeEnvironment {
    /// Resolved configuration
    config: Arc<ResolvedConfig>,

    /// Resolved plugins
    plugins: ResolvedPluginList,

    /// Global option catalog
    catalog: GlobalOptionCatalog,

    /// Global option values
    global_options: Arc<GlobalOptions>,

    /// Hook manager
    hooks: Arc<HookManager>,

    /// Task tree
    tasks: TaskManager,
}

impl RuntimeEnvironment {
    /// Create a runtime environment over `plugins`.
    pub async fn create(
        engine: EngineConfig,
        plugins: Vec<Arc<PluginDescriptor>>,
        user_global_options: HashMap<String, ArgumentValue>,
        options: RuntimeOptions,
    ) -> Result<Self> {
        let RuntimeOptions {
            env,
            interruptions,
            loader,
            user_tasks,
            extensions,
        } = options;

        let plugins = resolve_plugin_list(&plugins, loader.as_ref()).await?;

        let mut reserved = ReservedNames::builtin();
        reserved.extend(engine.reserved_names.iter().cloned());

        let catalog = build_global_options_map(&plugins, &reserved)?;
        let global_options = Arc::new(resolve_global_options(
            &user_global_options,
            &catalog,
            env.as_ref(),
            &engine.env_prefix,
        )?);

        let config = Arc::new(ResolvedConfig::new(engine, extensions));
        let hooks = HookManager::new(plugins.clone(), loader);
        hooks.set_context(HookContext::new(
            config.clone(),
            global_options.clone(),
            interruptions,
        ))?;

        let tasks =
            TaskManager::new(&plugins, hooks.clone(), &catalog, &reserved, user_tasks).await?;

        hooks
            .run_sequential_handlers::<(), ()>(HRE, CREATED, ())
            .await?;

        tracing::info!(
            "Runtime environment created with {} plugins and {} global options",
            plugins.len(),
            catalog.len()
        );

        Ok(Self {
            config,
            plugins,
            catalog,
            global_options,
            hooks,
            tasks,
        })
    }

    // ========== Accessors ==========

    pub fn config(&self) -> &Arc<ResolvedConfig> {
        &self.config
    }

    pub fn plugins(&self) -> &ResolvedPluginList {
        &self.plugins
    }

    pub fn global_option_catalog(&self) -> &GlobalOptionCatalog {
        &self.catalog
    }

    pub fn global_options(&self) -> &Arc<GlobalOptions> {
        &self.global_options
    }

    pub fn hooks(&self) -> &Arc<HookManager> {
        &self.hooks
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    // ========== Execution ==========

    /// Run the task at `path`.
    pub async fn run_task<S: AsRef<str>>(
        &self,
        path: &[S],
        args: TaskArguments,
    ) -> Result<serde_json::Value> {
        self.tasks.run(path, args).await
    }
}

impl std::fmt::Debug for RuntimeEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEnvironment")
            .field("plugins", &self.plugins.ids())
            .field("global_options", &self.global_options)
            .finish_non_exhaustive()
    }
}
