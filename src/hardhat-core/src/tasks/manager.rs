//! Task tree construction and execution.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::action::{TaskAction, TaskArguments, TaskNext};
use super::definition::{PositionalArgument, TaskActionSource, TaskDefinition, TaskOption};
use super::USER_TASKS_OWNER;
use crate::arguments::{
    ArgumentValue, coerce_argument_value, is_valid_argument_name, is_valid_task_segment,
    normalize_default,
};
use crate::global_options::GlobalOptionCatalog;
use crate::hooks::{EXTEND_TASK_DEFINITIONS, HookManager, TASKS};
use crate::reserved::ReservedNames;
use crate::resolver::ResolvedPluginList;
use crate::{HardhatError, Result};

/// Shape of a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Groups subtasks, no action of its own.
    Namespace,
    /// Has an action and no subtasks.
    Runnable,
    /// Has an action and subtasks.
    RunnableNamespace,
}

/// A node of the task tree.
#[derive(Debug, Clone)]
pub struct TaskNode {
    path: Vec<String>,
    description: String,
    /// Options with the id of the plugin that declared them.
    options: IndexMap<String, (String, TaskOption)>,
    positional: Vec<(String, PositionalArgument)>,
    /// Actions with their owner, original first.
    actions: Vec<(String, TaskActionSource)>,
    subtasks: BTreeMap<String, TaskNode>,
}

impl TaskNode {
    fn new(path: Vec<String>) -> Self {
        Self {
            path,
            description: String::new(),
            options: IndexMap::new(),
            positional: Vec::new(),
            actions: Vec::new(),
            subtasks: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Space separated path, as typed on a command line.
    pub fn id(&self) -> String {
        self.path.join(" ")
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> TaskState {
        match (self.actions.is_empty(), self.subtasks.is_empty()) {
            (true, _) => TaskState::Namespace,
            (false, true) => TaskState::Runnable,
            (false, false) => TaskState::RunnableNamespace,
        }
    }

    pub fn is_runnable(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn options(&self) -> impl Iterator<Item = &TaskOption> {
        self.options.values().map(|(_, option)| option)
    }

    pub fn positional_arguments(&self) -> impl Iterator<Item = &PositionalArgument> {
        self.positional.iter().map(|(_, argument)| argument)
    }

    pub fn subtask(&self, name: &str) -> Option<&TaskNode> {
        self.subtasks.get(name)
    }

    pub fn subtasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.subtasks.values()
    }

    /// Names of the direct subtasks, sorted.
    pub fn subtask_names(&self) -> Vec<String> {
        self.subtasks.keys().cloned().collect()
    }

    /// Ids of the plugins that provided an action, original first.
    pub fn action_owners(&self) -> Vec<&str> {
        self.actions.iter().map(|(owner, _)| owner.as_str()).collect()
    }

    fn argument_owner(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .map(|(owner, _)| owner.as_str())
            .or_else(|| {
                self.positional
                    .iter()
                    .find(|(_, argument)| argument.name == name)
                    .map(|(owner, _)| owner.as_str())
            })
    }
}

/// Snapshot of a task for help output.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescription {
    pub path: Vec<String>,
    pub description: String,
    pub state: TaskState,
    pub options: Vec<TaskOption>,
    pub positional: Vec<PositionalArgument>,
    pub subtasks: Vec<String>,
}

struct TreeBuilder<'a> {
    root: BTreeMap<String, TaskNode>,
    global_options: &'a GlobalOptionCatalog,
    reserved: &'a ReservedNames,
}

impl TreeBuilder<'_> {
    fn register(&mut self, owner: &str, definition: TaskDefinition) -> Result<()> {
        let full_path = definition.full_path();
        let id = full_path.join(" ");

        let Some((leaf, ancestors)) = full_path.split_last() else {
            return Err(HardhatError::invalid_task(id, "the task path is empty"));
        };
        if let Some(segment) = full_path.iter().find(|s| !is_valid_task_segment(s)) {
            return Err(HardhatError::invalid_name("task", segment, owner));
        }

        let mut nodes = &mut self.root;
        for (depth, segment) in ancestors.iter().enumerate() {
            nodes = &mut nodes
                .entry(segment.clone())
                .or_insert_with(|| TaskNode::new(full_path[..=depth].to_vec()))
                .subtasks;
        }
        let node = nodes
            .entry(leaf.clone())
            .or_insert_with(|| TaskNode::new(full_path.clone()));

        for mut option in definition.options {
            check_argument_name(
                self.global_options,
                self.reserved,
                node,
                "task option",
                &option.name,
                owner,
            )?;
            option.default = normalize_default(&option.name, option.kind, option.default)?;
            node.options
                .insert(option.name.clone(), (owner.to_string(), option));
        }

        for mut argument in definition.positional {
            check_argument_name(
                self.global_options,
                self.reserved,
                node,
                "task argument",
                &argument.name,
                owner,
            )?;
            argument.default = positional_default(&argument)?;
            node.positional.push((owner.to_string(), argument));
        }
        check_positional_order(&id, &node.positional)?;

        if !definition.description.is_empty() {
            node.description = definition.description;
        }

        if let Some(action) = definition.action {
            if node.actions.is_empty() {
                tracing::debug!("Task '{}' defined by {}", id, owner);
            } else {
                tracing::debug!("Task '{}' overridden by {}", id, owner);
            }
            node.actions.push((owner.to_string(), action));
        }

        Ok(())
    }
}

fn check_argument_name(
    global_options: &GlobalOptionCatalog,
    reserved: &ReservedNames,
    node: &TaskNode,
    kind: &'static str,
    name: &str,
    owner: &str,
) -> Result<()> {
    if !is_valid_argument_name(name) {
        return Err(HardhatError::invalid_name(kind, name, owner));
    }
    if reserved.contains(name) {
        return Err(HardhatError::reserved_name(kind, name, owner));
    }
    if let Some(defined_by) = global_options.defined_by(name) {
        return Err(HardhatError::already_defined(kind, name, owner, defined_by));
    }
    if let Some(defined_by) = node.argument_owner(name) {
        return Err(HardhatError::already_defined(kind, name, owner, defined_by));
    }
    Ok(())
}

fn positional_default(argument: &PositionalArgument) -> Result<Option<ArgumentValue>> {
    let Some(default) = argument.default.clone() else {
        return Ok(None);
    };

    let default = match (argument.variadic, default) {
        (true, ArgumentValue::List(values)) => ArgumentValue::List(
            values
                .into_iter()
                .map(|value| normalize_default(&argument.name, argument.kind, value))
                .collect::<Result<Vec<_>>>()?,
        ),
        (true, other) => {
            return Err(HardhatError::invalid_value(
                &argument.name,
                other.to_string(),
                argument.kind,
            ));
        }
        (false, value) => normalize_default(&argument.name, argument.kind, value)?,
    };
    Ok(Some(default))
}

fn check_positional_order(task: &str, positional: &[(String, PositionalArgument)]) -> Result<()> {
    let mut optional_seen: Option<&str> = None;
    let mut variadic_seen: Option<&str> = None;

    for (_, argument) in positional {
        if let Some(variadic) = variadic_seen {
            return Err(HardhatError::invalid_task(
                task,
                format!(
                    "argument '{}' follows the variadic argument '{}'",
                    argument.name, variadic
                ),
            ));
        }
        match optional_seen {
            Some(optional) if argument.is_required() => {
                return Err(HardhatError::invalid_task(
                    task,
                    format!(
                        "required argument '{}' follows the optional argument '{}'",
                        argument.name, optional
                    ),
                ));
            }
            None if !argument.is_required() => optional_seen = Some(&argument.name),
            _ => {}
        }
        if argument.variadic {
            variadic_seen = Some(&argument.name);
        }
    }
    Ok(())
}

/// The task tree and its runner.
pub struct TaskManager {
    root: BTreeMap<String, TaskNode>,
    hooks: Arc<HookManager>,
    /// Loaded actions keyed by (task id, action index).
    actions: RwLock<HashMap<(String, usize), TaskAction>>,
}

impl TaskManager {
    /// Build the task tree.
    ///
    /// Definitions are collected in plugin resolution order followed by
    /// `user_tasks`, then passed through the `tasks.extendTaskDefinitions`
    /// handler chain. The hook context must already be set.
    pub async fn new(
        plugins: &ResolvedPluginList,
        hooks: Arc<HookManager>,
        global_options: &GlobalOptionCatalog,
        reserved: &ReservedNames,
        user_tasks: Vec<TaskDefinition>,
    ) -> Result<Self> {
        let mut definitions: Vec<(String, TaskDefinition)> = Vec::new();
        for plugin in plugins {
            definitions.extend(
                plugin
                    .tasks
                    .iter()
                    .map(|task| (plugin.id.clone(), task.clone())),
            );
        }
        definitions.extend(
            user_tasks
                .into_iter()
                .map(|task| (USER_TASKS_OWNER.to_string(), task)),
        );

        let definitions = hooks
            .run_handler_chain(TASKS, EXTEND_TASK_DEFINITIONS, definitions, |definitions| async move {
                Ok(definitions)
            })
            .await?;

        let mut builder = TreeBuilder {
            root: BTreeMap::new(),
            global_options,
            reserved,
        };
        let count = definitions.len();
        for (owner, definition) in definitions {
            builder.register(&owner, definition)?;
        }

        tracing::debug!(
            "Built task tree from {} definitions, {} root tasks",
            count,
            builder.root.len()
        );
        Ok(Self {
            root: builder.root,
            hooks,
            actions: RwLock::new(HashMap::new()),
        })
    }

    /// Look up the node at `path`.
    pub fn get_task<S: AsRef<str>>(&self, path: &[S]) -> Result<&TaskNode> {
        let not_found = || {
            let id: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
            HardhatError::task_not_found(id.join(" "))
        };

        let (first, rest) = path.split_first().ok_or_else(not_found)?;
        let mut node = self.root.get(first.as_ref()).ok_or_else(not_found)?;
        for segment in rest {
            node = node.subtasks.get(segment.as_ref()).ok_or_else(not_found)?;
        }
        Ok(node)
    }

    pub fn has_task<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.get_task(path).is_ok()
    }

    /// Top-level tasks, sorted by name.
    pub fn root_tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.root.values()
    }

    pub fn describe<S: AsRef<str>>(&self, path: &[S]) -> Result<TaskDescription> {
        let node = self.get_task(path)?;
        Ok(TaskDescription {
            path: node.path.clone(),
            description: node.description.clone(),
            state: node.state(),
            options: node.options().cloned().collect(),
            positional: node.positional_arguments().cloned().collect(),
            subtasks: node.subtask_names(),
        })
    }

    /// Run the task at `path`.
    ///
    /// The most recent override runs first; the original action is innermost.
    /// Errors from actions are returned unchanged.
    pub async fn run<S: AsRef<str>>(
        &self,
        path: &[S],
        args: TaskArguments,
    ) -> Result<serde_json::Value> {
        let node = self.get_task(path)?;
        let id = node.id();
        if !node.is_runnable() {
            return Err(HardhatError::NamespaceNotRunnable {
                task: id,
                subtasks: node.subtask_names(),
            });
        }

        let args = prepare_arguments(node, args)?;
        let context = self.hooks.context()?;

        let mut actions = Vec::with_capacity(node.actions.len());
        for (index, (owner, source)) in node.actions.iter().enumerate() {
            actions.push(self.load_action(&id, index, owner, source).await?);
        }

        let mut next = TaskNext::unavailable(&id);
        for action in actions {
            let context = context.clone();
            let inner = next;
            next = TaskNext::new(
                &id,
                Arc::new(move |args: TaskArguments| action(args, context.clone(), inner.clone())),
            );
        }

        tracing::debug!("Running task '{}'", id);
        next.run(args).await
    }

    async fn load_action(
        &self,
        task: &str,
        index: usize,
        owner: &str,
        source: &TaskActionSource,
    ) -> Result<TaskAction> {
        let reference = match source {
            TaskActionSource::Inline(action) => return Ok(action.clone()),
            TaskActionSource::Reference(reference) => reference,
        };

        let key = (task.to_string(), index);
        if let Some(action) = self.actions.read().await.get(&key) {
            return Ok(action.clone());
        }

        tracing::trace!("Loading action of task '{}' from {}", task, owner);
        let action = self
            .hooks
            .loader()
            .load_task_action(owner, task, reference)
            .await?;

        let mut actions = self.actions.write().await;
        Ok(actions.entry(key).or_insert(action).clone())
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("root", &self.root.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Validate and coerce `args` against the options and positional arguments
/// of `node`, filling defaults.
fn prepare_arguments(node: &TaskNode, mut args: TaskArguments) -> Result<TaskArguments> {
    if let Some((name, _)) = args.iter().find(|(name, _)| node.argument_owner(name).is_none()) {
        return Err(HardhatError::UnrecognizedArgument {
            task: node.id(),
            argument: name.to_string(),
        });
    }

    let mut prepared = TaskArguments::new();
    for option in node.options() {
        let value = match args.remove(&option.name) {
            Some(value) => coerce_argument_value(&option.name, option.kind, value)?,
            None => option.default.clone(),
        };
        prepared.insert(option.name.clone(), value);
    }

    for argument in node.positional_arguments() {
        let value = match args.remove(&argument.name) {
            Some(value) if argument.variadic => {
                let values = match value {
                    ArgumentValue::List(values) => values,
                    single => vec![single],
                };
                if values.is_empty() && argument.is_required() {
                    return Err(HardhatError::MissingArgument {
                        task: node.id(),
                        argument: argument.name.clone(),
                    });
                }
                let coerced = values
                    .into_iter()
                    .map(|value| coerce_argument_value(&argument.name, argument.kind, value))
                    .collect::<Result<Vec<_>>>()?;
                ArgumentValue::List(coerced)
            }
            Some(value) => coerce_argument_value(&argument.name, argument.kind, value)?,
            None => argument
                .default
                .clone()
                .ok_or_else(|| HardhatError::MissingArgument {
                    task: node.id(),
                    argument: argument.name.clone(),
                })?,
        };
        prepared.insert(argument.name.clone(), value);
    }

    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ArgumentType;
    use crate::config::ResolvedConfig;
    use crate::global_options::{GlobalOptionDefinition, GlobalOptions, build_global_options_map};
    use crate::hooks::{HookContext, HookHandlers, NonInteractiveIo};
    use crate::loader::{ModuleLoader, StaticModuleRegistry};
    use crate::plugin::{LoadableRef, PluginDescriptor};
    use crate::tasks::task_action;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn build(
        plugins: Vec<PluginDescriptor>,
        loader: StaticModuleRegistry,
        user_tasks: Vec<TaskDefinition>,
    ) -> Result<TaskManager> {
        let list = ResolvedPluginList::from_ordered(plugins.into_iter().map(Arc::new).collect());
        let reserved = ReservedNames::builtin();
        let catalog = build_global_options_map(&list, &reserved)?;
        let hooks = HookManager::new(list.clone(), Arc::new(loader));
        hooks.set_context(HookContext::new(
            Arc::new(ResolvedConfig::default()),
            Arc::new(GlobalOptions::default()),
            Arc::new(NonInteractiveIo),
        ))?;
        TaskManager::new(&list, hooks, &catalog, &reserved, user_tasks).await
    }

    fn echo_args() -> TaskDefinition {
        TaskDefinition::new(["echo"])
            .with_option(TaskOption::flag("quiet", ""))
            .with_positional(PositionalArgument::required("count", ArgumentType::Int))
            .with_positional(PositionalArgument::variadic("words", ArgumentType::String))
            .with_inline_action(|args, _ctx, _next| async move { Ok(json!(args)) })
    }

    #[tokio::test]
    async fn test_states() {
        let manager = build(
            vec![],
            StaticModuleRegistry::new(),
            vec![
                TaskDefinition::new(["ignition", "deploy"])
                    .with_inline_action(|_, _, _| async move { Ok(json!(null)) }),
                TaskDefinition::new(["test"])
                    .with_inline_action(|_, _, _| async move { Ok(json!(null)) }),
                TaskDefinition::new(["solidity"]).subtask_of(["test"])
                    .with_inline_action(|_, _, _| async move { Ok(json!(null)) }),
            ],
        )
        .await
        .unwrap();

        assert_eq!(manager.get_task(&["ignition"]).unwrap().state(), TaskState::Namespace);
        assert_eq!(
            manager.get_task(&["ignition", "deploy"]).unwrap().state(),
            TaskState::Runnable
        );
        assert_eq!(
            manager.get_task(&["test"]).unwrap().state(),
            TaskState::RunnableNamespace
        );

        let names: Vec<String> = manager.root_tasks().map(TaskNode::id).collect();
        assert_eq!(names, vec!["ignition", "test"]);
    }

    #[tokio::test]
    async fn test_argument_preparation() {
        let manager = build(vec![], StaticModuleRegistry::new(), vec![echo_args()])
            .await
            .unwrap();

        let result = manager
            .run(
                &["echo"],
                TaskArguments::new().with("count", "3").with("words", "hello"),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"quiet": false, "count": 3, "words": ["hello"]}));

        let err = manager
            .run(&["echo"], TaskArguments::new().with("words", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::MissingArgument { ref argument, .. } if argument == "count"));

        let err = manager
            .run(
                &["echo"],
                TaskArguments::new().with("count", 1i64).with("words", "a").with("loud", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::UnrecognizedArgument { ref argument, .. } if argument == "loud"));

        let err = manager
            .run(
                &["echo"],
                TaskArguments::new().with("count", "three").with("words", "a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvalidValueForType { .. }));

        let err = manager
            .run(
                &["echo"],
                TaskArguments::new()
                    .with("count", 1i64)
                    .with("words", ArgumentValue::List(vec![])),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::MissingArgument { ref argument, .. } if argument == "words"));
    }

    #[tokio::test]
    async fn test_flag_option_defaults_to_false() {
        let task = TaskDefinition::new(["clean"])
            .with_option(TaskOption::new("global", "", ArgumentType::Flag, true));
        let err = build(vec![], StaticModuleRegistry::new(), vec![task])
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvalidValueForType { ref name, .. } if name == "global"));
    }

    /// Counts action loads before handing them to the inner registry.
    struct CountingLoader {
        inner: StaticModuleRegistry,
        action_loads: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ModuleLoader for CountingLoader {
        async fn load_plugin(
            &self,
            owner: &str,
            reference: &LoadableRef,
        ) -> Result<Arc<PluginDescriptor>> {
            self.inner.load_plugin(owner, reference).await
        }

        async fn load_hook_handlers(
            &self,
            plugin_id: &str,
            category: &str,
            reference: &LoadableRef,
        ) -> Result<HookHandlers> {
            self.inner.load_hook_handlers(plugin_id, category, reference).await
        }

        async fn load_task_action(
            &self,
            plugin_id: &str,
            task: &str,
            reference: &LoadableRef,
        ) -> Result<TaskAction> {
            self.action_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_task_action(plugin_id, task, reference).await
        }
    }

    #[tokio::test]
    async fn test_referenced_action_loaded_once() {
        let action_loads = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let loader = CountingLoader {
            inner: StaticModuleRegistry::new().with_task_action(
                "compiler",
                "./compile",
                task_action(move |_args, _ctx, _next| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move { Ok(json!("compiled")) }
                }),
            ),
            action_loads: action_loads.clone(),
        };
        let plugin = PluginDescriptor::new("compiler")
            .with_task(TaskDefinition::new(["compile"]).with_action("./compile"));

        let list = ResolvedPluginList::from_ordered(vec![Arc::new(plugin)]);
        let reserved = ReservedNames::builtin();
        let catalog = build_global_options_map(&list, &reserved).unwrap();
        let hooks = HookManager::new(list.clone(), Arc::new(loader));
        hooks
            .set_context(HookContext::new(
                Arc::new(ResolvedConfig::default()),
                Arc::new(GlobalOptions::default()),
                Arc::new(NonInteractiveIo),
            ))
            .unwrap();
        let manager = TaskManager::new(&list, hooks, &catalog, &reserved, vec![])
            .await
            .unwrap();

        assert_eq!(action_loads.load(Ordering::SeqCst), 0);
        assert_eq!(manager.run(&["compile"], TaskArguments::new()).await.unwrap(), json!("compiled"));
        assert_eq!(manager.run(&["compile"], TaskArguments::new()).await.unwrap(), json!("compiled"));
        assert_eq!(action_loads.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(manager.get_task(&["compile"]).unwrap().action_owners(), vec!["compiler"]);
    }

    #[tokio::test]
    async fn test_option_shadowing_global_option() {
        let plugin = PluginDescriptor::new("network")
            .with_global_option(GlobalOptionDefinition::string("network", "", "local"))
            .with_task(
                TaskDefinition::new(["node"])
                    .with_option(TaskOption::new("network", "", ArgumentType::String, "x")),
            );

        let err = build(vec![plugin], StaticModuleRegistry::new(), vec![])
            .await
            .unwrap_err();
        match err {
            HardhatError::AlreadyDefined { name, defined_by, .. } => {
                assert_eq!(name, "network");
                assert_eq!(defined_by, "network");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_positional_ordering() {
        let task = TaskDefinition::new(["flatten"])
            .with_positional(PositionalArgument::optional("root", ArgumentType::String, "."))
            .with_positional(PositionalArgument::required("file", ArgumentType::File));
        let err = build(vec![], StaticModuleRegistry::new(), vec![task])
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvalidTaskDefinition { .. }));

        let task = TaskDefinition::new(["flatten"])
            .with_positional(PositionalArgument::variadic("files", ArgumentType::File))
            .with_positional(PositionalArgument::optional("root", ArgumentType::String, "."));
        let err = build(vec![], StaticModuleRegistry::new(), vec![task])
            .await
            .unwrap_err();
        assert!(matches!(err, HardhatError::InvalidTaskDefinition { .. }));
    }

    #[tokio::test]
    async fn test_describe() {
        let manager = build(
            vec![],
            StaticModuleRegistry::new(),
            vec![
                echo_args().with_description("Print arguments"),
                TaskDefinition::new(["echo"]).with_description(""),
                TaskDefinition::new(["twice"]).subtask_of(["echo"]),
            ],
        )
        .await
        .unwrap();

        let description = manager.describe(&["echo"]).unwrap();
        assert_eq!(description.description, "Print arguments");
        assert_eq!(description.state, TaskState::RunnableNamespace);
        assert_eq!(description.subtasks, vec!["twice"]);
        assert_eq!(description.positional.len(), 2);
    }
}
