//! Task definitions contributed by plugins and users.

use std::future::Future;
use std::sync::Arc;

use super::action::{TaskAction, TaskArguments, TaskNext, task_action};
use crate::arguments::{ArgumentType, ArgumentValue};
use crate::hooks::HookContext;
use crate::plugin::LoadableRef;
use crate::Result;

/// Named task option. Options are always optional.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOption {
    pub name: String,
    pub description: String,
    pub kind: ArgumentType,
    pub default: ArgumentValue,
}

impl TaskOption {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ArgumentType,
        default: impl Into<ArgumentValue>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            default: default.into(),
        }
    }

    /// Boolean option enabled by presence, `false` by default.
    pub fn flag(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ArgumentType::Flag, false)
    }
}

/// Positional task argument. Required when it has no default.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalArgument {
    pub name: String,
    pub description: String,
    pub kind: ArgumentType,
    pub default: Option<ArgumentValue>,
    /// Collects every remaining value into a list. Must be last.
    pub variadic: bool,
}

impl PositionalArgument {
    pub fn required(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            default: None,
            variadic: false,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ArgumentType,
        default: impl Into<ArgumentValue>,
    ) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::required(name, kind)
        }
    }

    /// Required variadic argument.
    pub fn variadic(name: impl Into<String>, kind: ArgumentType) -> Self {
        Self {
            variadic: true,
            ..Self::required(name, kind)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<ArgumentValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Where the action of a definition comes from.
#[derive(Clone)]
pub enum TaskActionSource {
    /// Loaded through the module loader on first run.
    Reference(LoadableRef),
    /// Provided directly.
    Inline(TaskAction),
}

impl std::fmt::Debug for TaskActionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
            Self::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

impl PartialEq for TaskActionSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Reference(a), Self::Reference(b)) => a == b,
            (Self::Inline(a), Self::Inline(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A new task, or an override of an existing one when the path exists.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub path: Vec<String>,
    pub subtask_of: Option<Vec<String>>,
    pub description: String,
    pub options: Vec<TaskOption>,
    pub positional: Vec<PositionalArgument>,
    pub action: Option<TaskActionSource>,
}

impl TaskDefinition {
    /// Define the task at `path`.
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            subtask_of: None,
            description: String::new(),
            options: Vec::new(),
            positional: Vec::new(),
            action: None,
        }
    }

    /// Define a namespace: a task that only groups subtasks.
    pub fn namespace<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(path)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_option(mut self, option: TaskOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_positional(mut self, argument: PositionalArgument) -> Self {
        self.positional.push(argument);
        self
    }

    /// Action loaded from `reference` relative to the defining plugin.
    pub fn with_action(mut self, reference: impl Into<LoadableRef>) -> Self {
        self.action = Some(TaskActionSource::Reference(reference.into()));
        self
    }

    pub fn with_inline_action<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TaskArguments, Arc<HookContext>, TaskNext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.action = Some(TaskActionSource::Inline(task_action(f)));
        self
    }

    /// Place the task under `parent`.
    pub fn subtask_of<I, S>(mut self, parent: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subtask_of = Some(parent.into_iter().map(Into::into).collect());
        self
    }

    /// Parent path followed by the task's own path.
    pub fn full_path(&self) -> Vec<String> {
        let mut full = self.subtask_of.clone().unwrap_or_default();
        full.extend(self.path.iter().cloned());
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let task = TaskDefinition::new(["verify"]).subtask_of(["etherscan"]);
        assert_eq!(task.full_path(), vec!["etherscan", "verify"]);

        let nested = TaskDefinition::new(["ignition", "deploy"]);
        assert_eq!(nested.full_path(), vec!["ignition", "deploy"]);
    }

    #[test]
    fn test_inline_actions_compare_by_identity() {
        let a = TaskDefinition::new(["compile"])
            .with_inline_action(|_args, _ctx, _next| async move { Ok(serde_json::Value::Null) });
        let b = a.clone();
        let c = TaskDefinition::new(["compile"])
            .with_inline_action(|_args, _ctx, _next| async move { Ok(serde_json::Value::Null) });

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            TaskDefinition::new(["compile"]).with_action("./compile"),
            TaskDefinition::new(["compile"]).with_action("./compile")
        );
    }

    #[test]
    fn test_positional_builders() {
        let files = PositionalArgument::variadic("files", ArgumentType::File)
            .with_description("Files to check");
        assert!(files.variadic);
        assert!(files.is_required());

        let runs = PositionalArgument::optional("runs", ArgumentType::Int, 200i64);
        assert!(!runs.is_required());
        assert_eq!(runs.default, Some(ArgumentValue::Int(200)));
    }
}
