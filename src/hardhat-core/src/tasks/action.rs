//! Task actions, their arguments and the override continuation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::arguments::ArgumentValue;
use crate::hooks::HookContext;
use crate::{HardhatError, Result};

/// Boxed future returned by task actions.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// A task action. `next` runs the action this one overrides.
pub type TaskAction =
    Arc<dyn Fn(TaskArguments, Arc<HookContext>, TaskNext) -> TaskFuture + Send + Sync>;

/// Wrap an async function as a [`TaskAction`].
pub fn task_action<F, Fut>(f: F) -> TaskAction
where
    F: Fn(TaskArguments, Arc<HookContext>, TaskNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
{
    Arc::new(move |args, context, next| Box::pin(f(args, context, next)))
}

/// Named argument values passed to a task action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskArguments {
    values: IndexMap<String, ArgumentValue>,
}

impl TaskArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TaskArguments::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_int()
    }

    pub fn get_bigint(&self, name: &str) -> Option<i128> {
        self.get(name)?.as_bigint()
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_float()
    }

    pub fn get_path(&self, name: &str) -> Option<&std::path::Path> {
        self.get(name)?.as_path()
    }

    pub fn get_list(&self, name: &str) -> Option<&[ArgumentValue]> {
        self.get(name)?.as_list()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<ArgumentValue> {
        self.values.shift_remove(name)
    }
}

type TaskContinuation = Arc<dyn Fn(TaskArguments) -> TaskFuture + Send + Sync>;

/// Continuation to the overridden action of a task.
#[derive(Clone)]
pub struct TaskNext {
    task: String,
    inner: Option<TaskContinuation>,
}

impl TaskNext {
    pub(crate) fn unavailable(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            inner: None,
        }
    }

    pub(crate) fn new(task: impl Into<String>, inner: TaskContinuation) -> Self {
        Self {
            task: task.into(),
            inner: Some(inner),
        }
    }

    /// `false` for the original action of a task, which overrides nothing.
    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    /// Run the overridden action.
    pub fn run(&self, args: TaskArguments) -> TaskFuture {
        match &self.inner {
            Some(inner) => inner(args),
            None => {
                let task = self.task.clone();
                Box::pin(async move {
                    Err(HardhatError::invariant(format!(
                        "task '{}' has no overridden action to run",
                        task
                    )))
                })
            }
        }
    }
}

impl std::fmt::Debug for TaskNext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskNext")
            .field("task", &self.task)
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unavailable_next() {
        let next = TaskNext::unavailable("compile");
        assert!(!next.is_available());

        let err = next.run(TaskArguments::new()).await.unwrap_err();
        assert!(matches!(err, HardhatError::InvariantViolation(ref m) if m.contains("compile")));
    }

    #[tokio::test]
    async fn test_available_next() {
        let next = TaskNext::new(
            "compile",
            Arc::new(|args: TaskArguments| -> TaskFuture {
                Box::pin(async move { Ok(json!(args.get_int("runs"))) })
            }),
        );
        assert!(next.is_available());

        let result = next.run(TaskArguments::new().with("runs", 200i64)).await.unwrap();
        assert_eq!(result, json!(200));
    }

    #[test]
    fn test_arguments_serialize_in_order() {
        let args = TaskArguments::new()
            .with("quiet", true)
            .with("network", "sepolia");
        assert_eq!(
            serde_json::to_string(&args).unwrap(),
            r#"{"quiet":true,"network":"sepolia"}"#
        );
    }
}
