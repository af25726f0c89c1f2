//! Engine error types.

use thiserror::Error;

/// Errors raised by plugin resolution, option handling, hook dispatch and
/// task composition.
///
/// Errors returned by hook handlers and task actions travel through the
/// engine untouched: a handler returning `HardhatError::Other(..)` reaches
/// the caller as exactly that value.
#[derive(Error, Debug)]
pub enum HardhatError {
    /// A plugin depends, directly or transitively, on itself.
    #[error("Cyclic plugin dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Two different plugin descriptors share an id.
    #[error("Duplicate plugin id '{plugin}': two different plugins use this id")]
    DuplicatePluginId { plugin: String },

    /// A name does not match the identifier grammar.
    #[error("Invalid {kind} name '{name}' defined by '{plugin}'")]
    InvalidName {
        kind: &'static str,
        name: String,
        plugin: String,
    },

    /// A name collides with the reserved-name set.
    #[error("The {kind} name '{name}' defined by '{plugin}' is reserved")]
    ReservedName {
        kind: &'static str,
        name: String,
        plugin: String,
    },

    /// A name has already been defined by another plugin.
    #[error("The {kind} '{name}' defined by '{plugin}' is already defined by '{defined_by}'")]
    AlreadyDefined {
        kind: &'static str,
        name: String,
        plugin: String,
        defined_by: String,
    },

    /// A value cannot be coerced to the declared type.
    #[error("Invalid value '{value}' for '{name}': expected {expected}")]
    InvalidValueForType {
        name: String,
        value: String,
        expected: String,
    },

    /// No task exists at the given path.
    #[error("Task not found: {task}")]
    TaskNotFound { task: String },

    /// Internal contract broken by the caller or a plugin.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A deferred plugin dependency could not be loaded.
    #[error("Failed to load plugin '{reference}' required by '{plugin}': {message}")]
    PluginLoad {
        plugin: String,
        reference: String,
        message: String,
    },

    /// A plugin's hook handler category could not be loaded.
    #[error("Failed to load '{category}' hook handlers of plugin '{plugin}': {message}")]
    HandlerLoad {
        plugin: String,
        category: String,
        message: String,
    },

    /// A task action could not be loaded.
    #[error("Failed to load the action of task '{task}' from plugin '{plugin}': {message}")]
    ActionLoad {
        task: String,
        plugin: String,
        message: String,
    },

    /// A task definition is structurally invalid.
    #[error("Invalid definition of task '{task}': {message}")]
    InvalidTaskDefinition { task: String, message: String },

    /// A required positional argument was not provided.
    #[error("Missing value for argument '{argument}' of task '{task}'")]
    MissingArgument { task: String, argument: String },

    /// An argument that the task does not declare was provided.
    #[error("Unrecognized argument '{argument}' for task '{task}'")]
    UnrecognizedArgument { task: String, argument: String },

    /// A namespace task without its own action was run.
    #[error("Task '{task}' is a namespace, run one of its subtasks: {}", subtasks.join(", "))]
    NamespaceNotRunnable { task: String, subtasks: Vec<String> },

    /// The user interruption boundary failed.
    #[error("User interaction failed: {0}")]
    Interaction(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by handler or action code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HardhatError {
    /// Create an invalid name error.
    pub fn invalid_name(
        kind: &'static str,
        name: impl Into<String>,
        plugin: impl Into<String>,
    ) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
            plugin: plugin.into(),
        }
    }

    /// Create a reserved name error.
    pub fn reserved_name(
        kind: &'static str,
        name: impl Into<String>,
        plugin: impl Into<String>,
    ) -> Self {
        Self::ReservedName {
            kind,
            name: name.into(),
            plugin: plugin.into(),
        }
    }

    /// Create an already defined error.
    pub fn already_defined(
        kind: &'static str,
        name: impl Into<String>,
        plugin: impl Into<String>,
        defined_by: impl Into<String>,
    ) -> Self {
        Self::AlreadyDefined {
            kind,
            name: name.into(),
            plugin: plugin.into(),
            defined_by: defined_by.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(
        name: impl Into<String>,
        value: impl Into<String>,
        expected: impl ToString,
    ) -> Self {
        Self::InvalidValueForType {
            name: name.into(),
            value: value.into(),
            expected: expected.to_string(),
        }
    }

    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create an invalid task definition error.
    pub fn invalid_task(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTaskDefinition {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a task not found error.
    pub fn task_not_found(task: impl Into<String>) -> Self {
        Self::TaskNotFound { task: task.into() }
    }
}

impl From<toml::de::Error> for HardhatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, HardhatError>;
