//! Plugin descriptors.
//!
//! A descriptor is plain data: everything executable (dependencies that are
//! not yet loaded, hook handlers, task actions) is referenced through a
//! [`LoadableRef`] and resolved by a [`ModuleLoader`](crate::ModuleLoader).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::global_options::GlobalOptionDefinition;
use crate::tasks::TaskDefinition;

/// Opaque key of a loadable module, relative to the plugin that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadableRef(String);

impl LoadableRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoadableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LoadableRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

impl From<String> for LoadableRef {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

/// A dependency of a plugin.
#[derive(Debug, Clone)]
pub enum PluginDependency {
    /// Descriptor available up front.
    Resolved(Arc<PluginDescriptor>),
    /// Descriptor loaded on demand through the module loader.
    Deferred(LoadableRef),
}

impl PluginDependency {
    pub fn deferred(reference: impl Into<LoadableRef>) -> Self {
        Self::Deferred(reference.into())
    }
}

impl PartialEq for PluginDependency {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resolved(a), Self::Resolved(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Deferred(a), Self::Deferred(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Arc<PluginDescriptor>> for PluginDependency {
    fn from(plugin: Arc<PluginDescriptor>) -> Self {
        Self::Resolved(plugin)
    }
}

impl From<PluginDescriptor> for PluginDependency {
    fn from(plugin: PluginDescriptor) -> Self {
        Self::Resolved(Arc::new(plugin))
    }
}

/// Everything a plugin contributes to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescriptor {
    /// Unique plugin identifier
    pub id: String,

    /// Package that ships the plugin, for diagnostics
    pub npm_package: Option<String>,

    /// Plugins that must be resolved before this one
    pub dependencies: Vec<PluginDependency>,

    /// Hook handler modules by category
    pub hook_handlers: BTreeMap<String, LoadableRef>,

    /// Global options contributed by the plugin
    pub global_options: Vec<GlobalOptionDefinition>,

    /// Tasks defined or overridden by the plugin
    pub tasks: Vec<TaskDefinition>,
}

impl PluginDescriptor {
    /// Create an empty descriptor.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            npm_package: None,
            dependencies: Vec::new(),
            hook_handlers: BTreeMap::new(),
            global_options: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Set the package name.
    pub fn with_npm_package(mut self, package: impl Into<String>) -> Self {
        self.npm_package = Some(package.into());
        self
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, dependency: impl Into<PluginDependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Declare the handler module of a hook category.
    pub fn with_hook_handlers(
        mut self,
        category: impl Into<String>,
        reference: impl Into<LoadableRef>,
    ) -> Self {
        self.hook_handlers.insert(category.into(), reference.into());
        self
    }

    /// Add a global option.
    pub fn with_global_option(mut self, option: GlobalOptionDefinition) -> Self {
        self.global_options.push(option);
        self
    }

    /// Add a task definition.
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    /// Label used in logs and errors.
    pub fn display_name(&self) -> String {
        match &self.npm_package {
            Some(package) => format!("{} ({})", self.id, package),
            None => self.id.clone(),
        }
    }
}
