//! Engine configuration and the per-plugin extension registry.
//!
//! Plugins never add fields to the shared configuration. Each plugin stores
//! its own payload in [`Extensions`] under its id and reads it back through a
//! typed accessor.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;

/// Base configuration of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Project root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Prefix of the environment variables that feed global options
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Names reserved in addition to the built-in ones
    #[serde(default)]
    pub reserved_names: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            env_prefix: default_env_prefix(),
            reserved_names: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Create a configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_env_prefix() -> String {
    crate::DEFAULT_ENV_PREFIX.to_string()
}

/// Type-erased payloads keyed by the id of the plugin that owns them.
#[derive(Clone, Default)]
pub struct Extensions {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the extension of `plugin_id`, replacing any previous one.
    pub fn insert<T: Any + Send + Sync>(&mut self, plugin_id: impl Into<String>, value: T) {
        self.entries.insert(plugin_id.into(), Arc::new(value));
    }

    /// Builder form of [`Extensions::insert`].
    pub fn with<T: Any + Send + Sync>(mut self, plugin_id: impl Into<String>, value: T) -> Self {
        self.insert(plugin_id, value);
        self
    }

    /// Get the extension of `plugin_id` if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, plugin_id: &str) -> Option<&T> {
        self.entries.get(plugin_id)?.downcast_ref::<T>()
    }

    /// Check whether `plugin_id` stored an extension.
    pub fn contains(&self, plugin_id: &str) -> bool {
        self.entries.contains_key(plugin_id)
    }

    /// Ids of the plugins that stored an extension, sorted.
    pub fn plugin_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("plugins", &self.plugin_ids())
            .finish()
    }
}

/// Configuration surface handed to hook handlers and task actions.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    /// Base configuration
    pub engine: EngineConfig,

    /// Plugin extensions
    pub extensions: Extensions,
}

impl ResolvedConfig {
    pub fn new(engine: EngineConfig, extensions: Extensions) -> Self {
        Self { engine, extensions }
    }

    /// Typed access to the extension of `plugin_id`.
    pub fn extension<T: Any + Send + Sync>(&self, plugin_id: &str) -> Option<&T> {
        self.extensions.get(plugin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct GasReporter {
        enabled: bool,
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.env_prefix, "HARDHAT");
        assert!(config.reserved_names.is_empty());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EngineConfig::parse(
            r#"
            root = "/project"
            reserved_names = ["network"]
            "#,
        )
        .unwrap();

        assert_eq!(config.root, PathBuf::from("/project"));
        assert_eq!(config.env_prefix, "HARDHAT");
        assert_eq!(config.reserved_names, vec!["network".to_string()]);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = EngineConfig::parse("root = [");
        assert!(matches!(result, Err(crate::HardhatError::Config(_))));
    }

    #[test]
    fn test_extension_typed_access() {
        let extensions = Extensions::new().with("gas-reporter", GasReporter { enabled: true });

        assert_eq!(
            extensions.get::<GasReporter>("gas-reporter"),
            Some(&GasReporter { enabled: true })
        );
        // Wrong type is not an error, just absent
        assert!(extensions.get::<String>("gas-reporter").is_none());
        assert!(extensions.get::<GasReporter>("other").is_none());
        assert!(extensions.contains("gas-reporter"));
    }

    #[test]
    fn test_resolved_config_extension() {
        let mut extensions = Extensions::new();
        extensions.insert("b", 2u32);
        extensions.insert("a", 1u32);

        let config = ResolvedConfig::new(EngineConfig::default(), extensions);
        assert_eq!(config.extension::<u32>("a"), Some(&1));
        assert_eq!(config.extensions.plugin_ids(), vec!["a", "b"]);
    }
}
