//! Global option registry.
//!
//! Plugins contribute typed options; the catalog validates them once and
//! values are resolved from caller input, the environment and defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::arguments::{
    ArgumentType, ArgumentValue, coerce_argument_value, is_valid_argument_name,
    normalize_default, parse_argument_value,
};
use crate::reserved::ReservedNames;
use crate::resolver::ResolvedPluginList;
use crate::{HardhatError, Result};

const KIND: &str = "global option";

/// A typed option contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalOptionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ArgumentType,
    pub default: ArgumentValue,
}

impl GlobalOptionDefinition {
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

    pub fn string(name: impl Into<String>, description: impl Into<String>, default: &str) -> Self {
        Self::new(name, description, ArgumentType::String, default)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>, default: bool) -> Self {
        Self::new(name, description, ArgumentType::Boolean, default)
    }

    /// Boolean option defaulting to `false`.
    pub fn flag(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ArgumentType::Flag, false)
    }

    pub fn int(name: impl Into<String>, description: impl Into<String>, default: i64) -> Self {
        Self::new(name, description, ArgumentType::Int, default)
    }
}

/// A catalog entry: the definition and the plugin that contributed it.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalOptionEntry {
    pub plugin_id: String,
    pub definition: GlobalOptionDefinition,
}

/// Validated options in the order plugins declared them.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptionCatalog {
    entries: IndexMap<String, GlobalOptionEntry>,
}

impl GlobalOptionCatalog {
    pub fn get(&self, name: &str) -> Option<&GlobalOptionEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GlobalOptionEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the plugin that defined `name`.
    pub fn defined_by(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.plugin_id.as_str())
    }
}

/// Build the option catalog from the resolved plugins.
///
/// The first plugin to define a name owns it; a later definition fails with
/// [`HardhatError::AlreadyDefined`] naming both plugins.
pub fn build_global_options_map(
    plugins: &ResolvedPluginList,
    reserved: &ReservedNames,
) -> Result<GlobalOptionCatalog> {
    let mut entries: IndexMap<String, GlobalOptionEntry> = IndexMap::new();

    for plugin in plugins {
        for definition in &plugin.global_options {
            let name = &definition.name;

            if !is_valid_argument_name(name) {
                return Err(HardhatError::invalid_name(KIND, name, &plugin.id));
            }
            if reserved.contains(name) {
                return Err(HardhatError::reserved_name(KIND, name, &plugin.id));
            }
            if let Some(existing) = entries.get(name) {
                return Err(HardhatError::already_defined(
                    KIND,
                    name,
                    &plugin.id,
                    &existing.plugin_id,
                ));
            }
            let default = normalize_default(name, definition.kind, definition.default.clone())?;

            entries.insert(
                name.clone(),
                GlobalOptionEntry {
                    plugin_id: plugin.id.clone(),
                    definition: GlobalOptionDefinition {
                        default,
                        ..definition.clone()
                    },
                },
            );
        }
    }

    tracing::debug!("Built global option catalog with {} options", entries.len());
    Ok(GlobalOptionCatalog { entries })
}

/// Read access to environment variables.
pub trait EnvironmentSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Environment variable feeding option `name`: `paramName` -> `HARDHAT_PARAMNAME`.
pub fn global_option_env_var(prefix: &str, name: &str) -> String {
    let suffix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{}_{}", prefix, suffix)
}

/// Resolved option values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    values: IndexMap<String, ArgumentValue>,
}

impl GlobalOptions {
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve every catalog option.
///
/// Precedence: `user` value, then the environment variable, then the default.
pub fn resolve_global_options(
    user: &HashMap<String, ArgumentValue>,
    catalog: &GlobalOptionCatalog,
    env: &dyn EnvironmentSource,
    prefix: &str,
) -> Result<GlobalOptions> {
    for name in user.keys() {
        if !catalog.contains(name) {
            tracing::trace!("Ignoring unknown global option '{}'", name);
        }
    }

    let mut values = IndexMap::with_capacity(catalog.len());
    for (name, entry) in catalog.iter() {
        let kind = entry.definition.kind;

        let value = if let Some(value) = user.get(name) {
            coerce_argument_value(name, kind, value.clone())?
        } else if let Some(raw) = env.var(&global_option_env_var(prefix, name)) {
            parse_argument_value(name, kind, &raw)?
        } else {
            entry.definition.default.clone()
        };

        values.insert(name.to_string(), value);
    }

    Ok(GlobalOptions { values })
}
