//! Plugin dependency resolution.
//!
//! Candidates are expanded depth first, dependencies before dependents. The
//! walk uses an explicit stack so long dependency chains cannot overflow the
//! call stack while deferred dependencies are awaited.

use indexmap::IndexSet;
use std::collections::HashMap;
use std::sync::Arc;

use crate::loader::ModuleLoader;
use crate::plugin::{PluginDependency, PluginDescriptor};
use crate::{HardhatError, Result};

/// Ordered, deduplicated plugin list where every dependency precedes its
/// dependents.
#[derive(Debug, Clone)]
pub struct ResolvedPluginList {
    plugins: Arc<[Arc<PluginDescriptor>]>,
}

impl ResolvedPluginList {
    /// An empty list.
    pub fn empty() -> Self {
        Self::from_ordered(Vec::new())
    }

    /// Wrap plugins that are already in resolution order.
    pub(crate) fn from_ordered(plugins: Vec<Arc<PluginDescriptor>>) -> Self {
        Self {
            plugins: Arc::from(plugins),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<PluginDescriptor>> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin ids in resolution order.
    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PluginDescriptor>> {
        self.plugins.iter().find(|p| p.id == id)
    }

    /// Index of `id` in resolution order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.id == id)
    }
}

impl Default for ResolvedPluginList {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a ResolvedPluginList {
    type Item = &'a Arc<PluginDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<PluginDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Frame {
    plugin: Arc<PluginDescriptor>,
    next_dependency: usize,
}

struct Resolution {
    stack: Vec<Frame>,
    in_progress: IndexSet<String>,
    finished: HashMap<String, Arc<PluginDescriptor>>,
    resolved: Vec<Arc<PluginDescriptor>>,
}

impl Resolution {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            in_progress: IndexSet::new(),
            finished: HashMap::new(),
            resolved: Vec::new(),
        }
    }

    /// Start visiting `plugin`, unless it was already resolved.
    fn enter(&mut self, plugin: Arc<PluginDescriptor>) -> Result<()> {
        if let Some(start) = self.in_progress.get_index_of(&plugin.id) {
            let mut cycle: Vec<String> = self.in_progress.iter().skip(start).cloned().collect();
            cycle.push(plugin.id.clone());
            return Err(HardhatError::CyclicDependency { cycle });
        }

        if let Some(existing) = self.finished.get(&plugin.id) {
            if Arc::ptr_eq(existing, &plugin) || **existing == *plugin {
                return Ok(());
            }
            return Err(HardhatError::DuplicatePluginId {
                plugin: plugin.id.clone(),
            });
        }

        self.in_progress.insert(plugin.id.clone());
        self.stack.push(Frame {
            plugin,
            next_dependency: 0,
        });
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.in_progress.pop();
            self.finished
                .insert(frame.plugin.id.clone(), frame.plugin.clone());
            self.resolved.push(frame.plugin);
        }
    }
}

/// Resolve `candidates` and their dependencies into a [`ResolvedPluginList`].
///
/// A plugin reached twice is kept once, at the position of its first
/// resolution. Reaching an id again with a different descriptor is a
/// [`HardhatError::DuplicatePluginId`]; reaching an id that is still being
/// expanded is a [`HardhatError::CyclicDependency`].
pub async fn resolve_plugin_list(
    candidates: &[Arc<PluginDescriptor>],
    loader: &dyn ModuleLoader,
) -> Result<ResolvedPluginList> {
    let mut resolution = Resolution::new();

    for candidate in candidates {
        resolution.enter(candidate.clone())?;

        while let Some(frame) = resolution.stack.last_mut() {
            let Some(dependency) = frame.plugin.dependencies.get(frame.next_dependency).cloned()
            else {
                resolution.finish();
                continue;
            };
            frame.next_dependency += 1;
            let owner = frame.plugin.id.clone();

            let plugin = match dependency {
                PluginDependency::Resolved(plugin) => plugin,
                PluginDependency::Deferred(reference) => {
                    tracing::trace!("Loading dependency '{}' of plugin {}", reference, owner);
                    loader.load_plugin(&owner, &reference).await?
                }
            };
            resolution.enter(plugin)?;
        }
    }

    let list = ResolvedPluginList::from_ordered(resolution.resolved);
    tracing::debug!("Resolved {} plugins: {}", list.len(), list.ids().join(", "));
    Ok(list)
}
