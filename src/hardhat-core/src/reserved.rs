//! Names that plugins may not use for options or task arguments.

use std::collections::BTreeSet;

/// Names used by built-in flags.
pub const BUILTIN_RESERVED_NAMES: &[&str] = &["config", "help", "init", "showStackTraces", "version"];

/// Registry of reserved names.
///
/// Constructed explicitly and passed to whoever validates names. It only
/// grows: plugins and configuration can add names, nothing removes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservedNames {
    names: BTreeSet<String>,
}

impl ReservedNames {
    /// Registry seeded with [`BUILTIN_RESERVED_NAMES`].
    pub fn builtin() -> Self {
        let mut reserved = Self::empty();
        reserved.extend(BUILTIN_RESERVED_NAMES.iter().copied());
        reserved
    }

    /// Registry without any name. Useful for isolated tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reserve a name. Returns `false` if it was already reserved.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Reserve several names.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
