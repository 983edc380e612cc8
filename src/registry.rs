//! The applet table: a name → entry mapping that is built once and then only read.

use crate::command::{Applet, CommandEntry};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("applet name must not be empty")]
    EmptyName,
    #[error("applet `{0}` is already registered")]
    Duplicate(String),
}

/// Collects applets before the shell starts.
///
/// The only way to obtain a [`Registry`] is [`RegistryBuilder::build`], which consumes
/// the builder; there is no mutation path on the finished table.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, CommandEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `applet` under `name`.
    ///
    /// Names are matched exactly and case-sensitively, so `ls` and `LS` are distinct keys.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        applet: impl Applet + 'static,
    ) -> Result<&mut Self, RegistryError> {
        self.register_shared(name, Arc::new(applet))
    }

    /// Same as [`register`](Self::register) for an applet that is already shared.
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        applet: Arc<dyn Applet>,
    ) -> Result<&mut Self, RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        let entry = CommandEntry::new(name.as_str(), applet);
        self.entries.insert(name, entry);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

/// Immutable applet table, safe to share across threads and look up concurrently.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, CommandEntry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Exact-match lookup. A miss is a normal outcome, not an error.
    pub fn resolve(&self, name: &str) -> Option<CommandEntry> {
        self.entries.get(name).cloned()
    }

    /// Registered names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;

    fn noop(_: &mut dyn Write, _: &[String]) -> Result<()> {
        Ok(())
    }

    fn named(_: &mut dyn Write, _: &[String]) -> Result<()> {
        Err(anyhow::anyhow!("named"))
    }

    #[test]
    fn test_resolve_is_exact_and_case_sensitive() {
        let mut builder = Registry::builder();
        builder.register("ls", noop).unwrap();
        let registry = builder.build();

        assert!(registry.resolve("ls").is_some());
        assert!(registry.resolve("LS").is_none());
        assert!(registry.resolve("l").is_none());
        assert!(registry.resolve("ls ").is_none());
    }

    #[test]
    fn test_resolve_returns_registered_entry() {
        let mut builder = Registry::builder();
        builder.register("a", noop).unwrap().register("b", named).unwrap();
        let registry = builder.build();

        let entry = registry.resolve("b").unwrap();
        assert_eq!(entry.name(), "b");
        let err = entry.invoke(&mut Vec::new(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "named");
    }

    #[test]
    fn test_duplicate_and_empty_names_are_rejected() {
        let mut builder = Registry::builder();
        builder.register("cat", noop).unwrap();

        assert_eq!(
            builder.register("cat", noop).err(),
            Some(RegistryError::Duplicate("cat".to_string()))
        );
        assert_eq!(builder.register("", noop).err(), Some(RegistryError::EmptyName));
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_names_are_sorted() {
        let mut builder = Registry::builder();
        for name in ["wc", "cat", "echo"] {
            builder.register(name, noop).unwrap();
        }
        assert_eq!(builder.build().names(), ["cat", "echo", "wc"]);
    }
}
