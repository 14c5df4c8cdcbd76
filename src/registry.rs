//! Name → factory table from which every command is built.
//!
//! Parsers and the executor never construct commands directly; they go
//! through a [`Registry`], so new kinds plug in without touching either.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::command::Command;
use crate::error::{RegistryError, ValidationError};
use crate::record::Record;

pub type CommandFactory =
    Arc<dyn Fn(&Record) -> Result<Box<dyn Command>, ValidationError> + Send + Sync>;

static GLOBAL: OnceCell<Arc<Registry>> = OnceCell::new();

#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, CommandFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in command kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::commands::register_builtins(&mut registry);
        registry
    }

    /// The process-wide registry.
    ///
    /// Initialized once: either by [`Registry::install`] at startup or lazily
    /// with the built-ins on first use. Never changes afterwards.
    pub fn global() -> Arc<Registry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Install `registry` as the process-wide table. Fails, handing the
    /// registry back, if the global table was already initialized.
    pub fn install(registry: Registry) -> Result<(), Registry> {
        GLOBAL.set(Arc::new(registry)).map_err(|rejected| {
            Arc::try_unwrap(rejected).unwrap_or_else(|shared| (*shared).clone())
        })
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&Record) -> Result<Box<dyn Command>, ValidationError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(command = %name, "registered command");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Remove `name`. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.factories.remove(name).is_some();
        if removed {
            tracing::debug!(command = %name, "unregistered command");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<CommandFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn create(&self, name: &str, record: &Record) -> Result<Box<dyn Command>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCommand {
                name: name.to_string(),
                available: self.list(),
            })?;

        factory(record).map_err(|source| RegistryError::Invalid {
            kind: name.to_string(),
            source,
        })
    }

    /// Build the command a record names.
    pub fn create_from(&self, record: &Record) -> Result<Box<dyn Command>, RegistryError> {
        self.create(&record.kind, record)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("commands", &self.list())
            .finish()
    }
}
