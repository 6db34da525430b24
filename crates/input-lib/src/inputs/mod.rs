//! Input plugins and the registry that instantiates them
//!
//! Each plugin polls one remote API and flattens its responses into records
//! submitted to an [`Accumulator`]. Plugins are created by name from their
//! configuration table, the same way the agent's config file names them.

pub mod kube_state;
pub mod storage_center;

use crate::accumulator::Accumulator;
use crate::error::{InputError, Result};
use std::collections::BTreeMap;

pub use async_trait::async_trait;

/// Trait implemented by every input plugin
#[async_trait]
pub trait Input: Send + Sync {
    /// Registry name of the plugin
    fn name(&self) -> &'static str;

    /// One-line description of what the plugin collects
    fn description(&self) -> &'static str;

    /// Commented TOML snippet documenting the plugin options
    fn sample_config(&self) -> &'static str;

    /// Run one collection pass, submitting records to `acc`
    async fn gather(&mut self, acc: &dyn Accumulator) -> Result<()>;
}

/// Builds an input from its configuration table
pub type InputFactory = fn(serde_json::Value) -> Result<Box<dyn Input>>;

/// Static description of a plugin, available without configuring one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub sample_config: &'static str,
}

/// Name -> factory lookup for input plugins
#[derive(Clone, Default)]
pub struct InputRegistry {
    factories: BTreeMap<&'static str, (InputInfo, InputFactory)>,
}

impl InputRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every plugin shipped in this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add(storage_center::INFO, storage_center::factory);
        registry.add(kube_state::INFO, kube_state::factory);
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn add(&mut self, info: InputInfo, factory: InputFactory) {
        self.factories.insert(info.name, (info, factory));
    }

    /// Instantiate a plugin from its configuration table
    pub fn create(&self, name: &str, table: serde_json::Value) -> Result<Box<dyn Input>> {
        let (_, factory) = self
            .factories
            .get(name)
            .ok_or_else(|| InputError::UnknownInput(name.to_string()))?;
        factory(table)
    }

    pub fn info(&self, name: &str) -> Option<InputInfo> {
        self.factories.get(name).map(|(info, _)| *info)
    }

    /// Every registered plugin, sorted by name
    pub fn infos(&self) -> Vec<InputInfo> {
        self.factories.values().map(|(info, _)| *info).collect()
    }

    /// Registered plugin names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

/// Deserialize a plugin configuration table
pub(crate) fn parse_table<T: serde::de::DeserializeOwned>(table: serde_json::Value) -> Result<T> {
    // An input declared with no options arrives as null
    let table = if table.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        table
    };
    serde_json::from_value(table).map_err(|e| InputError::Config(e.to_string()))
}
