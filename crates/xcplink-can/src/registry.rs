use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::CanDriver;
use crate::error::{CanError, Result};

/// Creates a fresh driver instance.
pub type DriverConstructor = Arc<dyn Fn() -> Result<Arc<dyn CanDriver>> + Send + Sync>;

/// An optional driver backend, loaded by an explicit registration step.
#[derive(Clone, Copy)]
pub struct DriverPlugin {
    pub name: &'static str,
    pub load: fn(&mut DriverRegistry) -> Result<()>,
}

impl std::fmt::Debug for DriverPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A plugin that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub reason: String,
}

/// Outcome of loading a set of plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Plugins whose drivers were registered.
    pub loaded: Vec<String>,
    /// Plugins that failed; their drivers were not registered.
    pub failures: Vec<PluginFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// CAN driver backends by name (case-insensitive).
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: BTreeMap<String, DriverConstructor>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `virtual` driver.
    pub fn builtin() -> (Self, LoadReport) {
        let mut registry = Self::new();
        let report = registry.load_plugins(&[crate::virtual_bus::PLUGIN]);
        (registry, report)
    }

    /// Register (or replace) a driver.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn CanDriver>> + Send + Sync + 'static,
    {
        let key = name.to_ascii_lowercase();
        debug!(driver = %key, "CAN driver registered");
        self.constructors.insert(key, Arc::new(constructor));
    }

    /// Run each plugin's registration step.
    ///
    /// A plugin registers into a staging registry that is merged only when
    /// the whole step succeeds. Errors and panics are collected into the
    /// report and never stop the remaining plugins.
    pub fn load_plugins(&mut self, plugins: &[DriverPlugin]) -> LoadReport {
        let mut report = LoadReport::default();

        for plugin in plugins {
            let mut staging = DriverRegistry::new();
            let outcome = catch_unwind(AssertUnwindSafe(|| (plugin.load)(&mut staging)));

            let reason = match outcome {
                Ok(Ok(())) => {
                    self.constructors.extend(staging.constructors);
                    debug!(plugin = plugin.name, "CAN driver plugin loaded");
                    report.loaded.push(plugin.name.to_string());
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            warn!(plugin = plugin.name, %reason, "CAN driver plugin failed to load");
            report.failures.push(PluginFailure {
                plugin: plugin.name.to_string(),
                reason,
            });
        }

        report
    }

    /// Instantiate driver `name`.
    pub fn create(&self, name: &str) -> Result<Arc<dyn CanDriver>> {
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| CanError::UnknownDriver {
                name: name.to_string(),
                available: self.names(),
            })?;
        constructor()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
