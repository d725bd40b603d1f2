use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::engine::FrameTransport;
use crate::error::{EngineError, Result};

/// Builds a transport from raw JSON options.
pub type TransportConstructor = Arc<dyn Fn(&Value) -> Result<FrameTransport> + Send + Sync>;

/// Transport backends by name.
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    constructors: BTreeMap<String, TransportConstructor>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the transports built into this crate (`eth`).
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("eth", crate::eth::create_transport);
        registry
    }

    /// Register (or replace) a backend.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value) -> Result<FrameTransport> + Send + Sync + 'static,
    {
        let key = name.to_ascii_lowercase();
        debug!(transport = %key, "transport registered");
        self.constructors.insert(key, Arc::new(constructor));
    }

    /// Construct the transport `name` from raw options.
    pub fn create(&self, name: &str, options: &Value) -> Result<FrameTransport> {
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| EngineError::UnknownBackend {
                kind: "transport",
                name: name.to_string(),
                available: self.names(),
            })?;
        constructor(options)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("names", &self.names())
            .finish()
    }
}
