use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::registry::{ParamKind, ParameterMap};
use crate::validator::{compile, validate_value};

const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;

/// Immutable, validated option values of one layer.
///
/// Holds every declared option that was either supplied or has a default.
/// Undeclared keys of the raw document are not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    values: BTreeMap<String, Value>,
}

impl Configuration {
    /// Validate `raw` against `map` and fill in defaults.
    pub fn new(map: &ParameterMap, raw: &Value) -> Result<Self> {
        let object = raw.as_object().ok_or(ConfigError::NotAnObject)?;

        let validator = compile(&map.to_json_schema())?;
        validate_value(raw, &validator)?;

        let mut values = BTreeMap::new();
        for (name, spec) in map.iter() {
            let value = match object.get(name) {
                Some(value) if !value.is_null() => Some(value.clone()),
                _ => spec.default.clone(),
            };
            if let Some(value) = value {
                values.insert(name.to_string(), normalize(spec.kind, value));
            }
        }

        tracing::trace!(options = values.len(), "configuration validated");
        Ok(Self { values })
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(map: &ParameterMap, json: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Self::new(map, &raw)
    }

    /// Load, parse and validate a JSON file.
    pub fn from_file(map: &ParameterMap, path: &Path) -> Result<Self> {
        let raw = load_json_file(path)?;
        Self::new(map, &raw)
    }

    /// Raw value of an option.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name, "boolean"))
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        self.get(name)
            .and_then(as_integer)
            .ok_or_else(|| missing(name, "integer"))
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name, "number"))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name, "string"))
    }

    /// Option names that carry a value, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Read a JSON document from disk with a size cap.
pub fn load_json_file(path: &Path) -> Result<Value> {
    let file = std::fs::File::open(path)
        .map_err(|err| ConfigError::LoadFailed(format!("{}: {err}", path.display())))?;

    let read_limit = u64::try_from(MAX_CONFIG_FILE_SIZE.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| ConfigError::LoadFailed(format!("{}: {err}", path.display())))?;
    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::LoadFailed(format!(
            "configuration file too large: {}",
            path.display()
        )));
    }

    Ok(serde_json::from_str(&content)?)
}

fn missing(name: &str, expected: &'static str) -> ConfigError {
    ConfigError::Missing {
        name: name.to_string(),
        expected,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

// Integral floats such as `5.0` pass the "integer" schema type; store them as
// integers so the typed getters agree with the schema.
fn normalize(kind: ParamKind, value: Value) -> Value {
    match kind {
        ParamKind::Int => as_integer(&value).map(Value::from).unwrap_or(value),
        _ => value,
    }
}
