use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// Emit timestamps for received DAQ samples.
pub const CREATE_DAQ_TIMESTAMPS: &str = "CREATE_DAQ_TIMESTAMPS";

/// Log level of the transport; frame hex dumps need `DEBUG`.
pub const LOGLEVEL: &str = "LOGLEVEL";

/// Value type of a declared option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
}

impl ParamKind {
    /// JSON Schema `type` keyword for this kind.
    pub fn schema_type(&self) -> &'static str {
        match self {
            ParamKind::Bool => "boolean",
            ParamKind::Int => "integer",
            ParamKind::Float => "number",
            ParamKind::Str => "string",
        }
    }
}

/// Declaration of one option.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

/// The options a layer understands, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    params: BTreeMap<String, ParamSpec>,
}

impl ParameterMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options every transport understands.
    pub fn base() -> Self {
        Self::new()
            .optional(CREATE_DAQ_TIMESTAMPS, ParamKind::Bool, false)
            .optional(LOGLEVEL, ParamKind::Str, "WARN")
    }

    /// Declare an optional option with a default value.
    pub fn optional(mut self, name: &str, kind: ParamKind, default: impl Into<Value>) -> Self {
        self.params.insert(
            name.to_string(),
            ParamSpec {
                kind,
                required: false,
                default: Some(default.into()),
            },
        );
        self
    }

    /// Declare an optional option that stays unset when absent.
    pub fn optional_unset(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.insert(
            name.to_string(),
            ParamSpec {
                kind,
                required: false,
                default: None,
            },
        );
        self
    }

    /// Declare a required option.
    pub fn required(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.insert(
            name.to_string(),
            ParamSpec {
                kind,
                required: true,
                default: None,
            },
        );
        self
    }

    /// Union of two maps; declarations in `other` win on name clashes.
    pub fn merged(mut self, other: &ParameterMap) -> Self {
        for (name, spec) in &other.params {
            self.params.insert(name.clone(), spec.clone());
        }
        self
    }

    /// Look up a declaration.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    /// Declared option names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render the map as a JSON Schema object.
    ///
    /// Unknown properties are allowed so one document can feed several layers.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.params {
            properties.insert(name.clone(), json!({ "type": spec.kind.schema_type() }));
            if spec.required {
                required.push(Value::String(name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
