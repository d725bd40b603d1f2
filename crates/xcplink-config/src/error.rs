/// Errors that can occur while building a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document is not a JSON object.
    #[error("configuration must be a JSON object")]
    NotAnObject,

    /// The schema rendered from a parameter map could not be compiled.
    #[error("failed to compile configuration schema: {0}")]
    CompileFailed(String),

    /// The document failed schema validation.
    #[error("invalid configuration: {message}")]
    ValidationFailed { message: String },

    /// The document is not valid JSON.
    #[error("configuration is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    /// A getter asked for an option that is absent or has another type.
    #[error("option {name} is not set or is not a {expected}")]
    Missing { name: String, expected: &'static str },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
