//! Declared option maps and validated configuration.
//!
//! Every layer (transport, bus binding, driver) declares the options it
//! understands in a [`ParameterMap`]. Raw JSON is checked against the JSON
//! Schema rendered from that map, then frozen into an immutable
//! [`Configuration`] with defaults filled in.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::{load_json_file, Configuration};
pub use error::{ConfigError, Result};
pub use registry::{ParamKind, ParamSpec, ParameterMap, CREATE_DAQ_TIMESTAMPS, LOGLEVEL};
