use xcplink_engine::EngineError;

/// Errors that can occur in CAN addressing, framing and driver handling.
#[derive(Debug, thiserror::Error)]
pub enum CanError {
    /// The identifier does not fit the 11-bit or 29-bit range.
    #[error("{} identifier 0x{id:X} is out of range", width(.extended))]
    IdentifierOutOfRange { id: u64, extended: bool },

    /// No CAN(-FD) DLC describes this payload length.
    #[error("payload length {0} has no DLC (valid: 0..=64)")]
    LengthOutOfRange(isize),

    /// A filter needs at least one identifier.
    #[error("cannot calculate a filter for an empty identifier set")]
    EmptyFilterSet,

    /// `CAN_DRIVER` names a driver that is not registered.
    #[error("unknown CAN driver '{name}' (available: {})", .available.join(", "))]
    UnknownDriver { name: String, available: Vec<String> },

    /// A driver reported a failure.
    #[error("driver error: {0}")]
    Driver(String),

    /// Invalid CAN configuration.
    #[error("configuration error: {0}")]
    Config(#[from] xcplink_config::ConfigError),
}

fn width(extended: &bool) -> &'static str {
    if *extended {
        "29-bit"
    } else {
        "11-bit"
    }
}

impl From<CanError> for EngineError {
    fn from(err: CanError) -> Self {
        match err {
            CanError::Config(err) => EngineError::Config(err),
            other => EngineError::Backend(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, CanError>;
