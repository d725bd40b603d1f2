use std::fmt;
use std::io;

use xcplink_can::CanError;
use xcplink_config::ConfigError;
use xcplink_engine::EngineError;
use xcplink_frame::FrameError;
use xcplink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::UnsupportedProtocol(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        ConfigError::CompileFailed(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn can_error(context: &str, err: &CanError) -> CliError {
    let code = match err {
        CanError::IdentifierOutOfRange { .. }
        | CanError::LengthOutOfRange(_)
        | CanError::EmptyFilterSet
        | CanError::Config(_) => DATA_INVALID,
        CanError::UnknownDriver { .. } => USAGE,
        CanError::Driver(_) => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn engine_error(context: &str, err: EngineError) -> CliError {
    match err {
        EngineError::Transport(err) => transport_error(context, err),
        EngineError::Frame(err) => frame_error(context, err),
        EngineError::Config(err) => config_error(context, err),
        EngineError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        EngineError::Protocol { .. } => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        EngineError::UnknownBackend { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        EngineError::Backend(source) => match source.downcast_ref::<CanError>() {
            Some(can) => can_error(context, can),
            None => CliError::new(FAILURE, format!("{context}: {source}")),
        },
        EngineError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
