use std::time::Duration;

/// Errors that can occur in engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Socket-level error.
    #[error("transport error: {0}")]
    Transport(#[from] xcplink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] xcplink_frame::FrameError),

    /// Invalid transport configuration.
    #[error("configuration error: {0}")]
    Config(#[from] xcplink_config::ConfigError),

    /// No response arrived in time.
    #[error("response timed out after {0:?}")]
    Timeout(Duration),

    /// The slave answered with a negative response.
    #[error("negative response {} (0x{code:02X})", error_name(.code))]
    Protocol { code: u8 },

    /// A registry lookup failed.
    #[error("unknown {kind} '{name}' (available: {})", .available.join(", "))]
    UnknownBackend {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    /// Error raised by a concrete link backend.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The transport has been closed.
    #[error("transport is closed")]
    Shutdown,
}

fn error_name(code: &u8) -> &'static str {
    xcplink_frame::pid::error_name(*code)
}

pub type Result<T> = std::result::Result<T, EngineError>;
