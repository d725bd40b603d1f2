/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Declared header length and received payload length disagree.
    #[error("frame size mismatch (declared {declared} bytes, received {actual})")]
    FrameSize { declared: usize, actual: usize },

    /// The payload exceeds what the length field can describe.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A packet without a PID byte.
    #[error("empty packet (no PID byte)")]
    Empty,

    /// A datagram or packet shorter than its fixed layout.
    #[error("truncated packet ({len} bytes, need at least {need})")]
    Truncated { len: usize, need: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
