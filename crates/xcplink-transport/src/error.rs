use std::net::SocketAddr;

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host name did not resolve to an address of the requested family.
    #[error("failed to resolve {host}:{port}")]
    Resolve { host: String, port: u16 },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An unsupported link protocol was requested.
    #[error("unsupported protocol '{0}' (expected TCP or UDP)")]
    UnsupportedProtocol(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
