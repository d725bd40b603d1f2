//! XCP on Ethernet: length-prefixed frames over TCP or UDP.

use std::io::ErrorKind;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use xcplink_config::{ConfigError, Configuration, ParamKind, ParameterMap};
use xcplink_frame::{
    ByteOrder, Frame, FrameConfig, FrameError, FrameReader, FrameWriter, Framing,
};
use xcplink_transport::{NetStream, Protocol};

use crate::engine::FrameTransport;
use crate::error::Result;
use crate::link::{Inbound, Link};

pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const PROTOCOL: &str = "PROTOCOL";
pub const IPV6: &str = "IPV6";
pub const TCP_NODELAY: &str = "TCP_NODELAY";

/// Read timeout of the receive half; bounds one listener iteration.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

const BYTE_ORDER: ByteOrder = ByteOrder::Little;

/// Options understood by the Ethernet transport.
pub fn parameter_map() -> ParameterMap {
    ParameterMap::base()
        .optional(HOST, ParamKind::Str, "localhost")
        .optional(PORT, ParamKind::Int, 5555)
        .optional(PROTOCOL, ParamKind::Str, "TCP")
        .optional(IPV6, ParamKind::Bool, false)
        .optional(TCP_NODELAY, ParamKind::Bool, false)
}

/// Socket settings resolved from a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthSettings {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub ipv6: bool,
    pub tcp_nodelay: bool,
}

impl EthSettings {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let port = config.get_int(PORT)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::ValidationFailed {
            message: format!("{PORT} {port} is not a valid port number"),
        })?;

        Ok(Self {
            host: config.get_str(HOST)?.to_string(),
            port,
            protocol: config.get_str(PROTOCOL)?.parse()?,
            ipv6: config.get_bool(IPV6)?,
            tcp_nodelay: config.get_bool(TCP_NODELAY)?,
        })
    }
}

/// A connected TCP or UDP socket carrying length-prefixed frames.
///
/// The socket is connected when the link is created; `connect` only
/// confirms it.
pub struct StreamLink {
    stream: NetStream,
    writer: FrameWriter<NetStream>,
}

impl StreamLink {
    /// Connect a socket as described by `settings`.
    pub fn connect(settings: &EthSettings) -> Result<Self> {
        let stream = xcplink_transport::connect(
            settings.protocol,
            &settings.host,
            settings.port,
            settings.ipv6,
            settings.tcp_nodelay,
        )?;
        Self::from_stream(stream)
    }

    /// Wrap an already connected socket.
    pub fn from_stream(stream: NetStream) -> Result<Self> {
        let writer = FrameWriter::with_config_net(stream.try_clone()?, frame_config(None))?;
        Ok(Self { stream, writer })
    }

    pub fn is_datagram(&self) -> bool {
        self.stream.is_datagram()
    }
}

impl Link for StreamLink {
    fn name(&self) -> &'static str {
        "eth"
    }

    fn framing(&self) -> Framing {
        Framing::LengthPrefixed(BYTE_ORDER)
    }

    fn verifies_frame_size(&self) -> bool {
        self.stream.is_datagram()
    }

    fn inbound(&mut self) -> Result<Box<dyn Inbound>> {
        let reader = FrameReader::with_config_net(
            self.stream.try_clone()?,
            frame_config(Some(POLL_TIMEOUT)),
        )?;
        Ok(Box::new(StreamInbound {
            reader,
            datagram: self.stream.is_datagram(),
        }))
    }

    fn connect(&mut self) -> Result<()> {
        debug!(
            peer = ?self.stream.peer_addr().ok(),
            transport = self.stream.transport_name(),
            "ethernet link up"
        );
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.send(frame)?;
        Ok(())
    }

    fn close_connection(&mut self) -> Result<()> {
        self.stream.shutdown()?;
        Ok(())
    }
}

struct StreamInbound {
    reader: FrameReader<NetStream>,
    datagram: bool,
}

impl Inbound for StreamInbound {
    fn poll(&mut self) -> std::result::Result<Option<Frame>, FrameError> {
        let result = if self.datagram {
            self.reader.read_datagram()
        } else {
            self.reader.read_frame()
        };

        match result {
            Ok(frame) => Ok(Some(frame)),
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn frame_config(read_timeout: Option<Duration>) -> FrameConfig {
    FrameConfig {
        byte_order: BYTE_ORDER,
        read_timeout,
        write_timeout: None,
    }
}

/// Build an Ethernet transport from raw options.
pub fn create_transport(raw: &Value) -> Result<FrameTransport> {
    let config = Configuration::new(&parameter_map(), raw)?;
    let settings = EthSettings::from_config(&config)?;
    let link = StreamLink::connect(&settings)?;
    FrameTransport::new(Box::new(link), &config)
}
