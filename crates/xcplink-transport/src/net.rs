use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::NetStream;

/// Network protocol carrying the length-prefixed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            _ => Err(TransportError::UnsupportedProtocol(s.to_string())),
        }
    }
}

/// Resolve `host:port` to the first address of the requested family.
pub fn resolve(host: &str, port: u16, ipv6: bool) -> Result<SocketAddr> {
    let resolve_err = || TransportError::Resolve {
        host: host.to_string(),
        port,
    };
    let mut addrs = (host, port).to_socket_addrs().map_err(|_| resolve_err())?;
    addrs.find(|addr| addr.is_ipv6() == ipv6).ok_or_else(resolve_err)
}

/// Connect a link to `host:port` (blocking).
pub fn connect(
    protocol: Protocol,
    host: &str,
    port: u16,
    ipv6: bool,
    tcp_nodelay: bool,
) -> Result<NetStream> {
    let addr = resolve(host, port, ipv6)?;
    let connect_err = |source| TransportError::Connect { addr, source };

    let stream = match protocol {
        Protocol::Tcp => {
            let stream = TcpStream::connect(addr).map_err(connect_err)?;
            stream.set_nodelay(tcp_nodelay)?;
            NetStream::from_tcp(stream)
        }
        Protocol::Udp => {
            let local: SocketAddr = if ipv6 {
                (Ipv6Addr::UNSPECIFIED, 0).into()
            } else {
                (Ipv4Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).map_err(connect_err)?;
            socket.connect(addr).map_err(connect_err)?;
            NetStream::from_udp(socket)
        }
    };

    debug!(%addr, protocol = protocol.as_str(), "link connected");
    Ok(stream)
}
