use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use crate::error::Result;

/// A connected network link implementing Read + Write.
///
/// TCP links behave like a byte stream. UDP links are connected sockets where
/// every `read` returns exactly one datagram and every `write` sends one.
pub struct NetStream {
    inner: NetStreamInner,
}

enum NetStreamInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.read(buf),
            NetStreamInner::Udp(socket) => socket.recv(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.write(buf),
            NetStreamInner::Udp(socket) => socket.send(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.flush(),
            NetStreamInner::Udp(_) => Ok(()),
        }
    }
}

impl NetStream {
    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: NetStreamInner::Tcp(stream),
        }
    }

    /// Wrap a connected UDP socket.
    pub fn from_udp(socket: UdpSocket) -> Self {
        Self {
            inner: NetStreamInner::Udp(socket),
        }
    }

    /// True when each read yields one complete datagram.
    pub fn is_datagram(&self) -> bool {
        matches!(self.inner, NetStreamInner::Udp(_))
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            NetStreamInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            NetStreamInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this link (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            NetStreamInner::Udp(socket) => Ok(Self::from_udp(socket.try_clone()?)),
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.peer_addr().map_err(Into::into),
            NetStreamInner::Udp(socket) => socket.peer_addr().map_err(Into::into),
        }
    }

    /// Shut down both directions of a TCP stream. No-op for UDP.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                // Already closed by the peer.
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
            NetStreamInner::Udp(_) => Ok(()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            NetStreamInner::Tcp(_) => "tcp",
            NetStreamInner::Udp(_) => "udp",
        }
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
