use std::fmt;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::time::Duration;

use crate::error::Result;

/// The physical channel behind a [`LinkStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Tcp,
    Udp,
    Serial,
    Local,
}

impl LinkKind {
    /// Whether a zero-length read means the remote end went away.
    ///
    /// Datagram sockets can legitimately deliver empty datagrams, so only
    /// stream-oriented links treat `Ok(0)` as end of stream.
    pub fn eof_on_empty_read(self) -> bool {
        !matches!(self, LinkKind::Udp)
    }

    /// Short name for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Tcp => "tcp",
            LinkKind::Udp => "udp",
            LinkKind::Serial => "serial",
            LinkKind::Local => "local",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected duplex byte link implementing `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations. Reads
/// return whatever bytes are available (possibly a partial frame, possibly
/// several frames); writes accept unstructured bytes.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
    #[cfg(feature = "serial")]
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Local(std::os::unix::net::UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.read(buf),
            LinkStreamInner::Udp(socket) => socket.recv(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.write(buf),
            LinkStreamInner::Udp(socket) => socket.send(buf),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.flush(),
            LinkStreamInner::Udp(_) => Ok(()),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => stream.flush(),
        }
    }
}

impl LinkStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }

    pub(crate) fn from_udp(socket: UdpSocket) -> Self {
        Self {
            inner: LinkStreamInner::Udp(socket),
        }
    }

    #[cfg(feature = "serial")]
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Create a connected pair of local links.
    ///
    /// Both ends behave like a TCP link; used for loopback setups and tests.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: LinkStreamInner::Local(left),
            },
            Self {
                inner: LinkStreamInner::Local(right),
            },
        ))
    }

    /// The physical channel kind.
    pub fn kind(&self) -> LinkKind {
        match &self.inner {
            LinkStreamInner::Tcp(_) => LinkKind::Tcp,
            LinkStreamInner::Udp(_) => LinkKind::Udp,
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => LinkKind::Serial,
            #[cfg(unix)]
            LinkStreamInner::Local(_) => LinkKind::Local,
        }
    }

    /// Set read timeout on the underlying channel.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => {
                // The serial timeout is shared by both directions and fixed at open.
                let _ = timeout;
                Ok(())
            }
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying channel.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => {
                let _ = timeout;
                Ok(())
            }
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this link (creates a new handle to the same channel).
    ///
    /// The clone shares the channel: closing one closes both.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            LinkStreamInner::Tcp(stream) => LinkStreamInner::Tcp(stream.try_clone()?),
            LinkStreamInner::Udp(socket) => LinkStreamInner::Udp(socket.try_clone()?),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                LinkStreamInner::Serial(port.try_clone().map_err(|err| {
                    crate::TransportError::Serial {
                        path: port.name().unwrap_or_default(),
                        message: err.to_string(),
                    }
                })?)
            }
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => LinkStreamInner::Local(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Close both directions of the channel.
    ///
    /// Blocked reads on stream links return immediately afterwards. Datagram
    /// and serial links have no shutdown; their handles close on drop.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => ignore_not_connected(stream.shutdown(Shutdown::Both)),
            LinkStreamInner::Udp(_) => Ok(()),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => Ok(()),
            #[cfg(unix)]
            LinkStreamInner::Local(stream) => {
                ignore_not_connected(stream.shutdown(Shutdown::Both))
            }
        }
    }

    /// Human-readable description of the remote end.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| format!("tcp://{addr}"))
                .unwrap_or_else(|_| "tcp://?".to_string()),
            LinkStreamInner::Udp(socket) => socket
                .peer_addr()
                .map(|addr| format!("udp://{addr}"))
                .unwrap_or_else(|_| "udp://?".to_string()),
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                format!("serial://{}", port.name().unwrap_or_default())
            }
            #[cfg(unix)]
            LinkStreamInner::Local(_) => "local://pair".to_string(),
        }
    }
}

fn ignore_not_connected(result: std::io::Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        other => other.map_err(Into::into),
    }
}

impl fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkStream")
            .field("kind", &self.kind())
            .field("peer", &self.peer_label())
            .finish()
    }
}
