use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// TCP stream links.
///
/// The test bench is usually the listening side; the front-end connects.
pub struct TcpLink;

impl TcpLink {
    /// Connect to `target` (`host:port`), giving up after `timeout`.
    ///
    /// Every resolved address is tried in order; the last failure is
    /// reported if none answers.
    pub fn connect(target: &str, timeout: Duration) -> Result<LinkStream> {
        let addrs = resolve(target)?;
        let mut last_err = None;

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    // Frames are small and latency-sensitive.
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected tcp link");
                    return Ok(LinkStream::from_tcp(stream));
                }
                Err(err) => {
                    debug!(%addr, error = %err, "tcp connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                Err(TransportError::ConnectTimeout {
                    target: target.to_string(),
                    timeout,
                })
            }
            Some(err) => Err(TransportError::Connect {
                target: target.to_string(),
                source: err,
            }),
            None => Err(TransportError::Resolve {
                target: target.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "address resolved to nothing",
                ),
            }),
        }
    }
}

/// Listening TCP socket handing out [`LinkStream`]s.
///
/// Used by test-bench simulators and loopback tests.
pub struct TcpLinkListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpLinkListener {
    /// Bind and listen on `target` (`host:port`, port 0 picks a free port).
    pub fn bind(target: &str) -> Result<Self> {
        let listener = TcpListener::bind(target).map_err(|e| TransportError::Bind {
            target: target.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening on tcp");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%addr, "accepted tcp link");
        Ok(LinkStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

pub(crate) fn resolve(target: &str) -> Result<Vec<SocketAddr>> {
    target
        .to_socket_addrs()
        .map(|addrs| addrs.collect())
        .map_err(|e| TransportError::Resolve {
            target: target.to_string(),
            source: e,
        })
}
