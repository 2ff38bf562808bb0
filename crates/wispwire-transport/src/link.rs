use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};
use crate::tcp::TcpLink;
use crate::traits::LinkStream;
use crate::udp::UdpLink;

/// Default time allowed for establishing a link.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Serial baud rates accepted by [`LinkSpec::Serial`].
pub const STANDARD_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 921600,
    1000000, 2000000,
];

/// Where a test bench is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LinkSpec {
    /// TCP stream to `addr` (`host:port`).
    Tcp { addr: String },
    /// Connected UDP socket to `addr`, optionally bound to `bind`.
    Udp {
        addr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind: Option<String>,
    },
    /// Serial device at `path`.
    Serial { path: String, baud: u32 },
}

impl LinkSpec {
    /// Open the link.
    ///
    /// `timeout` bounds how long a TCP connect may wait; for serial ports it
    /// becomes the per-operation port timeout. Connecting is the only
    /// operation in the transport with an explicit deadline, since the
    /// remote end may never exist.
    pub fn connect(&self, timeout: Duration) -> Result<LinkStream> {
        match self {
            LinkSpec::Tcp { addr } => TcpLink::connect(addr, timeout),
            LinkSpec::Udp { addr, bind } => UdpLink::connect(addr, bind.as_deref()),
            LinkSpec::Serial { path, baud } => open_serial(path, *baud, timeout),
        }
    }

    /// Short name of the link kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkSpec::Tcp { .. } => "tcp",
            LinkSpec::Udp { .. } => "udp",
            LinkSpec::Serial { .. } => "serial",
        }
    }
}

impl fmt::Display for LinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSpec::Tcp { addr } => write!(f, "tcp://{addr}"),
            LinkSpec::Udp { addr, .. } => write!(f, "udp://{addr}"),
            LinkSpec::Serial { path, baud } => write!(f, "serial://{path}@{baud}"),
        }
    }
}

pub(crate) fn validate_baud(baud: u32) -> Result<()> {
    if STANDARD_BAUD_RATES.contains(&baud) {
        Ok(())
    } else {
        Err(TransportError::InvalidBaud(baud))
    }
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, baud: u32, timeout: Duration) -> Result<LinkStream> {
    crate::serial::SerialLink::open(path, baud, timeout)
}

#[cfg(not(feature = "serial"))]
fn open_serial(_path: &str, baud: u32, _timeout: Duration) -> Result<LinkStream> {
    validate_baud(baud)?;
    Err(TransportError::Unsupported("serial"))
}
