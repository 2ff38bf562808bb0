use wispwire_transport::LinkSpec;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Open a link to a test bench and start pumping it.
///
/// TCP connects are bounded by `config.connect_timeout`. Serial ports get the
/// poll interval as their port timeout instead, since the same timeout
/// governs every later read and the inbound pump must wake up to see stop
/// requests.
pub fn connect(spec: &LinkSpec, config: ConnectionConfig) -> Result<Connection> {
    config.validate()?;
    let timeout = match spec {
        LinkSpec::Serial { .. } => config.poll_interval,
        LinkSpec::Tcp { .. } | LinkSpec::Udp { .. } => config.connect_timeout,
    };
    let link = spec.connect(timeout)?;
    Connection::start(link, config)
}

/// Connect with default configuration.
pub fn connect_default(spec: &LinkSpec) -> Result<Connection> {
    connect(spec, ConnectionConfig::default())
}
