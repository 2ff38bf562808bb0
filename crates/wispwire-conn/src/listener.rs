use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;
use wispwire_transport::TcpLinkListener;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Accepts TCP connections and starts a [`Connection`] for each.
///
/// This is the bench side of a link: simulators and loopback rigs listen,
/// the front-end connects.
pub struct ConnectionListener {
    listener: TcpLinkListener,
    config: ConnectionConfig,
    accepted: AtomicU64,
}

impl ConnectionListener {
    /// Bind to `addr` (`host:port`, port 0 picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpLinkListener::bind(addr)?;
        Ok(Self {
            listener,
            config: ConnectionConfig::default(),
            accepted: AtomicU64::new(0),
        })
    }

    /// Override the configuration given to accepted connections.
    pub fn with_config(mut self, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Accept the next connection (blocking) and start pumping it.
    pub fn accept(&self) -> Result<Connection> {
        let link = self.listener.accept()?;
        let seq = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(seq, peer = %link.peer_label(), "accepted bench connection");
        Connection::start(link, self.config.clone())
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use wispwire_transport::LinkSpec;

    use super::*;
    use crate::connector::connect_default;
    use crate::connection::StopMode;
    use crate::error::ConnError;
    use crate::queue::OverflowPolicy;

    const WAIT: Duration = Duration::from_secs(5);

    fn spec_for(listener: &ConnectionListener) -> LinkSpec {
        LinkSpec::Tcp {
            addr: listener.local_addr().to_string(),
        }
    }

    #[test]
    fn accept_returns_connection() {
        let listener = ConnectionListener::bind("127.0.0.1:0").unwrap();
        let spec = spec_for(&listener);

        let server = thread::spawn(move || {
            let conn = listener.accept().unwrap();
            let frame = conn.receive_timeout(WAIT).unwrap();
            conn.send_frame(frame).unwrap();
            // Keep the server side open until the reply is read.
            let _ = conn.receive_timeout(WAIT);
            listener.accepted()
        });

        let mut client = connect_default(&spec).unwrap();
        client.submit(12, b"echo me").unwrap();
        let reply = client.receive_timeout(WAIT).unwrap();
        assert_eq!(reply.id, 12);
        assert_eq!(reply.payload.as_ref(), b"echo me");

        client.stop(StopMode::Graceful).unwrap();
        assert_eq!(server.join().unwrap(), 1);
    }

    #[test]
    fn accepts_multiple_sequential_connections() {
        let listener = ConnectionListener::bind("127.0.0.1:0").unwrap();
        let spec = spec_for(&listener);

        let server = thread::spawn(move || {
            let _first = listener.accept().unwrap();
            let _second = listener.accept().unwrap();
            listener.accepted()
        });

        let _c1 = connect_default(&spec).unwrap();
        let _c2 = connect_default(&spec).unwrap();
        assert_eq!(server.join().unwrap(), 2);
    }

    #[test]
    fn with_config_validates() {
        let listener = ConnectionListener::bind("127.0.0.1:0").unwrap();
        let result =
            listener.with_config(ConnectionConfig::default().with_outbound(0, OverflowPolicy::Block));
        assert!(matches!(result, Err(ConnError::InvalidConfig(_))));
    }

    #[test]
    fn bind_failure_is_a_transport_error() {
        let result = ConnectionListener::bind("127.0.0.1:99999");
        assert!(matches!(result, Err(ConnError::Transport(_))));
    }
}
