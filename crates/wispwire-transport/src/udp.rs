use std::net::UdpSocket;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::tcp::resolve;
use crate::traits::LinkStream;

/// Connected UDP links.
///
/// Datagram boundaries carry no meaning: the framing layer treats the
/// received datagrams as one continuous byte stream.
pub struct UdpLink;

impl UdpLink {
    /// Bind a local socket and connect it to `target`.
    ///
    /// `bind` defaults to an ephemeral port on the unspecified address of the
    /// target's family. Connecting a UDP socket never waits on the network.
    pub fn connect(target: &str, bind: Option<&str>) -> Result<LinkStream> {
        let addrs = resolve(target)?;
        let remote = addrs.first().copied().ok_or_else(|| TransportError::Resolve {
            target: target.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing"),
        })?;

        let local = match bind {
            Some(local) => local.to_string(),
            None if remote.is_ipv4() => "0.0.0.0:0".to_string(),
            None => "[::]:0".to_string(),
        };

        let socket = UdpSocket::bind(&local).map_err(|e| TransportError::Bind {
            target: local.clone(),
            source: e,
        })?;
        socket.connect(remote).map_err(|e| TransportError::Connect {
            target: target.to_string(),
            source: e,
        })?;

        debug!(%remote, %local, "connected udp link");
        Ok(LinkStream::from_udp(socket))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::UdpSocket;
    use std::time::Duration;

    use super::*;
    use crate::traits::LinkKind;

    #[test]
    fn datagrams_flow_both_ways() {
        let bench = UdpSocket::bind("127.0.0.1:0").unwrap();
        bench.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let bench_addr = bench.local_addr().unwrap().to_string();

        let mut link = UdpLink::connect(&bench_addr, Some("127.0.0.1:0")).unwrap();
        assert_eq!(link.kind(), LinkKind::Udp);
        link.write_all(b"\xAA\xAA\xAA").unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = bench.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\xAA\xAA\xAA");

        bench.send_to(b"ack", from).unwrap();
        link.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let n = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ack");
    }

    #[test]
    fn bad_local_bind_is_reported() {
        let err = UdpLink::connect("127.0.0.1:9", Some("127.0.0.1:99999")).unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
