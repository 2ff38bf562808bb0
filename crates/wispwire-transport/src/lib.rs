//! Duplex byte links to an embedded test bench.
//!
//! Provides a unified interface over the physical channels a test bench is
//! reachable through:
//! - TCP streams
//! - connected UDP sockets
//! - serial ports (behind the `serial` feature)
//! - local socket pairs (Unix only, loopback and tests)
//!
//! This is the lowest layer of wispwire. Everything else builds on top of
//! the [`LinkStream`] type provided here. Links move unstructured bytes;
//! framing lives in `wispwire-frame`.

pub mod error;
pub mod link;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use link::{LinkSpec, DEFAULT_CONNECT_TIMEOUT, STANDARD_BAUD_RATES};
pub use tcp::{TcpLink, TcpLinkListener};
pub use traits::{LinkKind, LinkStream};
pub use udp::UdpLink;
