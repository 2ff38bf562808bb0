//! Stuffed, CRC32-checked framing and threaded links for embedded test
//! benches.
//!
//! wispwire moves small `(id, payload)` messages between a front-end and a
//! bench over any duplex byte link: TCP, UDP or a serial port. Frames carry a
//! 6-bit id, up to 255 payload bytes and a CRC32; the decoder recovers from
//! line noise and truncated frames on its own.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte links (TCP, UDP, serial behind the `serial` feature)
//! - [`frame`]: Byte-stuffed frame codec, stream decoder, blocking reader and writer
//! - [`conn`]: Two-pump connections with bounded queues (behind `conn` feature)

/// Re-export transport types.
pub mod transport {
    pub use wispwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wispwire_frame::*;
}

/// Re-export connection types (requires `conn` feature).
#[cfg(feature = "conn")]
pub mod conn {
    pub use wispwire_conn::*;
}
