use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::link::validate_baud;
use crate::traits::LinkStream;

/// Serial port links (8N1, no flow control).
pub struct SerialLink;

impl SerialLink {
    /// Open `path` at `baud`.
    ///
    /// `timeout` bounds every read and write on the port; the transport uses
    /// it as its poll tick, so it should be short.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<LinkStream> {
        validate_baud(baud)?;

        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|err| TransportError::Serial {
                path: path.to_string(),
                message: err.to_string(),
            })?;

        debug!(path, baud, "opened serial link");
        Ok(LinkStream::from_serial(port))
    }
}
