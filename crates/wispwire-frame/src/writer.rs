use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use wispwire_transport::LinkStream;

use crate::codec::{Frame, FRAME_OVERHEAD, MAX_PAYLOAD};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;
use crate::wire::FrameConfig;

// Worst case: every body byte is a marker, one stuff byte per pair.
const INITIAL_BUFFER_CAPACITY: usize = FRAME_OVERHEAD + MAX_PAYLOAD + (MAX_PAYLOAD + 6) / 2;

/// Writes complete frames to any `Write` stream.
///
/// Each frame is encoded into a scratch buffer and written whole before
/// returning, so frames never interleave on the wire.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    bytes_written: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer for the stuffed format.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            bytes_written: 0,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(u32::from(frame.id), frame.payload.as_ref())
    }

    /// Encode and send a payload under a frame id.
    ///
    /// Invalid ids and oversized payloads are rejected before any byte is
    /// written. A write timeout surfaces as `FrameError::Io`; the frame may
    /// then have been partially written.
    pub fn send(&mut self, id: u32, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        self.config.wire.encode(id, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.bytes_written += offset as u64;
                    return Err(FrameError::Io(err));
                }
            }
        }
        self.bytes_written += offset as u64;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Total bytes handed to the stream, stuffing included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<LinkStream> {
    /// Create a frame writer for a link and apply the write timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        config.wire.validate()?;
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
