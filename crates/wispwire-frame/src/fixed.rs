//! Fixed-size record format.
//!
//! Some PLC-based test benches exchange raw records over TCP instead of
//! stuffed frames: one id byte followed by exactly `payload_len` payload
//! bytes, zero-padded. There is no preamble, checksum or length field, so
//! the stream must never lose a byte; a record boundary is only implied by
//! counting.

use bytes::{BufMut, BytesMut};

use crate::codec::{Frame, MAX_PAYLOAD};
use crate::decoder::{DecodeEvent, DecoderStats};
use crate::error::{FrameError, Result};
use crate::id::{is_reserved, is_valid};

/// Payload size used by the reference bench firmware.
pub const DEFAULT_FIXED_PAYLOAD: usize = 80;

/// Check a record payload size.
pub fn validate_payload_len(payload_len: usize) -> Result<()> {
    if payload_len == 0 || payload_len > MAX_PAYLOAD {
        return Err(FrameError::InvalidConfig(format!(
            "fixed record payload must be 1..={MAX_PAYLOAD} bytes, got {payload_len}"
        )));
    }
    Ok(())
}

/// Encode one fixed-size record, appending to `dst`.
pub fn encode_record(id: u32, payload: &[u8], payload_len: usize, dst: &mut BytesMut) -> Result<()> {
    validate_payload_len(payload_len)?;
    if !is_valid(id) {
        return Err(FrameError::InvalidId(id));
    }
    if payload.len() > payload_len {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: payload_len,
        });
    }

    dst.reserve(1 + payload_len);
    dst.put_u8(id as u8);
    dst.put_slice(payload);
    dst.put_bytes(0, payload_len - payload.len());
    Ok(())
}

/// Splits a byte stream into fixed-size records.
#[derive(Debug)]
pub struct FixedDecoder {
    payload_len: usize,
    buf: BytesMut,
    stats: DecoderStats,
}

impl FixedDecoder {
    pub fn new(payload_len: usize) -> Result<Self> {
        validate_payload_len(payload_len)?;
        Ok(Self {
            payload_len,
            buf: BytesMut::with_capacity(1 + payload_len),
            stats: DecoderStats::default(),
        })
    }

    /// Consume one byte from the link.
    pub fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        self.buf.put_u8(byte);
        if self.buf.len() < 1 + self.payload_len {
            return None;
        }

        let mut record = self.buf.split();
        let id = record[0];
        if is_reserved(id) {
            self.stats.reserved += 1;
            return Some(DecodeEvent::Reserved { id });
        }

        self.stats.frames += 1;
        let payload = record.split_off(1).freeze();
        Some(DecodeEvent::Frame(Frame { id, payload }))
    }

    /// Forget a partially received record.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn in_frame(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}
