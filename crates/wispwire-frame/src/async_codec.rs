//! `tokio_util::codec` adapter for the stuffed wire format.
//!
//! Wrap any `AsyncRead`/`AsyncWrite` in `FramedRead`/`FramedWrite` with a
//! [`StuffedCodec`] to get a `Stream` of frames and a `Sink` that accepts
//! them. Recovery behaves exactly like the blocking [`FrameReader`]: noise
//! and corrupted frames are skipped silently.
//!
//! [`FrameReader`]: crate::FrameReader

use bytes::{Buf, BytesMut};
use tokio_util::codec;

use crate::codec::{encode_frame, Frame};
use crate::decoder::{DecodeEvent, Decoder, DecoderStats};
use crate::error::FrameError;

#[derive(Debug, Default)]
pub struct StuffedCodec {
    decoder: Decoder,
}

impl StuffedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl codec::Decoder for StuffedCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(DecodeEvent::Frame(frame)) = self.decoder.push(byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl codec::Encoder<Frame> for StuffedCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(u32::from(item.id), &item.payload, dst)
    }
}
