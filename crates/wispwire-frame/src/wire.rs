use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::codec::{encode_frame, MAX_PAYLOAD};
use crate::decoder::{DecodeEvent, Decoder, DecoderStats};
use crate::error::{FrameError, Result};
use crate::fixed::{encode_record, validate_payload_len, FixedDecoder, DEFAULT_FIXED_PAYLOAD};
use crate::id::is_valid;

/// Which framing a link speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WireFormat {
    /// Preamble, stuffing, CRC32 and end marker. Resynchronizes after noise.
    #[default]
    Stuffed,
    /// Raw `id + payload_len` byte records, no integrity check.
    Fixed {
        #[serde(default = "default_fixed_payload")]
        payload_len: usize,
    },
}

fn default_fixed_payload() -> usize {
    DEFAULT_FIXED_PAYLOAD
}

impl WireFormat {
    /// Encode a frame in this format, appending to `dst`.
    pub fn encode(&self, id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        match self {
            WireFormat::Stuffed => encode_frame(id, payload, dst),
            WireFormat::Fixed { payload_len } => encode_record(id, payload, *payload_len, dst),
        }
    }

    /// A fresh decoder for this format.
    pub fn decoder(&self) -> Result<FrameDecoder> {
        match self {
            WireFormat::Stuffed => Ok(FrameDecoder::Stuffed(Decoder::new())),
            WireFormat::Fixed { payload_len } => {
                Ok(FrameDecoder::Fixed(FixedDecoder::new(*payload_len)?))
            }
        }
    }

    /// Check format parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            WireFormat::Stuffed => Ok(()),
            WireFormat::Fixed { payload_len } => validate_payload_len(*payload_len),
        }
    }

    /// Check that a frame with this id and payload size can be encoded,
    /// without encoding it.
    pub fn check(&self, id: u32, len: usize) -> Result<()> {
        self.validate()?;
        if !is_valid(id) {
            return Err(FrameError::InvalidId(id));
        }
        let max = match self {
            WireFormat::Stuffed => MAX_PAYLOAD,
            WireFormat::Fixed { payload_len } => *payload_len,
        };
        if len > max {
            return Err(FrameError::PayloadTooLarge { size: len, max });
        }
        Ok(())
    }
}

/// Default number of bytes requested from the link per read.
pub const DEFAULT_READ_CHUNK: usize = 512;

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Framing spoken on the link. Default: stuffed.
    pub wire: WireFormat,
    /// Bytes requested per read. Default: 512.
    pub read_chunk_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            wire: WireFormat::Stuffed,
            read_chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// A decoder for either wire format.
#[derive(Debug)]
pub enum FrameDecoder {
    Stuffed(Decoder),
    Fixed(FixedDecoder),
}

impl FrameDecoder {
    /// Consume one byte from the link.
    pub fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self {
            FrameDecoder::Stuffed(decoder) => decoder.push(byte),
            FrameDecoder::Fixed(decoder) => decoder.push(byte),
        }
    }

    pub fn reset(&mut self) {
        match self {
            FrameDecoder::Stuffed(decoder) => decoder.reset(),
            FrameDecoder::Fixed(decoder) => decoder.reset(),
        }
    }

    pub fn in_frame(&self) -> bool {
        match self {
            FrameDecoder::Stuffed(decoder) => decoder.in_frame(),
            FrameDecoder::Fixed(decoder) => decoder.in_frame(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        match self {
            FrameDecoder::Stuffed(decoder) => decoder.stats(),
            FrameDecoder::Fixed(decoder) => decoder.stats(),
        }
    }
}
