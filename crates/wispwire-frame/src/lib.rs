//! Byte-stuffed, CRC-checked message framing for serial and network links.
//!
//! Every frame on the wire looks like:
//! - A 3-byte preamble `AA AA AA` for stream synchronization
//! - A 1-byte frame id (0-63) and a 1-byte payload length
//! - Up to 255 payload bytes
//! - A big-endian CRC32 over id, length and payload, then an end marker
//!
//! Two consecutive `AA` bytes inside a frame are always followed by a stuffed
//! `55`, so the preamble can only mean "a frame starts here". The decoder
//! uses that to recover from noise, dropped bytes and truncated frames
//! without any help from the caller.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod fixed;
pub mod id;
pub mod reader;
pub mod wire;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::StuffedCodec;
pub use codec::{
    checksum, encode_frame, Frame, CRC_SIZE, END_MARKER, FRAME_OVERHEAD, MARKER, MAX_PAYLOAD,
    PREAMBLE, STUFF,
};
pub use decoder::{DecodeEvent, Decoder, DecoderStats};
pub use error::{FrameError, Result};
pub use fixed::{encode_record, FixedDecoder, DEFAULT_FIXED_PAYLOAD};
pub use id::{is_reserved, is_valid, MAX_ID, RESERVED_ID_START};
pub use reader::FrameReader;
pub use wire::{FrameConfig, FrameDecoder, WireFormat, DEFAULT_READ_CHUNK};
pub use writer::FrameWriter;
