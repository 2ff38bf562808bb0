use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::id::{is_valid, MAX_ID};

/// Byte that opens a frame (three in a row) and that triggers stuffing.
pub const MARKER: u8 = 0xAA;

/// Byte inserted after two consecutive [`MARKER`]s, and the end marker.
pub const STUFF: u8 = 0x55;

/// Frame-start sentinel.
pub const PREAMBLE: [u8; 3] = [MARKER, MARKER, MARKER];

/// Trailing end marker. Decoders read it but never check its value.
pub const END_MARKER: u8 = STUFF;

/// Largest payload a frame can carry (the length field is one byte).
pub const MAX_PAYLOAD: usize = 255;

/// Size of the big-endian CRC32 trailer.
pub const CRC_SIZE: usize = 4;

/// Wire overhead of an unstuffed frame: preamble, id, len, crc, end marker.
pub const FRAME_OVERHEAD: usize = PREAMBLE.len() + 2 + CRC_SIZE + 1;

/// A decoded frame: a 6-bit id and up to 255 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Application frame id (0-63).
    pub id: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame. Bounds are checked when it is encoded.
    pub fn new(id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Check the id and payload bounds.
    pub fn validate(&self) -> Result<()> {
        validate(u32::from(self.id), self.payload.len())
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(u32::from(self.id), &self.payload, &mut buf)?;
        Ok(buf.freeze())
    }

    /// The total wire size of this frame, including stuffing bytes.
    pub fn wire_size(&self) -> usize {
        let header = [self.id, self.payload.len() as u8];
        let crc = checksum(self.id, &self.payload).to_be_bytes();
        let body = header.iter().chain(self.payload.iter()).chain(crc.iter());
        FRAME_OVERHEAD + self.payload.len() + stuffing_count(body.copied())
    }
}

/// CRC32 (IEEE) over `id ‖ len ‖ payload`, as carried in the frame trailer.
pub fn checksum(id: u8, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[id, payload.len() as u8]);
    hasher.update(payload);
    hasher.finalize()
}

/// Encode a frame into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────┬────┬─────┬───────────┬──────────────┬─────┐
/// │ AA AA AA │ id │ len │ payload   │ CRC32 (4B BE)│ 55  │
/// │ preamble │    │     │ (len B)   │ id‖len‖pld   │ end │
/// └──────────┴────┴─────┴───────────┴──────────────┴─────┘
/// ```
/// Between the preamble and the end marker, every run of two `AA` bytes is
/// followed by an inserted `55`, so the preamble never appears inside a
/// frame. The CRC covers the unstuffed bytes.
///
/// Fails without touching `dst` if `id > 63` or the payload exceeds 255
/// bytes.
pub fn encode_frame(id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    validate(id, payload.len())?;
    let id = id as u8;
    let crc = checksum(id, payload).to_be_bytes();

    dst.reserve(FRAME_OVERHEAD + payload.len() + payload.len() / 2 + 2);
    dst.put_slice(&PREAMBLE);

    let mut stuffer = Stuffer::new(dst);
    stuffer.put(id);
    stuffer.put(payload.len() as u8);
    for &byte in payload {
        stuffer.put(byte);
    }
    for byte in crc {
        stuffer.put(byte);
    }

    dst.put_u8(END_MARKER);
    Ok(())
}

fn validate(id: u32, len: usize) -> Result<()> {
    if !is_valid(id) {
        return Err(FrameError::InvalidId(id));
    }
    if len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

/// Copies body bytes, inserting [`STUFF`] after every second consecutive
/// [`MARKER`].
struct Stuffer<'a> {
    dst: &'a mut BytesMut,
    run: u8,
}

impl<'a> Stuffer<'a> {
    fn new(dst: &'a mut BytesMut) -> Self {
        Self { dst, run: 0 }
    }

    fn put(&mut self, byte: u8) {
        self.dst.put_u8(byte);
        if byte == MARKER {
            self.run += 1;
            if self.run == 2 {
                self.dst.put_u8(STUFF);
                self.run = 0;
            }
        } else {
            self.run = 0;
        }
    }
}

fn stuffing_count(body: impl Iterator<Item = u8>) -> usize {
    let mut run = 0u8;
    let mut inserted = 0usize;
    for byte in body {
        if byte == MARKER {
            run += 1;
            if run == 2 {
                inserted += 1;
                run = 0;
            }
        } else {
            run = 0;
        }
    }
    inserted
}

const _: () = assert!(MAX_ID < MARKER, "ids never collide with the marker byte");
