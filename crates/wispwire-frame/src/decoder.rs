//! Streaming decoder for the stuffed wire format.
//!
//! The decoder is a Mealy machine over the byte alphabet: every byte pushed
//! in moves it one step and produces at most one [`DecodeEvent`]. It has two
//! layers.
//!
//! The escape layer watches for runs of [`MARKER`] bytes on every byte,
//! inside or outside a frame:
//! - `AA AA 55` is an escaped pair; both `AA` are delivered as data.
//! - `AA AA AA` is the frame-start sentinel; whatever was being assembled is
//!   abandoned and a new frame starts. Further `AA` bytes right after it are
//!   part of the same preamble, since no valid id is `AA`.
//! - `AA AA` followed by anything else means the stream is out of step; the
//!   frame in progress is abandoned and the decoder hunts for a sentinel.
//!
//! The field layer assembles id, length, payload and CRC from the data bytes
//! the escape layer lets through. The end marker bypasses the escape layer:
//! the byte after the CRC completes the frame whatever its value. An `AA` in
//! that position is also held as the possible start of the next preamble, so
//! a lost or corrupted end marker costs neither frame.

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::codec::{checksum, Frame, CRC_SIZE, MARKER, MAX_PAYLOAD, STUFF};
use crate::id::is_reserved;

/// Something the decoder observed while consuming a byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A complete, CRC-checked frame.
    Frame(Frame),
    /// A frame-start sentinel. `discarded` is set when it cut a frame short.
    Resync { discarded: bool },
    /// Two markers followed by a byte that is neither a marker nor a stuff
    /// byte. `discarded` is set when a frame was in progress.
    Desync { discarded: bool },
    /// The received CRC did not match; the frame was dropped.
    CrcMismatch { id: u8 },
    /// A frame with a reserved id (64 and up) was dropped.
    Reserved { id: u8 },
}

/// Running totals kept by a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames delivered.
    pub frames: u64,
    /// Frames dropped for a bad CRC.
    pub crc_errors: u64,
    /// Frame-start sentinels seen.
    pub resyncs: u64,
    /// Out-of-step marker sequences seen.
    pub desyncs: u64,
    /// Reserved-id frames dropped.
    pub reserved: u64,
    /// Partially assembled frames (id already read) abandoned by a sentinel
    /// or desync.
    pub discarded: u64,
}

impl DecoderStats {
    /// Frames lost to corruption of any kind.
    pub fn corrupted(&self) -> u64 {
        self.crc_errors + self.discarded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    /// No marker pending.
    Clear,
    /// One marker held back.
    One,
    /// Two consecutive markers held back.
    Two,
    /// A sentinel was just seen; further markers extend the preamble.
    Preamble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Hunt,
    Id,
    Len,
    Payload,
    Crc(usize),
    End,
}

/// Recovers frames from a raw byte stream, one byte at a time.
#[derive(Debug)]
pub struct Decoder {
    escape: Escape,
    field: Field,
    id: u8,
    len: usize,
    payload: BytesMut,
    crc: [u8; CRC_SIZE],
    stats: DecoderStats,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            escape: Escape::Clear,
            field: Field::Hunt,
            id: 0,
            len: 0,
            payload: BytesMut::with_capacity(MAX_PAYLOAD),
            crc: [0; CRC_SIZE],
            stats: DecoderStats::default(),
        }
    }

    /// Consume one byte from the link.
    pub fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        if self.field == Field::End {
            return Some(self.finish(byte));
        }

        match self.escape {
            Escape::Clear => {
                if byte == MARKER {
                    self.escape = Escape::One;
                    None
                } else {
                    self.data(byte)
                }
            }
            Escape::One => {
                if byte == MARKER && self.field == Field::Crc(CRC_SIZE - 1) {
                    // The held marker is the last CRC byte. If it checks out
                    // this one is the end marker, otherwise both count
                    // towards a sentinel.
                    self.escape = Escape::Clear;
                    let held = self.data(MARKER);
                    if self.field == Field::End {
                        Some(self.finish(byte))
                    } else {
                        self.escape = Escape::Two;
                        held
                    }
                } else if byte == MARKER {
                    self.escape = Escape::Two;
                    None
                } else {
                    self.escape = Escape::Clear;
                    let held = self.data(MARKER);
                    let current = self.data(byte);
                    held.or(current)
                }
            }
            Escape::Two => {
                self.escape = Escape::Clear;
                match byte {
                    STUFF => {
                        let first = self.data(MARKER);
                        let second = self.data(MARKER);
                        first.or(second)
                    }
                    MARKER => {
                        self.escape = Escape::Preamble;
                        Some(self.resync())
                    }
                    _ => Some(self.desync()),
                }
            }
            Escape::Preamble => {
                if byte == MARKER {
                    None
                } else {
                    self.escape = Escape::Clear;
                    self.data(byte)
                }
            }
        }
    }

    /// Push a slice of bytes, handing every event to `on_event` in order.
    pub fn feed<F: FnMut(DecodeEvent)>(&mut self, bytes: &[u8], mut on_event: F) {
        for &byte in bytes {
            if let Some(event) = self.push(byte) {
                on_event(event);
            }
        }
    }

    /// Push a slice of bytes and collect the frames it completes.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        self.feed(bytes, |event| {
            if let DecodeEvent::Frame(frame) = event {
                frames.push(frame);
            }
        });
        frames
    }

    /// Forget any partial frame and held markers. Statistics are kept.
    pub fn reset(&mut self) {
        self.escape = Escape::Clear;
        self.field = Field::Hunt;
        self.payload.clear();
    }

    /// Whether a frame is currently being assembled.
    pub fn in_frame(&self) -> bool {
        self.field != Field::Hunt
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn resync(&mut self) -> DecodeEvent {
        let discarded = self.abandon();
        self.stats.resyncs += 1;
        if discarded {
            debug!("frame sentinel interrupted a partial frame");
        }
        self.field = Field::Id;
        DecodeEvent::Resync { discarded }
    }

    fn desync(&mut self) -> DecodeEvent {
        let discarded = self.abandon();
        self.stats.desyncs += 1;
        debug!(discarded, "unescaped marker pair; hunting for next frame");
        self.field = Field::Hunt;
        DecodeEvent::Desync { discarded }
    }

    fn abandon(&mut self) -> bool {
        // A sentinel right after a sentinel has nothing to throw away.
        let discarded = !matches!(self.field, Field::Hunt | Field::Id);
        if discarded {
            self.stats.discarded += 1;
        }
        self.payload.clear();
        discarded
    }

    fn data(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self.field {
            Field::Hunt => None,
            Field::Id => {
                if is_reserved(byte) {
                    self.stats.reserved += 1;
                    self.field = Field::Hunt;
                    return Some(DecodeEvent::Reserved { id: byte });
                }
                self.id = byte;
                self.field = Field::Len;
                None
            }
            Field::Len => {
                self.len = usize::from(byte);
                self.payload.clear();
                self.field = if self.len == 0 {
                    Field::Crc(0)
                } else {
                    Field::Payload
                };
                None
            }
            Field::Payload => {
                self.payload.put_u8(byte);
                if self.payload.len() == self.len {
                    self.field = Field::Crc(0);
                }
                None
            }
            Field::Crc(index) => {
                self.crc[index] = byte;
                if index + 1 < CRC_SIZE {
                    self.field = Field::Crc(index + 1);
                    return None;
                }
                let want = checksum(self.id, &self.payload).to_be_bytes();
                if want != self.crc {
                    self.stats.crc_errors += 1;
                    self.payload.clear();
                    self.field = Field::Hunt;
                    debug!(id = self.id, len = self.len, "crc mismatch; frame dropped");
                    return Some(DecodeEvent::CrcMismatch { id: self.id });
                }
                self.field = Field::End;
                None
            }
            Field::End => Some(self.finish(byte)),
        }
    }

    /// Complete the frame on its end marker, whose value is not checked.
    fn finish(&mut self, end: u8) -> DecodeEvent {
        self.field = Field::Hunt;
        self.escape = if end == MARKER {
            Escape::One
        } else {
            Escape::Clear
        };
        self.stats.frames += 1;
        let payload = self.payload.split().freeze();
        DecodeEvent::Frame(Frame {
            id: self.id,
            payload,
        })
    }
}
