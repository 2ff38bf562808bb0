use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use wispwire_transport::LinkStream;

use crate::codec::Frame;
use crate::decoder::{DecodeEvent, Decoder, DecoderStats};
use crate::error::{FrameError, Result};
use crate::wire::{FrameConfig, FrameDecoder};

/// Largest UDP payload over IPv4.
const MAX_DATAGRAM: usize = 65_507;

/// Reads complete frames from any `Read` stream.
///
/// Bytes are pushed through the decoder as they arrive, so partial reads,
/// noise and corrupted frames are handled internally; callers only ever
/// see valid frames. Decoder state survives a failed read: after a timeout,
/// calling [`read_frame`](Self::read_frame) again continues the frame that
/// was in progress.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
    ready: VecDeque<Frame>,
    config: FrameConfig,
    eof_on_empty_read: bool,
    bytes_read: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader for the stuffed format.
    pub fn new(inner: T) -> Self {
        let config = FrameConfig::default();
        Self {
            inner,
            decoder: FrameDecoder::Stuffed(Decoder::new()),
            chunk: vec![0; config.read_chunk_size],
            ready: VecDeque::new(),
            config,
            eof_on_empty_read: true,
            bytes_read: 0,
        }
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Result<Self> {
        if config.read_chunk_size == 0 {
            return Err(FrameError::InvalidConfig(
                "read chunk size must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            inner,
            decoder: config.wire.decoder()?,
            chunk: vec![0; config.read_chunk_size],
            ready: VecDeque::new(),
            config,
            eof_on_empty_read: true,
            bytes_read: 0,
        })
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, and
    /// passes read timeouts through as `FrameError::Io`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.eof_on_empty_read {
                    return Err(FrameError::ConnectionClosed);
                }
                continue;
            }

            self.bytes_read += read as u64;
            for &byte in &self.chunk[..read] {
                if let Some(DecodeEvent::Frame(frame)) = self.decoder.push(byte) {
                    self.ready.push_back(frame);
                }
            }
        }
    }

    /// Frames decoded but not yet returned.
    pub fn buffered(&self) -> usize {
        self.ready.len()
    }

    /// Total bytes pulled from the stream.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Decoder counters (frames, CRC errors, resyncs, ...).
    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Treat a zero-length read as a harmless empty datagram instead of EOF.
    pub fn set_eof_on_empty_read(&mut self, eof: bool) {
        self.eof_on_empty_read = eof;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for a link and apply the read timeout from config.
    ///
    /// On datagram links empty reads are not treated as EOF, and the read
    /// buffer is sized for a whole datagram since a short buffer would
    /// silently truncate it.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        let eof = inner.kind().eof_on_empty_read();
        let mut reader = Self::with_config(inner, config)?;
        reader.set_eof_on_empty_read(eof);
        if !eof && reader.chunk.len() < MAX_DATAGRAM {
            reader.chunk.resize(MAX_DATAGRAM, 0);
        }
        Ok(reader)
    }
}

pub(crate) fn transport_to_frame_error(err: wispwire_transport::TransportError) -> FrameError {
    match err {
        wispwire_transport::TransportError::Io(io)
        | wispwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        wispwire_transport::TransportError::Bind { source, .. }
        | wispwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;
    use crate::wire::WireFormat;

    fn wire(frames: &[(u32, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (id, payload) in frames {
            encode_frame(*id, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(1, b"hello")])));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.id, 1);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let bytes = wire(&[(1, b"one"), (2, b"two"), (3, b"three")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.id, f1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((f2.id, f2.payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!((f3.id, f3.payload.as_ref()), (3, b"three".as_ref()));
        assert_eq!(reader.decoder_stats().frames, 3);
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[(4, b"\xAA\xAAslow")]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.id, 4);
        assert_eq!(frame.payload.as_ref(), b"\xAA\xAAslow");
    }

    #[test]
    fn noise_between_frames_is_skipped() {
        let mut bytes = vec![0x13, 0x37, 0xAA, 0x00];
        bytes.extend(wire(&[(1, b"a")]));
        bytes.extend_from_slice(&[0xFF, 0xAA, 0xAA, 0x02]);
        bytes.extend(wire(&[(2, b"b")]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().id, 1);
        assert_eq!(reader.read_frame().unwrap().id, 2);
        assert_eq!(reader.decoder_stats().desyncs, 1);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(&[(2, b"only-part")]);
        let mut reader = FrameReader::new(Cursor::new(bytes[..8].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn empty_reads_tolerated_when_configured() {
        let reader = EmptyThenData {
            empties: 3,
            bytes: wire(&[(5, b"dgram")]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        framed.set_eof_on_empty_read(false);

        assert_eq!(framed.read_frame().unwrap().id, 5);
    }

    #[test]
    fn timeout_mid_frame_keeps_decoder_state() {
        let bytes = wire(&[(7, b"split by timeout")]);
        let reader = TimeoutAfter {
            split: 6,
            timed_out: false,
            bytes,
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));

        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.id, 7);
        assert_eq!(frame.payload.as_ref(), b"split by timeout");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: wire(&[(8, b"ok")]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.id, 8);
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn fixed_format_reader() {
        let config = FrameConfig {
            wire: WireFormat::Fixed { payload_len: 4 },
            ..FrameConfig::default()
        };
        let bytes = b"\x01abcd\x02efgh".to_vec();
        let mut reader = FrameReader::with_config(Cursor::new(bytes), config).unwrap();

        assert_eq!(reader.read_frame().unwrap(), Frame::new(1, &b"abcd"[..]));
        assert_eq!(reader.read_frame().unwrap(), Frame::new(2, &b"efgh"[..]));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = FrameConfig {
            read_chunk_size: 0,
            ..FrameConfig::default()
        };
        let result = FrameReader::with_config(Cursor::new(Vec::new()), config);
        assert!(matches!(result, Err(FrameError::InvalidConfig(_))));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert_eq!(reader.buffered(), 0);
        assert_eq!(reader.bytes_read(), 0);
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_link_pair() {
        let (left, right) = LinkStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(1, b"ping").unwrap();
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.id, 1);
        assert_eq!(frame.payload.as_ref(), b"ping");
    }

    #[test]
    #[cfg(unix)]
    fn concurrent_reader_writer_threads() {
        let (left, right) = LinkStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u32 {
                let frame = reader.read_frame().unwrap();
                assert_eq!(u32::from(frame.id), expected % 5);
                assert_eq!(frame.payload.as_ref(), format!("msg-{expected}").as_bytes());
            }
        });

        for i in 0..64u32 {
            let payload = format!("msg-{i}");
            writer.send(i % 5, payload.as_bytes()).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_link() {
        let (left, _right) = LinkStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_link(left, cfg).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct EmptyThenData {
        empties: usize,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for EmptyThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.empties > 0 {
                self.empties -= 1;
                return Ok(0);
            }
            copy_remaining(&self.bytes, &mut self.pos, buf)
        }
    }

    struct TimeoutAfter {
        split: usize,
        timed_out: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for TimeoutAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos < self.split {
                let n = (self.split - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            copy_remaining(&self.bytes, &mut self.pos, buf)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            copy_remaining(&self.bytes, &mut self.pos, buf)
        }
    }

    fn copy_remaining(bytes: &[u8], pos: &mut usize, buf: &mut [u8]) -> std::io::Result<usize> {
        if *pos >= bytes.len() {
            return Ok(0);
        }
        let n = (bytes.len() - *pos).min(buf.len());
        buf[..n].copy_from_slice(&bytes[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }
}
