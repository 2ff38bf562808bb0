use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use wispwire_frame::DecoderStats;

/// Live counters shared between a connection's pumps.
///
/// Decoder counters are owned by the inbound pump's decoder and mirrored
/// here after every read, so they lag the decoder by at most one poll tick.
#[derive(Debug, Default)]
pub struct LinkStats {
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    crc_errors: AtomicU64,
    resyncs: AtomicU64,
    desyncs: AtomicU64,
    reserved_dropped: AtomicU64,
    partial_discarded: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    write_timeouts: AtomicU64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the inbound decoder's totals.
    pub fn record_inbound(&self, decoder: DecoderStats, bytes_read: u64) {
        self.frames_received.store(decoder.frames, Ordering::Relaxed);
        self.crc_errors.store(decoder.crc_errors, Ordering::Relaxed);
        self.resyncs.store(decoder.resyncs, Ordering::Relaxed);
        self.desyncs.store(decoder.desyncs, Ordering::Relaxed);
        self.reserved_dropped.store(decoder.reserved, Ordering::Relaxed);
        self.partial_discarded.store(decoder.discarded, Ordering::Relaxed);
        self.bytes_received.store(bytes_read, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes_written: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.store(bytes_written, Ordering::Relaxed);
    }

    pub fn record_write_timeout(&self, bytes_written: u64) {
        self.write_timeouts.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.store(bytes_written, Ordering::Relaxed);
    }

    /// Copy the counters out. Queue drop counts are filled in by the caller.
    pub fn snapshot(&self, inbound_dropped: u64, outbound_dropped: u64) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            crc_errors: self.crc_errors.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            desyncs: self.desyncs.load(Ordering::Relaxed),
            reserved_dropped: self.reserved_dropped.load(Ordering::Relaxed),
            partial_discarded: self.partial_discarded.load(Ordering::Relaxed),
            inbound_dropped,
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            write_timeouts: self.write_timeouts.load(Ordering::Relaxed),
            outbound_dropped,
        }
    }
}

/// Point-in-time copy of a connection's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Frames decoded from the link.
    pub frames_received: u64,
    /// Raw bytes read from the link.
    pub bytes_received: u64,
    /// Frames dropped for a bad CRC.
    pub crc_errors: u64,
    /// Frame-start sentinels seen.
    pub resyncs: u64,
    /// Out-of-step marker sequences seen.
    pub desyncs: u64,
    /// Frames with a reserved id dropped.
    pub reserved_dropped: u64,
    /// Partial frames abandoned by a resync or desync.
    pub partial_discarded: u64,
    /// Decoded frames evicted or rejected by the inbound queue.
    pub inbound_dropped: u64,
    /// Frames fully written to the link.
    pub frames_sent: u64,
    /// Raw bytes written to the link, stuffing included.
    pub bytes_sent: u64,
    /// Frames abandoned because the link did not accept them in time.
    pub write_timeouts: u64,
    /// Submitted frames evicted or rejected by the outbound queue.
    pub outbound_dropped: u64,
}

impl StatsSnapshot {
    /// Inbound frames lost to line corruption.
    pub fn corrupted(&self) -> u64 {
        self.crc_errors + self.partial_discarded
    }
}
