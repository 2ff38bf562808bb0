//! A running link: two pump threads and two bounded queues.
//!
//! ```text
//!            ┌──────────────┐  inbound queue   ┌─────────────┐
//!  link ───▶ │ inbound pump │ ───────────────▶ │             │
//!            └──────────────┘                  │ application │
//!            ┌───────────────┐ outbound queue  │             │
//!  link ◀─── │ outbound pump │ ◀────────────── │             │
//!            └───────────────┘                 └─────────────┘
//! ```
//!
//! The inbound pump reads the link with a short timeout (the poll tick),
//! decodes and queues frames. The outbound pump waits on its queue, encodes
//! and writes. Only those two threads touch the link; the application only
//! touches the queues.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};
use wispwire_frame::{Frame, FrameError, FrameReader, FrameWriter};
use wispwire_transport::{LinkKind, LinkSpec, LinkStream};

use crate::config::ConnectionConfig;
use crate::error::{ConnError, Result};
use crate::queue::{
    bounded_queue, PushOutcome, QueueReceiver, QueueSender, RecvTimeoutError, TryRecvError,
};
use crate::stats::{LinkStats, StatsSnapshot};

/// How [`Connection::stop`] treats frames still waiting to be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopMode {
    /// Write every queued outbound frame before closing the link.
    #[default]
    Graceful,
    /// Discard queued outbound frames and close immediately.
    Hard,
}

/// State shared between the handle and both pumps.
#[derive(Debug)]
struct Shared {
    label: String,
    kind: LinkKind,
    stop: AtomicBool,
    drain: AtomicBool,
    connected: AtomicBool,
    last_error: Mutex<Option<String>>,
    stats: LinkStats,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record a link failure and halt both pumps. Failures observed while
    /// stopping are the result of closing the link and are not recorded.
    fn fail(&self, reason: String) {
        if self.stopping() {
            debug!(link = %self.label, %reason, "link error during stop ignored");
            return;
        }
        warn!(link = %self.label, %reason, "connection lost");
        if let Ok(mut slot) = self.last_error.lock() {
            slot.get_or_insert(reason);
        }
        self.connected.store(false, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    /// The error for an operation on a connection that is no longer running.
    fn closed_error(&self) -> ConnError {
        match self.last_error() {
            Some(reason) => ConnError::ConnectionLost(reason),
            None => ConnError::Stopped,
        }
    }
}

/// A framed link to a test bench, pumped by two background threads.
///
/// Dropping a connection performs a [`StopMode::Hard`] stop.
#[derive(Debug)]
pub struct Connection {
    shared: Arc<Shared>,
    config: ConnectionConfig,
    /// `None` once stopped; the handle closes with it.
    link: Option<LinkStream>,
    inbound: QueueReceiver<Frame>,
    outbound: QueueSender<Frame>,
    inbound_pump: Option<JoinHandle<()>>,
    outbound_pump: Option<JoinHandle<()>>,
}

impl Connection {
    /// Open the link described by `spec` and start pumping.
    pub fn connect(spec: &LinkSpec, config: ConnectionConfig) -> Result<Self> {
        crate::connector::connect(spec, config)
    }

    /// Start pumping an already open link.
    pub fn start(link: LinkStream, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let label = link.peer_label();
        let frame_config = config.frame_config();

        let reader = FrameReader::with_config_link(link.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_link(link.try_clone()?, frame_config)?;

        let (inbound_tx, inbound_rx) =
            bounded_queue(config.inbound_capacity, config.inbound_policy)?;
        let inbound_tx = inbound_tx.with_poll_interval(config.poll_interval);
        let (outbound_tx, outbound_rx) =
            bounded_queue(config.outbound_capacity, config.outbound_policy)?;
        let outbound_tx = outbound_tx.with_poll_interval(config.poll_interval);

        let shared = Arc::new(Shared {
            label: label.clone(),
            kind: link.kind(),
            stop: AtomicBool::new(false),
            drain: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            last_error: Mutex::new(None),
            stats: LinkStats::new(),
        });

        let inbound_pump = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("wispwire-inbound".to_string())
                .spawn(move || run_inbound(reader, inbound_tx, shared))
                .map_err(|source| ConnError::Spawn {
                    name: "inbound",
                    source,
                })?
        };

        let outbound_pump = {
            let pump_shared = Arc::clone(&shared);
            let poll = config.poll_interval;
            let spawned = thread::Builder::new()
                .name("wispwire-outbound".to_string())
                .spawn(move || run_outbound(writer, outbound_rx, pump_shared, poll));
            match spawned {
                Ok(handle) => handle,
                Err(source) => {
                    shared.stop.store(true, Ordering::SeqCst);
                    let _ = inbound_pump.join();
                    return Err(ConnError::Spawn {
                        name: "outbound",
                        source,
                    });
                }
            }
        };

        info!(
            link = %label,
            kind = %link.kind(),
            inbound = %config.inbound_policy,
            outbound = %config.outbound_policy,
            "connection started"
        );

        Ok(Self {
            shared,
            config,
            link: Some(link),
            inbound: inbound_rx,
            outbound: outbound_tx,
            inbound_pump: Some(inbound_pump),
            outbound_pump: Some(outbound_pump),
        })
    }

    /// Queue a frame for sending.
    ///
    /// Bounds are checked here, before anything is queued. What happens when
    /// the outbound queue is full depends on the configured policy; under
    /// `Block` this waits until the pump makes room or the connection stops.
    pub fn submit(&self, id: u32, payload: &[u8]) -> Result<PushOutcome> {
        self.config.wire.check(id, payload.len())?;
        self.enqueue(Frame::new(id as u8, Bytes::copy_from_slice(payload)))
    }

    /// Queue an already built frame for sending.
    pub fn send_frame(&self, frame: Frame) -> Result<PushOutcome> {
        self.config
            .wire
            .check(u32::from(frame.id), frame.payload.len())?;
        self.enqueue(frame)
    }

    fn enqueue(&self, frame: Frame) -> Result<PushOutcome> {
        if self.shared.stopping() {
            return Err(self.shared.closed_error());
        }
        let shared = &self.shared;
        let outcome = self
            .outbound
            .push(frame, &|| shared.stopping())
            .map_err(|_| shared.closed_error())?;
        if outcome == PushOutcome::DroppedNewest {
            debug!(link = %shared.label, "outbound queue full; frame dropped");
        }
        Ok(outcome)
    }

    /// Wait for the next frame.
    ///
    /// Frames already queued are delivered even after the link is lost;
    /// once the queue is drained the loss is reported.
    pub fn receive(&self) -> Result<Frame> {
        self.inbound.recv().map_err(|_| self.shared.closed_error())
    }

    /// Wait up to `timeout` for the next frame.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Frame> {
        match self.inbound.recv_timeout(timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(ConnError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(self.shared.closed_error()),
        }
    }

    /// Take the next frame if one is queued.
    pub fn try_receive(&self) -> Result<Option<Frame>> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.shared.closed_error()),
        }
    }

    /// Whether both pumps are running on a healthy link.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Why the link was lost, if it was.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared
            .stats
            .snapshot(self.inbound.dropped(), self.outbound.dropped())
    }

    /// Frames decoded but not yet received by the application.
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Frames submitted but not yet written.
    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    /// Description of the remote end.
    pub fn peer(&self) -> &str {
        &self.shared.label
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Stop both pumps and close the link.
    ///
    /// The outbound pump finishes first (writing or discarding what is
    /// queued, per `mode`), then the link is shut down and the inbound pump
    /// is joined. The link handle is closed before `stop` returns, so a port
    /// or bound address can be reopened straight away. Frames already in the
    /// inbound queue can still be received afterwards. Calling `stop` again
    /// is a no-op.
    pub fn stop(&mut self, mode: StopMode) -> Result<StatsSnapshot> {
        if self.inbound_pump.is_none() && self.outbound_pump.is_none() {
            return Ok(self.stats());
        }

        self.shared
            .drain
            .store(mode == StopMode::Graceful, Ordering::SeqCst);
        self.shared.stop.store(true, Ordering::SeqCst);

        let outbound = join_pump(self.outbound_pump.take(), "outbound");
        if let Some(Err(err)) = self.link.as_ref().map(LinkStream::shutdown) {
            debug!(link = %self.shared.label, error = %err, "link shutdown failed");
        }
        let inbound = join_pump(self.inbound_pump.take(), "inbound");
        // The pumps owned the other clones; datagram sockets and serial
        // ports are released here.
        drop(self.link.take());
        self.shared.connected.store(false, Ordering::SeqCst);

        let stats = self.stats();
        info!(
            link = %self.shared.label,
            ?mode,
            frames_received = stats.frames_received,
            frames_sent = stats.frames_sent,
            corrupted = stats.corrupted(),
            "connection stopped"
        );

        outbound?;
        inbound?;
        Ok(stats)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.stop(StopMode::Hard);
    }
}

fn join_pump(handle: Option<JoinHandle<()>>, name: &'static str) -> Result<()> {
    match handle {
        Some(handle) => handle.join().map_err(|_| ConnError::PumpPanicked(name)),
        None => Ok(()),
    }
}

/// Read timeouts are the pump's poll tick, not failures.
fn is_poll_tick(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// A connected UDP socket reports an ICMP port-unreachable from an earlier
/// datagram on its next call. The bench may simply not be up yet.
fn is_refused_datagram(kind: LinkKind, err: &std::io::Error) -> bool {
    kind == LinkKind::Udp && err.kind() == ErrorKind::ConnectionRefused
}

fn run_inbound(mut reader: FrameReader<LinkStream>, tx: QueueSender<Frame>, shared: Arc<Shared>) {
    debug!(link = %shared.label, "inbound pump running");
    let stopped = || shared.stopping();

    while !shared.stopping() {
        match reader.read_frame() {
            Ok(frame) => {
                let id = frame.id;
                match tx.push(frame, &stopped) {
                    Ok(PushOutcome::Queued) => {}
                    Ok(outcome) => {
                        debug!(link = %shared.label, id, ?outcome, "inbound queue full")
                    }
                    Err(_) => break,
                }
            }
            Err(FrameError::Io(err)) if is_poll_tick(&err) => {}
            Err(FrameError::Io(err)) if is_refused_datagram(shared.kind, &err) => {
                debug!(link = %shared.label, "datagram refused by peer");
            }
            Err(FrameError::ConnectionClosed) => {
                shared.fail("link closed by peer".to_string());
            }
            Err(err) => {
                shared.fail(err.to_string());
            }
        }
        shared
            .stats
            .record_inbound(reader.decoder_stats(), reader.bytes_read());
    }

    shared
        .stats
        .record_inbound(reader.decoder_stats(), reader.bytes_read());
    debug!(link = %shared.label, "inbound pump exiting");
}

fn run_outbound(
    mut writer: FrameWriter<LinkStream>,
    rx: QueueReceiver<Frame>,
    shared: Arc<Shared>,
    poll: Duration,
) {
    debug!(link = %shared.label, "outbound pump running");

    loop {
        if shared.stopping() {
            if shared.drain.load(Ordering::SeqCst) {
                let mut drained = 0usize;
                while let Ok(frame) = rx.try_recv() {
                    if !write_one(&mut writer, &frame, &shared) {
                        break;
                    }
                    drained += 1;
                }
                debug!(link = %shared.label, drained, "outbound queue drained");
            } else if !rx.is_empty() {
                debug!(link = %shared.label, discarded = rx.len(), "outbound frames discarded");
            }
            break;
        }

        match rx.recv_timeout(poll) {
            Ok(frame) => {
                if !write_one(&mut writer, &frame, &shared) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(link = %shared.label, "outbound pump exiting");
}

/// Write one frame; `false` means the link is unusable.
fn write_one(writer: &mut FrameWriter<LinkStream>, frame: &Frame, shared: &Shared) -> bool {
    match writer.write_frame(frame) {
        Ok(()) => {
            shared.stats.record_sent(writer.bytes_written());
            true
        }
        Err(FrameError::Io(err)) if is_poll_tick(&err) => {
            shared.stats.record_write_timeout(writer.bytes_written());
            warn!(link = %shared.label, id = frame.id, "write timed out; frame dropped");
            true
        }
        Err(FrameError::Io(err)) if is_refused_datagram(shared.kind, &err) => {
            debug!(link = %shared.label, id = frame.id, "datagram refused; frame dropped");
            true
        }
        Err(err) => {
            shared.fail(err.to_string());
            false
        }
    }
}
