//! Bounded hand-off queues between pumps and the application.
//!
//! Each queue has a fixed capacity and an [`OverflowPolicy`] that decides
//! what a push does when the queue is full. Nothing in this module ever
//! grows without bound, and nothing blocks without periodically checking
//! whether the caller has been asked to stop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

pub use crossbeam::channel::{RecvTimeoutError, TryRecvError};

use crate::error::{ConnError, Result};

/// Slice a blocked push waits before re-checking its stop condition.
pub const DEFAULT_PUSH_POLL: Duration = Duration::from_millis(10);

/// What a push does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for room (backpressure onto the producer).
    #[default]
    Block,
    /// Evict the oldest queued item to make room. With capacity 1 the queue
    /// always holds the latest item.
    DropOldest,
    /// Discard the item being pushed.
    DropNewest,
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OverflowPolicy::Block => "block",
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::DropNewest => "drop_newest",
        })
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was queued without loss.
    Queued,
    /// The item was queued after evicting the oldest one.
    DroppedOldest,
    /// The queue was full and the item was discarded.
    DroppedNewest,
}

/// Producer half of a bounded queue.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: Sender<T>,
    // Lets the producer evict from the front for DropOldest.
    evict: Receiver<T>,
    policy: OverflowPolicy,
    poll: Duration,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of a bounded queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded queue with the given overflow policy.
///
/// A capacity of zero is rejected: a rendezvous queue cannot honour the
/// drop policies.
pub fn bounded_queue<T>(
    capacity: usize,
    policy: OverflowPolicy,
) -> Result<(QueueSender<T>, QueueReceiver<T>)> {
    if capacity == 0 {
        return Err(ConnError::InvalidConfig(
            "queue capacity must be at least 1".to_string(),
        ));
    }

    let (tx, rx) = channel::bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    Ok((
        QueueSender {
            tx,
            evict: rx.clone(),
            policy,
            poll: DEFAULT_PUSH_POLL,
            dropped: Arc::clone(&dropped),
        },
        QueueReceiver { rx, dropped },
    ))
}

impl<T> QueueSender<T> {
    /// Override how often a blocked push re-checks its stop condition.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Push an item according to the queue's overflow policy.
    ///
    /// `stopped` is consulted between wait slices under [`OverflowPolicy::Block`];
    /// once it returns `true` the push gives up with [`ConnError::Stopped`]
    /// and the item is dropped.
    pub fn push(&self, item: T, stopped: &dyn Fn() -> bool) -> Result<PushOutcome> {
        match self.policy {
            OverflowPolicy::Block => self.push_blocking(item, stopped),
            OverflowPolicy::DropNewest => match self.tx.try_send(item) {
                Ok(()) => Ok(PushOutcome::Queued),
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    Ok(PushOutcome::DroppedNewest)
                }
                Err(TrySendError::Disconnected(_)) => Err(ConnError::Stopped),
            },
            OverflowPolicy::DropOldest => self.push_evicting(item),
        }
    }

    fn push_blocking(&self, mut item: T, stopped: &dyn Fn() -> bool) -> Result<PushOutcome> {
        loop {
            match self.tx.send_timeout(item, self.poll) {
                Ok(()) => return Ok(PushOutcome::Queued),
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(_)) => return Err(ConnError::Stopped),
            }
            if stopped() {
                return Err(ConnError::Stopped);
            }
        }
    }

    /// Queue `item`, evicting from the front only while the queue is still
    /// full on a second look.
    ///
    /// The consumer is not locked out, so one that takes an item right
    /// between that second look and the eviction still costs an item the
    /// push did not strictly need to drop. The queue never exceeds its
    /// capacity and `dropped` counts every eviction either way.
    fn push_evicting(&self, mut item: T) -> Result<PushOutcome> {
        let mut evicted = false;
        let mut full_once = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    return Ok(if evicted {
                        PushOutcome::DroppedOldest
                    } else {
                        PushOutcome::Queued
                    })
                }
                Err(TrySendError::Full(back)) => {
                    item = back;
                    if !full_once {
                        // Look once more before evicting.
                        full_once = true;
                        continue;
                    }
                    full_once = false;
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Err(ConnError::Stopped),
            }
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items lost to the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl<T> QueueReceiver<T> {
    /// Wait for the next item. Fails once the queue is empty and the sender
    /// is gone.
    pub fn recv(&self) -> std::result::Result<T, channel::RecvError> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> std::result::Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    /// Items lost to the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::thread;

    use super::*;

    fn never() -> bool {
        false
    }

    fn drain<T>(rx: &QueueReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    #[test]
    fn zero_capacity_rejected() {
        let result = bounded_queue::<u8>(0, OverflowPolicy::Block);
        assert!(matches!(result, Err(ConnError::InvalidConfig(_))));
    }

    #[test]
    fn drop_oldest_keeps_the_newest_items() {
        let (tx, rx) = bounded_queue(3, OverflowPolicy::DropOldest).unwrap();

        for i in 1..=3 {
            assert_eq!(tx.push(i, &never).unwrap(), PushOutcome::Queued);
        }
        assert_eq!(tx.push(4, &never).unwrap(), PushOutcome::DroppedOldest);

        assert_eq!(drain(&rx), vec![2, 3, 4]);
        assert_eq!(rx.dropped(), 1);
        assert_eq!(tx.dropped(), 1);
    }

    #[test]
    fn drop_oldest_outcomes_match_the_drop_count_under_a_racing_consumer() {
        let (tx, rx) = bounded_queue(4, OverflowPolicy::DropOldest).unwrap();
        let pushed = 20_000u64;

        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            while let Ok(item) = rx.recv() {
                received.push(item);
            }
            received
        });

        let mut reported = 0u64;
        for i in 0..pushed {
            match tx.push(i, &never).unwrap() {
                PushOutcome::DroppedOldest => reported += 1,
                PushOutcome::Queued => {}
                PushOutcome::DroppedNewest => panic!("drop_oldest never drops the newest"),
            }
        }
        let dropped = tx.dropped();
        drop(tx);
        let received = consumer.join().unwrap();

        assert_eq!(reported, dropped);
        assert_eq!(received.len() as u64 + dropped, pushed);
        assert!(received.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(received.last(), Some(&(pushed - 1)));
    }

    #[test]
    fn drop_newest_keeps_the_oldest_items() {
        let (tx, rx) = bounded_queue(3, OverflowPolicy::DropNewest).unwrap();

        for i in 1..=3 {
            assert_eq!(tx.push(i, &never).unwrap(), PushOutcome::Queued);
        }
        assert_eq!(tx.push(4, &never).unwrap(), PushOutcome::DroppedNewest);

        assert_eq!(drain(&rx), vec![1, 2, 3]);
        assert_eq!(rx.dropped(), 1);
    }

    #[test]
    fn capacity_one_drop_oldest_holds_latest() {
        let (tx, rx) = bounded_queue(1, OverflowPolicy::DropOldest).unwrap();

        for i in 0..10 {
            tx.push(i, &never).unwrap();
        }

        assert_eq!(drain(&rx), vec![9]);
        assert_eq!(rx.dropped(), 9);
    }

    #[test]
    fn block_gives_up_when_stopped() {
        let (tx, rx) = bounded_queue(2, OverflowPolicy::Block).unwrap();
        let tx = tx.with_poll_interval(Duration::from_millis(1));
        tx.push(1, &never).unwrap();
        tx.push(2, &never).unwrap();

        let checks = Cell::new(0);
        let stopped = || {
            checks.set(checks.get() + 1);
            checks.get() >= 3
        };
        let err = tx.push(3, &stopped).unwrap_err();

        assert!(matches!(err, ConnError::Stopped));
        assert_eq!(checks.get(), 3);
        assert_eq!(drain(&rx), vec![1, 2]);
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn block_resumes_when_consumer_makes_room() {
        let (tx, rx) = bounded_queue(1, OverflowPolicy::Block).unwrap();
        tx.push(1, &never).unwrap();

        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let first = rx.recv().unwrap();
            let second = rx.recv().unwrap();
            (first, second)
        });

        assert_eq!(tx.push(2, &never).unwrap(), PushOutcome::Queued);
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn receiver_sees_disconnect_after_draining() {
        let (tx, rx) = bounded_queue(4, OverflowPolicy::Block).unwrap();
        tx.push("last", &never).unwrap();
        drop(tx);

        assert_eq!(rx.recv().unwrap(), "last");
        assert!(rx.recv().is_err());
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(1)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn policy_names_round_trip_through_json() {
        let policy: OverflowPolicy = serde_json::from_str("\"drop_oldest\"").unwrap();
        assert_eq!(policy, OverflowPolicy::DropOldest);
        assert_eq!(
            serde_json::to_string(&OverflowPolicy::DropNewest).unwrap(),
            "\"drop_newest\""
        );
        assert_eq!(OverflowPolicy::Block.to_string(), "block");
    }
}
