//! Threaded connection management for framed test-bench links.
//!
//! This is the "just works" layer. Open a link, submit `(id, payload)`
//! pairs and receive decoded frames; two background pumps own the link and
//! bounded queues with explicit overflow policies sit in between.

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod listener;
pub mod queue;
pub mod stats;

pub use config::{
    ConnectionConfig, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_WRITE_TIMEOUT,
};
pub use connection::{Connection, StopMode};
pub use connector::{connect, connect_default};
pub use error::{ConnError, Result};
pub use listener::ConnectionListener;
pub use queue::{bounded_queue, OverflowPolicy, PushOutcome, QueueReceiver, QueueSender};
pub use stats::{LinkStats, StatsSnapshot};
