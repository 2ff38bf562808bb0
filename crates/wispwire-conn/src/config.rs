use std::time::Duration;

use serde::{Deserialize, Serialize};
use wispwire_frame::{FrameConfig, WireFormat, DEFAULT_READ_CHUNK};
use wispwire_transport::DEFAULT_CONNECT_TIMEOUT;

use crate::error::{ConnError, Result};
use crate::queue::OverflowPolicy;

/// Default capacity of both queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default pump poll tick (link read timeout and queue wait slice).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time a single frame write may take before it is abandoned.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection behavior configuration.
///
/// Durations are (de)serialized as integer milliseconds under `*_ms` keys.
/// Missing keys take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Framing spoken on the link.
    pub wire: WireFormat,
    /// Decoded frames waiting for the application.
    pub inbound_capacity: usize,
    /// What the inbound pump does when the application falls behind.
    pub inbound_policy: OverflowPolicy,
    /// Submitted frames waiting for the link.
    pub outbound_capacity: usize,
    /// What `submit` does when the link falls behind.
    pub outbound_policy: OverflowPolicy,
    /// How often blocked pumps re-check for a stop request.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// Deadline for establishing the link.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    /// Deadline for writing one frame; `None` waits forever.
    #[serde(rename = "write_timeout_ms", with = "opt_millis")]
    pub write_timeout: Option<Duration>,
    /// Bytes requested from the link per read.
    pub read_chunk_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            wire: WireFormat::Stuffed,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
            inbound_policy: OverflowPolicy::DropOldest,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            outbound_policy: OverflowPolicy::Block,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

impl ConnectionConfig {
    pub fn with_wire(mut self, wire: WireFormat) -> Self {
        self.wire = wire;
        self
    }

    pub fn with_inbound(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.inbound_capacity = capacity;
        self.inbound_policy = policy;
        self
    }

    pub fn with_outbound(mut self, capacity: usize, policy: OverflowPolicy) -> Self {
        self.outbound_capacity = capacity;
        self.outbound_policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    /// Reject settings the pumps cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.wire.validate()?;
        if self.inbound_capacity == 0 || self.outbound_capacity == 0 {
            return Err(ConnError::InvalidConfig(
                "queue capacities must be at least 1".to_string(),
            ));
        }
        // Zero would mean "no timeout" to the OS and pumps could never stop.
        if self.poll_interval.is_zero() {
            return Err(ConnError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConnError::InvalidConfig(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if self.write_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConnError::InvalidConfig(
                "write timeout must be non-zero (omit it to wait forever)".to_string(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(ConnError::InvalidConfig(
                "read chunk size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Reader/writer settings for the pumps.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            wire: self.wire,
            read_chunk_size: self.read_chunk_size,
            read_timeout: Some(self.poll_interval),
            write_timeout: self.write_timeout,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
