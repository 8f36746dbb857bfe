//! Link configuration.

use crate::error::LinkError;
use hdlc_wire::DEFAULT_MAX_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time to wait for an acknowledgment
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default retransmission budget per frame
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Largest accepted `max_chunk_size`
pub const MAX_CHUNK_SIZE_LIMIT: usize = 64 * 1024;

/// Parameters shared by the sending and receiving side of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Largest payload carried by one information frame, before stuffing
    pub max_chunk_size: usize,
    /// How long the sender waits for a reply before retransmitting
    #[serde(rename = "ack_timeout_ms", with = "duration_ms")]
    pub ack_timeout: Duration,
    /// Retransmissions allowed per frame before the link is declared failed
    pub max_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl LinkConfig {
    /// Check that the configuration can drive a transfer
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.max_chunk_size == 0 {
            return Err(LinkError::Config("max_chunk_size must be at least 1".into()));
        }
        if self.max_chunk_size > MAX_CHUNK_SIZE_LIMIT {
            return Err(LinkError::Config(format!(
                "max_chunk_size must be at most {}, got {}",
                MAX_CHUNK_SIZE_LIMIT, self.max_chunk_size
            )));
        }
        if self.ack_timeout.is_zero() {
            return Err(LinkError::Config("ack_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
