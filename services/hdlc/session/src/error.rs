//! Session error types.

use hdlc_wire::Seq;
use thiserror::Error;

/// Failures that end a transfer.
///
/// Malformed frames, CRC mismatches, sequence mismatches and timeouts are all
/// recovered inside the state machines and never surface here.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The underlying byte stream failed
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer closed the stream while a reply was still expected
    #[error("transport closed by peer")]
    Closed,

    /// Retransmission budget exhausted
    #[error("link failure: frame {seq} unacknowledged after {attempts} transmissions")]
    LinkFailure {
        /// Sequence number of the outstanding frame
        seq: Seq,
        /// Total transmissions of that frame, the first one included
        attempts: u32,
    },

    /// Chunk larger than the configured maximum
    #[error("chunk of {len} bytes exceeds maximum of {max}")]
    Oversize {
        /// Chunk length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Invalid link configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
