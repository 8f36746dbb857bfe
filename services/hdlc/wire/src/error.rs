//! Wire protocol error types.

use thiserror::Error;

/// Structural decode failures.
///
/// Every variant describes a frame that cannot be interpreted at all. A frame
/// whose only problem is a CRC mismatch is *not* an error here: it decodes
/// into a [`crate::DecodedFrame`] flagged as corrupted so the receiver can
/// answer it with a reject.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than the smallest possible frame
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    /// Opening or closing flag missing
    #[error("missing frame delimiter")]
    MissingFlag,

    /// Unknown frame type code
    #[error("unknown type {0:#04x}")]
    Type(u8),

    /// Sequence number outside the 3-bit space
    #[error("sequence number out of range: {0}")]
    Seq(u8),

    /// Buffered bytes exceed the largest frame the decoder accepts
    #[error("no frame boundary within {0} bytes")]
    Overrun(usize),
}
