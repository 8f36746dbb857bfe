//! Modulo-8 sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the sequence field in bits
pub const SEQ_BITS: u32 = 3;

/// Size of the sequence space
pub const SEQ_MODULUS: u8 = 1 << SEQ_BITS;

/// A sequence number in `0..SEQ_MODULUS`.
///
/// All arithmetic wraps modulo [`SEQ_MODULUS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Seq(u8);

impl Seq {
    /// Sequence number zero
    pub const ZERO: Seq = Seq(0);

    /// Create a sequence number, reducing `value` modulo the sequence space
    pub const fn wrapping(value: u8) -> Self {
        Seq(value % SEQ_MODULUS)
    }

    /// Raw value
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The following sequence number
    pub const fn next(self) -> Self {
        Seq((self.0 + 1) % SEQ_MODULUS)
    }

    /// The preceding sequence number
    pub const fn prev(self) -> Self {
        Seq((self.0 + SEQ_MODULUS - 1) % SEQ_MODULUS)
    }

    /// Sequence number `n` steps ahead
    pub const fn advance(self, n: usize) -> Self {
        Seq(((self.0 as usize + n) % SEQ_MODULUS as usize) as u8)
    }
}

impl TryFrom<u8> for Seq {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < SEQ_MODULUS {
            Ok(Seq(value))
        } else {
            Err(crate::WireError::Seq(value))
        }
    }
}

impl From<Seq> for u8 {
    fn from(seq: Seq) -> u8 {
        seq.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
