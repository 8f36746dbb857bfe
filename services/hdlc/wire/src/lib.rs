//! Framing layer for the HDLC-style link.
//!
//! This crate owns everything that happens to a frame between its logical
//! form and the bytes on the wire: CRC-CCITT, bit stuffing, flag delimiting,
//! and cutting frames back out of a byte stream that has no respect for frame
//! boundaries.
//!
//! ## Wire Format
//!
//! ```text
//! +------+------+-----+------------------+--------+--------+------+
//! | 0x7E | type | seq | stuffed payload  | crc hi | crc lo | 0x7E |
//! +------+------+-----+------------------+--------+--------+------+
//! ```
//!
//! The CRC covers `type || seq || payload` before stuffing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;
pub mod seq;
pub mod stuffing;

// Re-export main types
pub use chunk::{reassemble, Chunker};
pub use codec::FrameDecoder;
pub use crc::{crc_ccitt, Crc16, CRC_CCITT_INIT, CRC_CCITT_POLY};
pub use error::WireError;
pub use frame::{
    max_frame_size, DecodedFrame, Frame, FrameType, DEFAULT_MAX_CHUNK_SIZE, FLAG, MIN_FRAME_SIZE,
};
pub use seq::{Seq, SEQ_BITS, SEQ_MODULUS};
pub use stuffing::{destuff, max_stuffed_len, stuff, MAX_ONES_RUN};
