//! Frame model and the byte-level encode/decode transforms.
//!
//! ```text
//! +------+------+-----+------------------+--------+--------+------+
//! | 0x7E | type | seq | stuffed payload  | crc hi | crc lo | 0x7E |
//! +------+------+-----+------------------+--------+--------+------+
//! ```
//!
//! Only the payload is bit-stuffed. The type, sequence and CRC bytes are
//! written verbatim. The CRC covers `type || seq || payload` before stuffing.

use crate::crc::Crc16;
use crate::seq::Seq;
use crate::stuffing::{destuff, max_stuffed_len, stuff};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame delimiter (`01111110`)
pub const FLAG: u8 = 0x7E;

/// Flag + type + seq + two CRC bytes + flag
pub const MIN_FRAME_SIZE: usize = 6;

/// Default maximum payload bytes per frame, before stuffing
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 250;

/// Largest encoded frame for a payload of `max_chunk_size` bytes, saturating
/// at `usize::MAX`
pub const fn max_frame_size(max_chunk_size: usize) -> usize {
    MIN_FRAME_SIZE.saturating_add(max_stuffed_len(max_chunk_size))
}

/// Frame types and their single-byte wire codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Information frame carrying payload
    Info = b'I',
    /// Connection request
    ConnectRequest = b'C',
    /// Positive acknowledgment
    Ack = b'A',
    /// Rejection, asks for retransmission
    Reject = b'R',
    /// End of transfer
    End = b'F',
    /// Poll
    Poll = b'P',
}

impl FrameType {
    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'I' => Ok(FrameType::Info),
            b'C' => Ok(FrameType::ConnectRequest),
            b'A' => Ok(FrameType::Ack),
            b'R' => Ok(FrameType::Reject),
            b'F' => Ok(FrameType::End),
            b'P' => Ok(FrameType::Poll),
            _ => Err(crate::WireError::Type(value)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameType::Info => "INFO",
            FrameType::ConnectRequest => "CONN",
            FrameType::Ack => "ACK",
            FrameType::Reject => "REJ",
            FrameType::End => "END",
            FrameType::Poll => "POLL",
        };
        f.write_str(name)
    }
}

/// One protocol message.
///
/// The CRC is derived from the other three fields when the frame is built and
/// can never be set on its own, so two frames with equal fields always carry
/// equal CRCs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    typ: FrameType,
    seq: Seq,
    payload: Bytes,
    crc: u16,
}

impl Frame {
    /// Build a frame and compute its CRC
    pub fn new(typ: FrameType, seq: Seq, payload: Bytes) -> Self {
        let crc = Self::compute_crc(typ, seq, &payload);
        Self {
            typ,
            seq,
            payload,
            crc,
        }
    }

    /// Information frame
    pub fn info(seq: Seq, payload: Bytes) -> Self {
        Self::new(FrameType::Info, seq, payload)
    }

    /// Acknowledgment for `seq`
    pub fn ack(seq: Seq) -> Self {
        Self::new(FrameType::Ack, seq, Bytes::new())
    }

    /// Rejection of `seq`
    pub fn reject(seq: Seq) -> Self {
        Self::new(FrameType::Reject, seq, Bytes::new())
    }

    /// End-of-transfer marker
    pub fn end(seq: Seq) -> Self {
        Self::new(FrameType::End, seq, Bytes::new())
    }

    /// CRC-CCITT over `type || seq || payload`
    pub fn compute_crc(typ: FrameType, seq: Seq, payload: &[u8]) -> u16 {
        let mut crc = Crc16::new();
        crc.update_byte(typ.code());
        crc.update_byte(seq.value());
        crc.update(payload);
        crc.finish()
    }

    /// Frame type
    pub fn typ(&self) -> FrameType {
        self.typ
    }

    /// Sequence number
    pub fn seq(&self) -> Seq {
        self.seq
    }

    /// Payload bytes, unstuffed
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Frame check sequence
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Take the payload out of the frame
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Bytes {
        let stuffed = stuff(&self.payload);
        let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + stuffed.len());

        buf.put_u8(FLAG);
        buf.put_u8(self.typ.code());
        buf.put_u8(self.seq.value());
        buf.put_slice(&stuffed);
        buf.put_u16(self.crc);
        buf.put_u8(FLAG);

        buf.freeze()
    }

    /// Decode one complete frame, flags included.
    ///
    /// Missing flags, truncation and unknown type codes are errors. Anything
    /// else that went wrong in transit, including a sequence byte outside the
    /// 3-bit space, is reported through [`DecodedFrame::is_intact`] instead,
    /// because the receiver still needs the frame's type and sequence number
    /// to answer it.
    pub fn decode(buf: &[u8]) -> Result<DecodedFrame, crate::WireError> {
        if buf.len() < MIN_FRAME_SIZE {
            return Err(crate::WireError::TooShort(buf.len()));
        }

        let last = buf.len() - 1;
        if buf[0] != FLAG || buf[last] != FLAG {
            return Err(crate::WireError::MissingFlag);
        }

        let typ = FrameType::try_from(buf[1])?;
        let raw_seq = buf[2];
        let payload = destuff(&buf[3..last - 2]);
        let received_crc = u16::from_be_bytes([buf[last - 2], buf[last - 1]]);

        Ok(DecodedFrame {
            frame: Frame::new(typ, Seq::wrapping(raw_seq), Bytes::from(payload)),
            received_crc,
            raw_seq,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(seq={}, len={}, crc={:#06x})",
            self.typ,
            self.seq,
            self.payload.len(),
            self.crc
        )
    }
}

/// A frame reconstructed from the wire together with the CRC it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Reconstructed frame; its CRC is recomputed from the received fields
    pub frame: Frame,
    /// CRC as transmitted
    pub received_crc: u16,
    raw_seq: u8,
}

impl DecodedFrame {
    /// Pair a frame with the CRC it arrived with
    pub fn new(frame: Frame, received_crc: u16) -> Self {
        Self {
            raw_seq: frame.seq.value(),
            frame,
            received_crc,
        }
    }

    /// `true` when the sequence byte was in range and the transmitted CRC
    /// matches the recomputed one
    pub fn is_intact(&self) -> bool {
        self.raw_seq == self.frame.seq.value() && self.frame.crc == self.received_crc
    }

    /// Sequence byte as received; only its low three bits reach [`Self::seq`]
    pub fn raw_seq(&self) -> u8 {
        self.raw_seq
    }

    /// Frame type
    pub fn typ(&self) -> FrameType {
        self.frame.typ
    }

    /// Sequence number
    pub fn seq(&self) -> Seq {
        self.frame.seq
    }
}
