//! Stream framing: cutting frames out of an arbitrary byte stream.
//!
//! Transport reads are not frame aligned. [`FrameDecoder`] works on a caller
//! owned `BytesMut` that accumulates reads, and each call either yields one
//! frame, reports that more bytes are needed, or discards a malformed span.
//!
//! The stuffed payload can never contain the flag byte, but the two CRC bytes
//! are sent verbatim and may equal `0x7E`. The closing flag is therefore one
//! of the first three flag positions after the sequence byte, and the decoder
//! picks the one whose CRC verifies.

use crate::frame::{max_frame_size, DecodedFrame, Frame, DEFAULT_MAX_CHUNK_SIZE, FLAG, MIN_FRAME_SIZE};
use bytes::{Buf, BytesMut};
use tracing::trace;

/// Index of the closing flag of the smallest frame
const MIN_CLOSE: usize = MIN_FRAME_SIZE - 1;

/// Offset of the first byte that may hold a flag inside a frame
const BODY_START: usize = 2;

/// Incremental frame decoder
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Decoder for frames carrying up to `max_chunk_size` payload bytes
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size(max_chunk_size),
        }
    }

    /// Largest frame this decoder will buffer
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Try to cut one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. An `Err` means a span of
    /// bytes was consumed and discarded; the caller should call again since
    /// more frames may already be buffered. The closing flag of a frame is
    /// left in the buffer so it can double as the next opening flag.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<DecodedFrame>, crate::WireError> {
        // Resynchronise on an opening flag
        match buf.iter().position(|&b| b == FLAG) {
            None => {
                if !buf.is_empty() {
                    trace!("discarding {} bytes outside any frame", buf.len());
                    buf.clear();
                }
                return Ok(None);
            }
            Some(0) => {}
            Some(skip) => {
                trace!("discarding {} bytes before opening flag", skip);
                buf.advance(skip);
            }
        }

        // Collapse idle and shared flags down to a single opening flag
        let flags = buf.iter().take_while(|&&b| b == FLAG).count();
        buf.advance(flags - 1);
        if buf.len() == 1 {
            return Ok(None);
        }

        let first = match buf[BODY_START.min(buf.len())..]
            .iter()
            .position(|&b| b == FLAG)
        {
            Some(pos) => pos + BODY_START,
            None => {
                if buf.len() > self.max_frame_size {
                    let len = buf.len();
                    buf.clear();
                    return Err(crate::WireError::Overrun(len));
                }
                return Ok(None);
            }
        };

        if first >= self.max_frame_size {
            buf.advance(first);
            return Err(crate::WireError::Overrun(first));
        }

        // The closing flag is at `first`, or two bytes later when one or both
        // CRC bytes happen to be 0x7E
        let mut fallback = None;
        for close in first..=first + 2 {
            if close >= buf.len() {
                break;
            }
            if close < MIN_CLOSE || buf[close] != FLAG {
                continue;
            }
            if let Ok(decoded) = Frame::decode(&buf[..=close]) {
                if decoded.is_intact() {
                    buf.advance(close);
                    return Ok(Some(decoded));
                }
            }
            fallback.get_or_insert(close);
        }

        let resolved = first + 2 < buf.len();
        match fallback {
            // Nothing verifies. Report the shortest candidate so the receiver
            // can reject it, once no later candidate can still arrive or the
            // read ended on a flag.
            Some(close) if resolved || buf.len() - 1 == close => {
                let result = Frame::decode(&buf[..=close]);
                buf.advance(close);
                result.map(Some)
            }
            // A flag this close to the header cannot close a frame
            None if resolved => {
                buf.advance(first);
                Err(crate::WireError::TooShort(first + 1))
            }
            _ => Ok(None),
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}
