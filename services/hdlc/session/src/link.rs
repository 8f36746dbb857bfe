//! Frame-level view of a transport.

use crate::error::LinkError;
use crate::transport::Transport;
use bytes::BytesMut;
use hdlc_wire::{DecodedFrame, Frame, FrameDecoder};
use tracing::{debug, trace, warn};

/// Initial read buffer capacity; the buffer grows on demand up to one frame
const INITIAL_READ_CAPACITY: usize = 4 * 1024;

/// Traffic counters for one link endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames written
    pub frames_out: u64,
    /// Bytes written
    pub bytes_out: u64,
    /// Frames decoded, corrupted ones included
    pub frames_in: u64,
    /// Bytes read
    pub bytes_in: u64,
    /// Byte spans discarded because they could not be parsed as a frame
    pub malformed: u64,
}

/// A transport plus the framing state needed to read whole frames from it
pub struct Link<T> {
    transport: T,
    decoder: FrameDecoder,
    read_buf: BytesMut,
    stats: LinkStats,
}

impl<T: Transport> Link<T> {
    /// Wrap `transport`, accepting frames with up to `max_chunk_size`
    /// payload bytes
    pub fn new(transport: T, max_chunk_size: usize) -> Self {
        let decoder = FrameDecoder::new(max_chunk_size);
        Self {
            read_buf: BytesMut::with_capacity(decoder.max_frame_size().min(INITIAL_READ_CAPACITY)),
            transport,
            decoder,
            stats: LinkStats::default(),
        }
    }

    /// Encode and write one frame
    pub async fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let bytes = frame.encode();
        self.transport.send(&bytes).await?;
        self.stats.frames_out += 1;
        self.stats.bytes_out += bytes.len() as u64;
        debug!("sent {}", frame);
        Ok(())
    }

    /// Next frame from the peer, `None` once the stream has ended.
    ///
    /// Frames failing the CRC check are returned (see
    /// [`DecodedFrame::is_intact`]); byte spans that do not parse at all are
    /// logged, counted and skipped. Cancel safe.
    pub async fn recv(&mut self) -> Result<Option<DecodedFrame>, LinkError> {
        loop {
            match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(frame)) => {
                    self.stats.frames_in += 1;
                    if frame.is_intact() {
                        debug!("received {}", frame.frame);
                    } else {
                        debug!(
                            "received corrupted {} (carried crc {:#06x})",
                            frame.frame, frame.received_crc
                        );
                    }
                    return Ok(Some(frame));
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!("discarding malformed frame: {}", e);
                    continue;
                }
            }

            match self.transport.recv().await? {
                Some(bytes) => {
                    self.stats.bytes_in += bytes.len() as u64;
                    self.read_buf.extend_from_slice(&bytes);
                }
                None => {
                    if self.read_buf.len() > 1 {
                        trace!("{} unframed bytes left at end of stream", self.read_buf.len());
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Close the sending direction of the transport
    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.transport.close().await?;
        debug!("link closed");
        Ok(())
    }

    /// Counters so far
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably. Bytes written here bypass the encoder.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Unwrap the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}
