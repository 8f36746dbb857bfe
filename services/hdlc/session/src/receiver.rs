//! Stop-and-wait receiver.
//!
//! Purely reactive: every frame that parses is answered, in order, and the
//! receiver never times out on its own. It stops on an End frame or when the
//! peer closes the stream.

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::link::{Link, LinkStats};
use crate::transport::Transport;
use bytes::Bytes;
use hdlc_wire::{reassemble, DecodedFrame, Frame, FrameType, Seq};
use tracing::{debug, info, warn};

/// Receiver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Accepting frames
    Listening,
    /// End received or the stream ended
    Closed,
}

/// How the receiver answers one decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// In-sequence information frame: deliver and acknowledge
    Accept,
    /// Repeat of the last accepted frame: acknowledge again, do not deliver
    Duplicate,
    /// Corrupted or out of sequence: reject with the received sequence number
    Reject,
    /// End of transfer
    End,
    /// Intact control frame with no meaning to a receiver
    Ignore,
}

/// Sequence tracking for the receiving side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvState {
    expected_seq: Seq,
    accepted_any: bool,
}

impl RecvState {
    /// Fresh state expecting sequence number zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the next in-order frame
    pub fn expected_seq(&self) -> Seq {
        self.expected_seq
    }

    /// Decide how to answer `frame`. Does not change the state.
    pub fn classify(&self, frame: &DecodedFrame) -> Verdict {
        // Honored on the type byte alone
        if frame.typ() == FrameType::End {
            return Verdict::End;
        }
        if !frame.is_intact() {
            return Verdict::Reject;
        }

        match frame.typ() {
            FrameType::Info if frame.seq() == self.expected_seq => Verdict::Accept,
            FrameType::Info if self.accepted_any && frame.seq() == self.expected_seq.prev() => {
                Verdict::Duplicate
            }
            FrameType::Info => Verdict::Reject,
            _ => Verdict::Ignore,
        }
    }

    /// Record an accepted frame
    pub fn advance(&mut self) {
        self.expected_seq = self.expected_seq.next();
        self.accepted_any = true;
    }
}

/// Everything a receiver collected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Accepted payload, in order
    pub data: Bytes,
    /// Accepted payload chunks, in order
    pub chunks: Vec<Bytes>,
    /// Sequence number expected next when the transfer stopped
    pub expected_seq: Seq,
    /// `true` when an End frame closed the transfer, `false` on a bare end
    /// of stream
    pub ended: bool,
    /// Rejects sent
    pub rejects: u64,
    /// Duplicates re-acknowledged
    pub duplicates: u64,
    /// Intact control frames ignored
    pub ignored: u64,
    /// Link counters
    pub link: LinkStats,
}

/// Receiving side of a link
pub struct Receiver<T> {
    link: Link<T>,
    state: ReceiverState,
    seq: RecvState,
    transfer: Transfer,
}

impl<T: Transport> Receiver<T> {
    /// Create a receiver over `transport`
    pub fn new(transport: T, config: LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;
        Ok(Self {
            link: Link::new(transport, config.max_chunk_size),
            state: ReceiverState::Listening,
            seq: RecvState::new(),
            transfer: Transfer::default(),
        })
    }

    /// Current state
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Sequence number of the next in-order frame
    pub fn expected_seq(&self) -> Seq {
        self.seq.expected_seq()
    }

    /// Answer frames until End or end of stream, then close the transport
    pub async fn run(mut self) -> Result<Transfer, LinkError> {
        while self.state == ReceiverState::Listening {
            self.step().await?;
        }

        self.link.close().await?;
        let mut transfer = self.transfer;
        transfer.data = reassemble(&transfer.chunks);
        transfer.expected_seq = self.seq.expected_seq();
        transfer.link = self.link.stats();

        info!(
            "transfer received: {} chunks, {} bytes, {} rejects, {} duplicates",
            transfer.chunks.len(),
            transfer.data.len(),
            transfer.rejects,
            transfer.duplicates
        );
        Ok(transfer)
    }

    /// Read and answer one frame.
    ///
    /// Returns the verdict, or `None` when the stream ended without an End
    /// frame.
    pub async fn step(&mut self) -> Result<Option<Verdict>, LinkError> {
        let Some(frame) = self.link.recv().await? else {
            warn!("stream ended without End frame");
            self.state = ReceiverState::Closed;
            return Ok(None);
        };

        let verdict = self.seq.classify(&frame);
        match verdict {
            Verdict::Accept => {
                let seq = frame.seq();
                self.transfer.chunks.push(frame.frame.into_payload());
                self.seq.advance();
                self.link.send(&Frame::ack(seq)).await?;
                debug!("accepted frame {}, ACK sent", seq);
            }
            Verdict::Duplicate => {
                self.transfer.duplicates += 1;
                self.link.send(&Frame::ack(frame.seq())).await?;
                debug!("duplicate frame {}, ACK repeated", frame.seq());
            }
            Verdict::Reject => {
                self.transfer.rejects += 1;
                self.link.send(&Frame::reject(frame.seq())).await?;
                if frame.is_intact() {
                    warn!(
                        "frame {} out of sequence (expected {}), REJ sent",
                        frame.seq(),
                        self.seq.expected_seq()
                    );
                } else {
                    warn!("frame {} failed CRC check, REJ sent", frame.seq());
                }
            }
            Verdict::End => {
                info!("End received (seq {})", frame.seq());
                self.transfer.ended = true;
                self.state = ReceiverState::Closed;
            }
            Verdict::Ignore => {
                self.transfer.ignored += 1;
                debug!("ignoring {}", frame.frame);
            }
        }
        Ok(Some(verdict))
    }
}
