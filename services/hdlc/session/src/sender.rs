//! Stop-and-wait sender.
//!
//! One information frame is outstanding at a time. It is retransmitted when
//! the peer rejects it or when no matching acknowledgment arrives before the
//! deadline, up to `max_retries` times.

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::link::{Link, LinkStats};
use crate::transport::Transport;
use bytes::Bytes;
use hdlc_wire::{Chunker, Frame, FrameType, Seq};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Sender lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Ready for the next chunk
    Idle,
    /// An information frame is outstanding
    AwaitingAck,
    /// End sent or the session failed
    Done,
}

/// Summary of a completed send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Chunks delivered and acknowledged
    pub chunks: u64,
    /// Payload bytes delivered and acknowledged
    pub bytes: u64,
    /// Information frames written, retransmissions included
    pub frames_sent: u64,
    /// Retransmissions, whatever their cause
    pub retransmissions: u64,
    /// Rejects received
    pub rejects: u64,
    /// Deadlines that elapsed without an acknowledgment
    pub timeouts: u64,
    /// Sequence number carried by the End frame
    pub final_seq: Seq,
    /// Link counters
    pub link: LinkStats,
}

/// Why the outstanding frame goes out again
#[derive(Debug, Clone, Copy)]
enum Retransmit {
    Rejected,
    TimedOut,
}

/// Sending side of a link
pub struct Sender<T> {
    link: Link<T>,
    config: LinkConfig,
    state: SenderState,
    next_seq: Seq,
    report: SendReport,
}

impl<T: Transport> Sender<T> {
    /// Create a sender over `transport`
    pub fn new(transport: T, config: LinkConfig) -> Result<Self, LinkError> {
        config.validate()?;
        Ok(Self {
            link: Link::new(transport, config.max_chunk_size),
            config,
            state: SenderState::Idle,
            next_seq: Seq::ZERO,
            report: SendReport::default(),
        })
    }

    /// Current state
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Sequence number the next chunk will carry
    pub fn next_seq(&self) -> Seq {
        self.next_seq
    }

    /// Counters so far
    pub fn report(&self) -> SendReport {
        SendReport {
            link: self.link.stats(),
            ..self.report.clone()
        }
    }

    /// Split `payload` into chunks, deliver them all, then end the transfer
    pub async fn send_payload(self, payload: Bytes) -> Result<SendReport, LinkError> {
        let chunks = Chunker::new(self.config.max_chunk_size).chunk(payload);
        self.send_all(chunks).await
    }

    /// Deliver every chunk in order, then end the transfer
    pub async fn send_all(
        mut self,
        chunks: impl IntoIterator<Item = Bytes>,
    ) -> Result<SendReport, LinkError> {
        for chunk in chunks {
            self.send_chunk(chunk).await?;
        }
        self.finish().await
    }

    /// Deliver one chunk and wait until it is acknowledged
    pub async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), LinkError> {
        if self.state != SenderState::Idle {
            return Err(LinkError::Closed);
        }
        if chunk.len() > self.config.max_chunk_size {
            return Err(LinkError::Oversize {
                len: chunk.len(),
                max: self.config.max_chunk_size,
            });
        }

        let seq = self.next_seq;
        let len = chunk.len() as u64;
        let frame = Frame::info(seq, chunk);

        self.state = SenderState::AwaitingAck;
        if let Err(e) = self.link.send(&frame).await {
            return Err(self.abort(e).await);
        }
        self.report.frames_sent += 1;

        if let Err(e) = self.await_ack(&frame).await {
            return Err(self.abort(e).await);
        }

        self.next_seq = seq.next();
        self.report.chunks += 1;
        self.report.bytes += len;
        self.state = SenderState::Idle;
        Ok(())
    }

    /// Send End carrying the next sequence number and close the transport
    pub async fn finish(mut self) -> Result<SendReport, LinkError> {
        if self.state != SenderState::Idle {
            return Err(LinkError::Closed);
        }

        let end = Frame::end(self.next_seq);
        if let Err(e) = self.link.send(&end).await {
            return Err(self.abort(e).await);
        }
        self.link.close().await?;
        self.state = SenderState::Done;
        self.report.final_seq = self.next_seq;

        let report = self.report();
        info!(
            "transfer complete: {} chunks, {} bytes, {} retransmissions",
            report.chunks, report.bytes, report.retransmissions
        );
        Ok(report)
    }

    async fn await_ack(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let seq = frame.seq();
        let mut retransmissions = 0u32;
        let mut deadline = Instant::now() + self.config.ack_timeout;

        loop {
            let reply = match timeout_at(deadline, self.link.recv()).await {
                Ok(reply) => reply?,
                Err(_) => {
                    self.report.timeouts += 1;
                    self.retransmit(frame, &mut retransmissions, Retransmit::TimedOut)
                        .await?;
                    deadline = Instant::now() + self.config.ack_timeout;
                    continue;
                }
            };

            let reply = reply.ok_or(LinkError::Closed)?;
            if !reply.is_intact() {
                debug!("ignoring corrupted {} while awaiting ACK {}", reply.frame, seq);
                continue;
            }

            match reply.typ() {
                FrameType::Ack if reply.seq() == seq => {
                    debug!("ACK {} received", seq);
                    return Ok(());
                }
                FrameType::Ack => {
                    debug!("ignoring stale ACK {} while awaiting ACK {}", reply.seq(), seq);
                }
                FrameType::Reject => {
                    self.report.rejects += 1;
                    self.retransmit(frame, &mut retransmissions, Retransmit::Rejected)
                        .await?;
                    deadline = Instant::now() + self.config.ack_timeout;
                }
                other => {
                    debug!("ignoring {} while awaiting ACK {}", other, seq);
                }
            }
        }
    }

    async fn retransmit(
        &mut self,
        frame: &Frame,
        retransmissions: &mut u32,
        cause: Retransmit,
    ) -> Result<(), LinkError> {
        if *retransmissions >= self.config.max_retries {
            return Err(LinkError::LinkFailure {
                seq: frame.seq(),
                attempts: *retransmissions + 1,
            });
        }

        *retransmissions += 1;
        match cause {
            Retransmit::Rejected => warn!("REJ for frame {}, retransmitting", frame.seq()),
            Retransmit::TimedOut => warn!(
                "no ACK for frame {} within {:?}, retransmitting",
                frame.seq(),
                self.config.ack_timeout
            ),
        }

        self.link.send(frame).await?;
        self.report.frames_sent += 1;
        self.report.retransmissions += 1;
        Ok(())
    }

    /// Release the transport after a fatal error
    async fn abort(&mut self, err: LinkError) -> LinkError {
        self.state = SenderState::Done;
        error!("send aborted: {}", err);
        if let Err(e) = self.link.close().await {
            debug!("close after failure: {}", e);
        }
        err
    }
}
