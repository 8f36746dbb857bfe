//! Stop-and-wait ARQ over a byte stream.
//!
//! This crate turns a byte-stream transport into a reliable, in-order chunk
//! pipe using the frames defined in `hdlc-wire`.
//!
//! ## Features
//!
//! - **Transports**: a small async [`Transport`] trait with TCP and
//!   in-memory adapters
//! - **Link**: frame reassembly across arbitrary read boundaries
//! - **Sender**: one outstanding frame, retransmitted on REJ or timeout
//!   with a bounded retry budget
//! - **Receiver**: ACK/REJ replies, duplicate detection, in-order reassembly
//! - **Fault injection**: a transport decorator that drops or corrupts
//!   frames from a seeded generator
//!
//! ## Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use hdlc_session::{connect_tcp, LinkConfig, Sender};
//!
//! # async fn example() -> Result<(), hdlc_session::LinkError> {
//! let addr = "127.0.0.1:9000".parse().unwrap();
//! let transport = connect_tcp(addr).await?;
//!
//! let sender = Sender::new(transport, LinkConfig::default())?;
//! let report = sender.send_payload(Bytes::from_static(b"hello")).await?;
//! println!("sent {} chunks", report.chunks);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fault;
pub mod link;
pub mod receiver;
pub mod sender;
pub mod transport;

// Re-export main types
pub use config::{LinkConfig, DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES, MAX_CHUNK_SIZE_LIMIT};
pub use error::LinkError;
pub use fault::{Fault, FaultConfig, FaultStats, FaultyTransport};
pub use link::{Link, LinkStats};
pub use receiver::{Receiver, ReceiverState, RecvState, Transfer, Verdict};
pub use sender::{SendReport, Sender, SenderState};
pub use transport::{accept_tcp, connect_tcp, listen_tcp, StreamTransport, Transport};
