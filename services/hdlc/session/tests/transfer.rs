//! End-to-end transfers between a sender and a receiver.

use async_trait::async_trait;
use bytes::Bytes;
use hdlc_session::{
    accept_tcp, connect_tcp, listen_tcp, Fault, FaultConfig, FaultyTransport, LinkConfig,
    LinkError, Receiver, Sender, StreamTransport, Transport,
};
use hdlc_wire::{Chunker, Frame, FrameType, Seq};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::time::Instant;

/// Records every frame written through it
struct Tap<T> {
    inner: T,
    sent: Arc<Mutex<Vec<Bytes>>>,
}

impl<T> Tap<T> {
    fn new(inner: T) -> (Self, Arc<Mutex<Vec<Bytes>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                sent: sent.clone(),
            },
            sent,
        )
    }
}

#[async_trait]
impl<T: Transport> Transport for Tap<T> {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().push(Bytes::copy_from_slice(bytes));
        self.inner.send(bytes).await
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        self.inner.recv().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }
}

fn duplex_pair() -> (StreamTransport<DuplexStream>, StreamTransport<DuplexStream>) {
    let (a, b) = tokio::io::duplex(16 * 1024);
    (StreamTransport::new(a), StreamTransport::new(b))
}

fn summary(sent: &Arc<Mutex<Vec<Bytes>>>) -> Vec<(FrameType, u8)> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|bytes| {
            let decoded = Frame::decode(bytes).unwrap();
            assert!(decoded.is_intact());
            (decoded.typ(), decoded.seq().value())
        })
        .collect()
}

#[tokio::test]
async fn test_two_chunk_exchange() {
    let (a, b) = duplex_pair();
    let (a, sender_log) = Tap::new(a);
    let (b, receiver_log) = Tap::new(b);

    let sender = Sender::new(a, LinkConfig::default()).unwrap();
    let receiver = Receiver::new(b, LinkConfig::default()).unwrap();

    let chunks = [Bytes::from_static(b"AB"), Bytes::from_static(b"CD")];
    let (report, transfer) = tokio::join!(sender.send_all(chunks), receiver.run());
    let report = report.unwrap();
    let transfer = transfer.unwrap();

    assert_eq!(
        summary(&sender_log),
        vec![(FrameType::Info, 0), (FrameType::Info, 1), (FrameType::End, 2)]
    );
    assert_eq!(summary(&receiver_log), vec![(FrameType::Ack, 0), (FrameType::Ack, 1)]);

    assert_eq!(transfer.data, Bytes::from_static(b"ABCD"));
    assert_eq!(transfer.expected_seq, Seq::wrapping(2));
    assert!(transfer.ended);
    assert_eq!(report.final_seq, Seq::wrapping(2));
    assert_eq!(report.retransmissions, 0);
}

#[tokio::test]
async fn test_sequence_wraps_after_eight_chunks() {
    let (a, b) = duplex_pair();
    let (a, sender_log) = Tap::new(a);

    let payload = Bytes::from_static(b"c0c1c2c3c4c5c6c7c8");
    let config = LinkConfig {
        max_chunk_size: 2,
        ..Default::default()
    };
    let sender = Sender::new(a, config.clone()).unwrap();
    let receiver = Receiver::new(b, config).unwrap();

    let (report, transfer) = tokio::join!(sender.send_payload(payload.clone()), receiver.run());
    let report = report.unwrap();
    let transfer = transfer.unwrap();

    let seqs: Vec<u8> = summary(&sender_log).into_iter().map(|(_, seq)| seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1]);
    assert_eq!(report.chunks, 9);
    assert_eq!(transfer.chunks.len(), 9);
    assert_eq!(transfer.expected_seq, Seq::wrapping(1));
    assert_eq!(transfer.data, payload);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_frame_is_recovered_by_timeout() {
    let (a, b) = duplex_pair();
    let a = FaultyTransport::scripted(a, [Fault::Deliver, Fault::Drop]);

    let sender = Sender::new(a, LinkConfig::default()).unwrap();
    let receiver = Receiver::new(b, LinkConfig::default()).unwrap();

    let chunks = [
        Bytes::from_static(b"one"),
        Bytes::from_static(b"two"),
        Bytes::from_static(b"three"),
    ];
    let start = Instant::now();
    let (report, transfer) = tokio::join!(sender.send_all(chunks), receiver.run());
    let report = report.unwrap();
    let transfer = transfer.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(3000));
    assert_eq!(report.timeouts, 1);
    assert_eq!(report.retransmissions, 1);
    assert_eq!(transfer.data, Bytes::from_static(b"onetwothree"));
    assert_eq!(transfer.expected_seq, Seq::wrapping(3));
    assert_eq!(transfer.rejects, 0);
}

#[tokio::test]
async fn test_bit_error_is_rejected_and_resent() {
    let (a, b) = duplex_pair();
    // Second bit of the first payload byte
    let a = FaultyTransport::scripted(a, [Fault::FlipBitAt(25)]);

    let sender = Sender::new(a, LinkConfig::default()).unwrap();
    let receiver = Receiver::new(b, LinkConfig::default()).unwrap();

    let chunks = [Bytes::from_static(b"AB"), Bytes::from_static(b"CD")];
    let (report, transfer) = tokio::join!(sender.send_all(chunks), receiver.run());
    let report = report.unwrap();
    let transfer = transfer.unwrap();

    assert_eq!(report.rejects, 1);
    assert_eq!(report.timeouts, 0);
    assert_eq!(transfer.rejects, 1);
    assert_eq!(transfer.data, Bytes::from_static(b"ABCD"));
}

#[tokio::test(start_paused = true)]
async fn test_lost_ack_is_not_delivered_twice() {
    let (a, b) = duplex_pair();
    let b = FaultyTransport::scripted(b, [Fault::Drop]);

    let sender = Sender::new(a, LinkConfig::default()).unwrap();
    let receiver = Receiver::new(b, LinkConfig::default()).unwrap();

    let chunks = [Bytes::from_static(b"AB"), Bytes::from_static(b"CD")];
    let (report, transfer) = tokio::join!(sender.send_all(chunks), receiver.run());
    let report = report.unwrap();
    let transfer = transfer.unwrap();

    assert_eq!(report.timeouts, 1);
    assert_eq!(transfer.duplicates, 1);
    assert_eq!(transfer.data, Bytes::from_static(b"ABCD"));
    assert_eq!(transfer.expected_seq, Seq::wrapping(2));
}

#[tokio::test(start_paused = true)]
async fn test_noisy_channel_both_directions() {
    for seed in [1u64, 2, 3] {
        let mut rng = StdRng::seed_from_u64(seed);
        let payload: Vec<u8> = (0..4096).map(|_| rng.gen()).collect();
        let payload = Bytes::from(payload);

        let faults = |seed| FaultConfig {
            loss_rate: 0.05,
            bit_error_rate: 0.05,
            seed,
        };
        let (a, b) = duplex_pair();
        let a = FaultyTransport::new(a, &faults(seed));
        let b = FaultyTransport::new(b, &faults(seed + 100));

        let config = LinkConfig {
            max_chunk_size: 64,
            ..Default::default()
        };
        let sender = Sender::new(a, config.clone()).unwrap();
        let receiver = Receiver::new(b, config).unwrap();

        let (report, transfer) = tokio::join!(sender.send_payload(payload.clone()), receiver.run());
        let report = report.unwrap();
        let transfer = transfer.unwrap();

        assert_eq!(report.chunks, 64);
        assert_eq!(transfer.data, payload, "seed {seed}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_dead_channel_fails_after_retry_budget() {
    let (a, b) = duplex_pair();
    let a = FaultyTransport::new(
        a,
        &FaultConfig {
            loss_rate: 1.0,
            ..Default::default()
        },
    );

    let config = LinkConfig {
        max_retries: 4,
        ..Default::default()
    };
    let sender = Sender::new(a, config.clone()).unwrap();
    let receiver = Receiver::new(b, config).unwrap();

    let (report, transfer) = tokio::join!(
        sender.send_payload(Bytes::from_static(b"never arrives")),
        receiver.run()
    );

    match report {
        Err(LinkError::LinkFailure { seq, attempts }) => {
            assert_eq!(seq, Seq::ZERO);
            assert_eq!(attempts, 5);
        }
        other => panic!("expected link failure, got {other:?}"),
    }
    let transfer = transfer.unwrap();
    assert!(!transfer.ended);
    assert!(transfer.data.is_empty());
}

#[tokio::test]
async fn test_transfer_over_tcp() {
    let listener = listen_tcp("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    let payload: Vec<u8> = (0..10_000).map(|_| rng.gen()).collect();
    let payload = Bytes::from(payload);

    let config = LinkConfig {
        max_chunk_size: 100,
        ..Default::default()
    };

    let receiver_config = config.clone();
    let receiver_task = tokio::spawn(async move {
        let (transport, _peer) = accept_tcp(&listener).await.unwrap();
        Receiver::new(transport, receiver_config).unwrap().run().await
    });

    let transport = connect_tcp(addr).await.unwrap();
    let report = Sender::new(transport, config)
        .unwrap()
        .send_payload(payload.clone())
        .await
        .unwrap();
    let transfer = receiver_task.await.unwrap().unwrap();

    assert_eq!(report.chunks, 100);
    assert_eq!(transfer.data, payload);
    assert_eq!(transfer.expected_seq, Seq::wrapping(4));
}

#[test]
fn test_line_chunks_survive_transfer() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let (a, b) = duplex_pair();
        let text = Bytes::from_static(b"alpha\nbeta\n\ngamma\n");
        let chunks = Chunker::new(3).chunk_lines(text);

        let sender = Sender::new(a, LinkConfig::default()).unwrap();
        let receiver = Receiver::new(b, LinkConfig::default()).unwrap();
        let (report, transfer) = tokio::join!(sender.send_all(chunks), receiver.run());

        assert_eq!(report.unwrap().chunks, 6);
        assert_eq!(transfer.unwrap().data, Bytes::from_static(b"alphabetagamma"));
    });
}
