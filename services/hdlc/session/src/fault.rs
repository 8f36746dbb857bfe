//! Fault injection for exercising the ARQ machinery.
//!
//! [`FaultyTransport`] wraps another transport and tampers with outbound
//! writes: it can lose a write entirely or flip a single bit in it. Every
//! write issued by [`crate::Link`] carries exactly one frame, so faults apply
//! per frame. Inbound bytes pass through untouched; wrap the other endpoint
//! to disturb the reverse direction.

use crate::error::LinkError;
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io;
use tracing::debug;

/// What happens to one outbound write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Pass the bytes through unchanged
    Deliver,
    /// Discard the bytes
    Drop,
    /// Flip one randomly chosen bit strictly between the first and last byte
    FlipBit,
    /// Flip the given bit, counted MSB first from the start of the write
    FlipBitAt(usize),
}

/// Random fault model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Probability that a write is lost
    pub loss_rate: f64,
    /// Probability that a delivered write has one bit flipped
    pub bit_error_rate: f64,
    /// Seed for the default generator
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            bit_error_rate: 0.0,
            seed: 0,
        }
    }
}

impl FaultConfig {
    /// Check that both rates are probabilities
    pub fn validate(&self) -> Result<(), LinkError> {
        for (name, rate) in [
            ("loss_rate", self.loss_rate),
            ("bit_error_rate", self.bit_error_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(LinkError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}

/// Clamp into `0.0..=1.0`; NaN counts as zero
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Counters for applied faults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Writes passed through unchanged
    pub delivered: u64,
    /// Writes discarded
    pub dropped: u64,
    /// Writes delivered with a flipped bit
    pub corrupted: u64,
}

/// Transport decorator that drops or corrupts outbound writes.
///
/// Scripted faults take precedence; once the script runs out, faults are
/// drawn from `R` according to the [`FaultConfig`] rates.
pub struct FaultyTransport<T, R = StdRng> {
    inner: T,
    rng: R,
    loss_rate: f64,
    bit_error_rate: f64,
    script: VecDeque<Fault>,
    stats: FaultStats,
}

impl<T: Transport> FaultyTransport<T, StdRng> {
    /// Random faults from a generator seeded with `config.seed`
    pub fn new(inner: T, config: &FaultConfig) -> Self {
        Self::with_rng(inner, config, StdRng::seed_from_u64(config.seed))
    }

    /// Only the scripted faults, then clean delivery
    pub fn scripted(inner: T, script: impl IntoIterator<Item = Fault>) -> Self {
        Self::new(inner, &FaultConfig::default()).with_script(script)
    }
}

impl<T: Transport, R: RngCore + Send> FaultyTransport<T, R> {
    /// Random faults from a caller supplied generator
    pub fn with_rng(inner: T, config: &FaultConfig, rng: R) -> Self {
        Self {
            inner,
            rng,
            loss_rate: probability(config.loss_rate),
            bit_error_rate: probability(config.bit_error_rate),
            script: VecDeque::new(),
            stats: FaultStats::default(),
        }
    }

    /// Queue faults for the next writes, in order
    pub fn with_script(mut self, script: impl IntoIterator<Item = Fault>) -> Self {
        self.script.extend(script);
        self
    }

    /// Faults applied so far
    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    /// Wrapped transport
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap the transport
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn next_fault(&mut self) -> Fault {
        if let Some(fault) = self.script.pop_front() {
            return fault;
        }
        if self.rng.gen_bool(self.loss_rate) {
            Fault::Drop
        } else if self.rng.gen_bool(self.bit_error_rate) {
            Fault::FlipBit
        } else {
            Fault::Deliver
        }
    }
}

#[async_trait]
impl<T: Transport, R: RngCore + Send> Transport for FaultyTransport<T, R> {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let bit = match self.next_fault() {
            Fault::Deliver => None,
            Fault::Drop => {
                self.stats.dropped += 1;
                debug!("fault: dropped {} byte write", bytes.len());
                return Ok(());
            }
            // The flags stay intact so the damage lands inside a frame
            Fault::FlipBit if bytes.len() > 2 => Some(self.rng.gen_range(8..(bytes.len() - 1) * 8)),
            Fault::FlipBit => None,
            Fault::FlipBitAt(bit) if bit < bytes.len() * 8 => Some(bit),
            Fault::FlipBitAt(_) => None,
        };

        match bit {
            Some(bit) => {
                let mut corrupted = bytes.to_vec();
                corrupted[bit / 8] ^= 0x80 >> (bit % 8);
                self.stats.corrupted += 1;
                debug!("fault: flipped bit {} of {} byte write", bit, bytes.len());
                self.inner.send(&corrupted).await
            }
            None => {
                self.stats.delivered += 1;
                self.inner.send(bytes).await
            }
        }
    }

    async fn recv(&mut self) -> io::Result<Option<Bytes>> {
        self.inner.recv().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every write
    #[derive(Default)]
    struct Capture {
        writes: Vec<Vec<u8>>,
    }

    #[async_trait]
    impl Transport for Capture {
        async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.writes.push(bytes.to_vec());
            Ok(())
        }

        async fn recv(&mut self) -> io::Result<Option<Bytes>> {
            Ok(None)
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn differing_bits(a: &[u8], b: &[u8]) -> Vec<usize> {
        let mut bits = Vec::new();
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            for bit in 0..8 {
                if (x ^ y) & (0x80 >> bit) != 0 {
                    bits.push(i * 8 + bit);
                }
            }
        }
        bits
    }

    const FRAME: &[u8] = &[0x7E, b'I', 0x00, b'A', b'B', 0xCB, 0x90, 0x7E];

    #[tokio::test]
    async fn test_scripted_faults_apply_in_order() {
        let mut faulty = FaultyTransport::scripted(
            Capture::default(),
            [Fault::Drop, Fault::FlipBitAt(25), Fault::Deliver],
        );
        for _ in 0..4 {
            faulty.send(FRAME).await.unwrap();
        }

        let stats = faulty.stats();
        assert_eq!(stats, FaultStats { delivered: 2, dropped: 1, corrupted: 1 });

        let writes = faulty.into_inner().writes;
        assert_eq!(writes.len(), 3);
        // Byte 3 ('A' = 0x41) with its second bit flipped
        assert_eq!(writes[0][3], 0x01);
        assert_eq!(differing_bits(&writes[0], FRAME), vec![25]);
        assert_eq!(writes[1], FRAME);
        assert_eq!(writes[2], FRAME);
    }

    #[tokio::test]
    async fn test_random_flip_spares_the_flags() {
        let config = FaultConfig {
            bit_error_rate: 1.0,
            seed: 7,
            ..Default::default()
        };
        let mut faulty = FaultyTransport::new(Capture::default(), &config);
        for _ in 0..200 {
            faulty.send(FRAME).await.unwrap();
        }

        for write in faulty.into_inner().writes {
            let flipped = differing_bits(&write, FRAME);
            assert_eq!(flipped.len(), 1);
            assert!(flipped[0] >= 8 && flipped[0] < (FRAME.len() - 1) * 8);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_faults() {
        let config = FaultConfig {
            loss_rate: 0.3,
            bit_error_rate: 0.3,
            seed: 1234,
        };
        let mut a = FaultyTransport::new(Capture::default(), &config);
        let mut b = FaultyTransport::new(Capture::default(), &config);
        for _ in 0..100 {
            a.send(FRAME).await.unwrap();
            b.send(FRAME).await.unwrap();
        }

        assert_eq!(a.stats(), b.stats());
        assert!(a.stats().dropped > 0);
        assert!(a.stats().corrupted > 0);
        assert_eq!(a.into_inner().writes, b.into_inner().writes);
    }

    #[tokio::test]
    async fn test_zero_rates_are_transparent() {
        let mut faulty = FaultyTransport::new(Capture::default(), &FaultConfig::default());
        for _ in 0..50 {
            faulty.send(FRAME).await.unwrap();
        }
        assert_eq!(faulty.stats().delivered, 50);
    }

    #[test]
    fn test_validate_rates() {
        assert!(FaultConfig::default().validate().is_ok());
        let config = FaultConfig {
            loss_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));
        let config = FaultConfig {
            bit_error_rate: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(probability(f64::NAN), 0.0);
        assert_eq!(probability(-0.5), 0.0);
    }

    #[tokio::test]
    async fn test_out_of_range_flip_delivers_unchanged() {
        let mut faulty = FaultyTransport::scripted(Capture::default(), [Fault::FlipBitAt(1000)]);
        faulty.send(FRAME).await.unwrap();
        assert_eq!(faulty.into_inner().writes, vec![FRAME.to_vec()]);
    }
}
