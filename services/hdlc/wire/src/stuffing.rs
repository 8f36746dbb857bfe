//! Bit stuffing for flag transparency.
//!
//! The payload is scanned most-significant bit first. After five consecutive
//! `1` bits a `0` is inserted, so the stuffed stream never carries six ones in
//! a row and therefore never the flag pattern `01111110`. The stuffed bit
//! stream is zero-padded up to the next byte boundary.

/// Longest run of `1` bits allowed before a zero is inserted
pub const MAX_ONES_RUN: u32 = 5;

/// Upper bound on the stuffed size of a payload of `len` bytes.
///
/// Saturates at `usize::MAX` instead of overflowing.
pub const fn max_stuffed_len(len: usize) -> usize {
    let bits = len.saturating_mul(8);
    let stuffed = bits.saturating_add(bits / MAX_ONES_RUN as usize);
    stuffed / 8 + (stuffed % 8 != 0) as usize
}

/// MSB-first bit accumulator.
struct BitWriter {
    out: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            out: Vec::with_capacity(bytes),
            current: 0,
            filled: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.filled += 1;
        if self.filled == 8 {
            self.out.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    /// Zero-pad the partial byte and return the buffer
    fn finish_padded(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.out.push(self.current << (8 - self.filled));
        }
        self.out
    }

    /// Drop the partial byte and return the buffer
    fn finish_truncated(self) -> Vec<u8> {
        self.out
    }
}

#[inline]
fn bits_msb_first(data: &[u8]) -> impl Iterator<Item = bool> + '_ {
    data.iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1))
}

/// Insert a zero bit after every run of five ones.
pub fn stuff(payload: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(max_stuffed_len(payload.len()));
    let mut ones = 0;

    for bit in bits_msb_first(payload) {
        writer.push(bit);
        if bit {
            ones += 1;
            if ones == MAX_ONES_RUN {
                writer.push(false);
                ones = 0;
            }
        } else {
            ones = 0;
        }
    }

    writer.finish_padded()
}

/// Remove the zeros inserted by [`stuff`].
///
/// The bit after every run of five ones is dropped whatever its value, and
/// bits left over after the last whole byte are treated as padding. Damage to
/// either shows up as a CRC mismatch one layer up, never as a parse failure.
pub fn destuff(stuffed: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(stuffed.len());
    let mut ones = 0;

    for bit in bits_msb_first(stuffed) {
        if ones == MAX_ONES_RUN {
            ones = 0;
            continue;
        }

        writer.push(bit);
        if bit {
            ones += 1;
        } else {
            ones = 0;
        }
    }

    writer.finish_truncated()
}
