//! CRC-CCITT frame check sequence.
//!
//! Polynomial `0x1021`, initial register `0x0000`, MSB-first, no reflection
//! and no final XOR (the parameter set also known as CRC-16/XMODEM). The
//! register is updated one bit at a time rather than through a lookup table.

/// CRC-CCITT generator polynomial
pub const CRC_CCITT_POLY: u16 = 0x1021;

/// Initial CRC register value
pub const CRC_CCITT_INIT: u16 = 0x0000;

/// Incremental CRC-CCITT state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    register: u16,
}

impl Crc16 {
    /// Create a register holding the initial value
    pub fn new() -> Self {
        Self {
            register: CRC_CCITT_INIT,
        }
    }

    /// Feed one byte
    pub fn update_byte(&mut self, byte: u8) {
        self.register ^= (byte as u16) << 8;
        for _ in 0..8 {
            if self.register & 0x8000 != 0 {
                self.register = (self.register << 1) ^ CRC_CCITT_POLY;
            } else {
                self.register <<= 1;
            }
        }
    }

    /// Feed a byte slice
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Current register value
    pub fn finish(&self) -> u16 {
        self.register
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute CRC-CCITT over a contiguous buffer.
pub fn crc_ccitt(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}
