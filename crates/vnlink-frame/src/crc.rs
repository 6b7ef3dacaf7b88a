//! Checksums used by the sensor framings.
//!
//! - 8-bit XOR checksum for 2-digit ASCII trailers.
//! - The sensor's CRC-16 (CRC-16/XMODEM: poly 0x1021, init 0, MSB first) for
//!   4-digit ASCII trailers and every binary frame. Binary frames carry the CRC
//!   MSB first, so running the CRC over `data ++ crc` yields zero.

use crate::error::Result;
use crate::ring::RingByteBuffer;

/// XOR of every byte in `data`.
pub fn checksum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// CRC-16 of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.value()
}

/// CRC-16 over `len` buffered bytes at logical `offset`, without copying.
pub fn crc16_ring(buf: &RingByteBuffer, offset: usize, len: usize) -> Result<u16> {
    let (a, b) = buf.slices(offset, len)?;
    let mut crc = Crc16::new();
    crc.update(a);
    crc.update(b);
    Ok(crc.value())
}

/// Streaming CRC-16 accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16(u16);

impl Crc16 {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        let mut crc = self.0.rotate_left(8);
        crc ^= u16::from(byte);
        crc ^= (crc & 0x00FF) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0x00FF) << 5;
        self.0 = crc;
    }

    pub fn update(&mut self, data: &[u8]) {
        for &b in data {
            self.push(b);
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}
