//! CRC-16 used by the controller's SPI safe/CRC instructions.
//!
//! The controller protects CRC transactions with a CRC-16 over the command
//! bytes and the data: polynomial 0x8005, seed 0xFFFF, processed MSB first,
//! no reflection and no final xor (CRC-16/CMS).

use crc::{Crc, Digest, CRC_16_CMS};

/// Value of the accumulator before any byte has been processed
pub const CRC_SEED: u16 = 0xFFFF;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_CMS);

/// Computes the CRC of a complete buffer
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Incremental CRC over a frame that is transferred in several pieces
/// (instruction header, length byte, payload).
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            digest: CRC16.digest(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn finalize(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_returns_seed() {
        assert_eq!(crc16(&[]), CRC_SEED);
    }

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0xAEE7);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let frame = [0xA4, 0x00, 0x02, 0xDE, 0xAD, 0xBE, 0xEF, 0x01];

        let mut crc = Crc16::new();
        crc.update(&frame[..2]);
        crc.update(&frame[2..3]);
        crc.update(&frame[3..]);

        assert_eq!(crc.finalize(), crc16(&frame));
    }

    #[test]
    fn single_bit_flips_give_distinct_crcs() {
        let mut buffer = [0u8; 64];
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }

        let reference = crc16(&buffer);
        let mut seen = std::vec::Vec::new();

        for bit in 0..buffer.len() * 8 {
            let mut flipped = buffer;
            flipped[bit / 8] ^= 1 << (bit % 8);

            let crc = crc16(&flipped);
            assert_ne!(crc, reference, "flip of bit {bit} not detected");
            seen.push(crc);
        }

        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), buffer.len() * 8);
    }
}
