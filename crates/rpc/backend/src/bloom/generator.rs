//! Rotates per-block blooms into per-bit section vectors.

use alloy_primitives::Bloom;
use thiserror::Error;

/// Number of bits in a header bloom.
pub const BLOOM_BIT_LENGTH: usize = 2048;
/// Number of bytes in a header bloom.
pub const BLOOM_BYTE_LENGTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("section size {0} is not a multiple of 8")]
    UnalignedSection(u64),
    #[error("section already holds every block")]
    SectionFull,
    #[error("expected bloom for block {expected}, got {got}")]
    UnexpectedIndex { expected: u64, got: u64 },
    #[error("section not fully generated yet")]
    Incomplete,
    #[error("bloom bit {0} out of bounds")]
    BitOutOfBounds(usize),
}

/// Accumulates the blooms of one section and transposes them.
///
/// Vector `i` holds bit `i` of every block's bloom, one bit per block, so a
/// filter can test a single bloom bit across a whole section at once.
pub struct SectionGenerator {
    blooms: Vec<Vec<u8>>,
    section_size: u64,
    next: u64,
}

impl SectionGenerator {
    pub fn new(section_size: u64) -> Result<Self, GeneratorError> {
        if section_size % 8 != 0 {
            return Err(GeneratorError::UnalignedSection(section_size));
        }
        let row = (section_size / 8) as usize;
        Ok(Self {
            blooms: vec![vec![0u8; row]; BLOOM_BIT_LENGTH],
            section_size,
            next: 0,
        })
    }

    /// Add the bloom of the block at `index` within the section. Blocks must
    /// arrive in order.
    pub fn add_bloom(&mut self, index: u64, bloom: &Bloom) -> Result<(), GeneratorError> {
        if self.next >= self.section_size {
            return Err(GeneratorError::SectionFull);
        }
        if self.next != index {
            return Err(GeneratorError::UnexpectedIndex {
                expected: self.next,
                got: index,
            });
        }

        let byte_index = (self.next / 8) as usize;
        let bit_mask = 0x80u8 >> (self.next % 8);
        let bytes = bloom.as_slice();
        for byt in 0..BLOOM_BYTE_LENGTH {
            // Bloom bit 0 is the lowest bit of the last byte.
            let bloom_byte = bytes[BLOOM_BYTE_LENGTH - 1 - byt];
            if bloom_byte == 0 {
                continue;
            }
            for bit in 0..8 {
                if bloom_byte & (1 << bit) != 0 {
                    self.blooms[8 * byt + bit][byte_index] |= bit_mask;
                }
            }
        }
        self.next += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.next == self.section_size
    }

    /// Uncompressed vector for bloom bit `bit`.
    pub fn bitset(&self, bit: usize) -> Result<&[u8], GeneratorError> {
        if !self.is_complete() {
            return Err(GeneratorError::Incomplete);
        }
        self.blooms
            .get(bit)
            .map(Vec::as_slice)
            .ok_or(GeneratorError::BitOutOfBounds(bit))
    }
}
