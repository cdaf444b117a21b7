//! Storage key for one bloom bit vector.

use alloy_primitives::{Bytes, B256};

/// Key prefix shared with the go-ethereum database layout.
pub const BLOOM_BITS_PREFIX: u8 = b'B';

/// Encoded key length: prefix, bit, section, head hash.
pub const BLOOM_BITS_KEY_LEN: usize = 1 + 2 + 8 + 32;

/// Key of the compressed vector for `bit` in `section`, whose last block is `head`.
///
/// Layout: `'B' ‖ bit (u16 BE) ‖ section (u64 BE) ‖ head`. Local stores and
/// remote queries must agree on it byte for byte.
pub fn bloom_bits_key(bit: u16, section: u64, head: B256) -> Bytes {
    let mut key = Vec::with_capacity(BLOOM_BITS_KEY_LEN);
    key.push(BLOOM_BITS_PREFIX);
    key.extend_from_slice(&bit.to_be_bytes());
    key.extend_from_slice(&section.to_be_bytes());
    key.extend_from_slice(head.as_slice());
    Bytes::from(key)
}
