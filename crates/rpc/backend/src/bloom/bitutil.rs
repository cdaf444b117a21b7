//! Sparse bitset compression for bloom bit vectors.
//!
//! The encoding is recursive: a bitset marking which input bytes are non-zero
//! is itself compressed, followed by the non-zero bytes in order. It must stay
//! byte-compatible with the go-ethereum `bitutil` package, since compressed
//! vectors are shared with remote nodes.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitsetError {
    #[error("missing bytes on input")]
    MissingData,
    #[error("extra bytes on input")]
    UnreferencedData,
    #[error("target data size exceeded")]
    ExceededTarget,
    #[error("zero byte in input content")]
    ZeroContent,
}

/// Compress `data`, returning it unchanged if compression would not shrink it.
pub fn compress_bytes(data: &[u8]) -> Vec<u8> {
    let out = bitset_encode_bytes(data);
    if out.len() < data.len() {
        out
    } else {
        data.to_vec()
    }
}

fn bitset_encode_bytes(data: &[u8]) -> Vec<u8> {
    match data {
        [] | [0] => return Vec::new(),
        [byte] => return vec![*byte],
        _ => {}
    }

    let mut non_zero_bitset = vec![0u8; data.len().div_ceil(8)];
    let mut non_zero_bytes = Vec::with_capacity(data.len());
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            non_zero_bytes.push(byte);
            if let Some(slot) = non_zero_bitset.get_mut(i / 8) {
                *slot |= 0x80 >> (i % 8);
            }
        }
    }
    if non_zero_bytes.is_empty() {
        return Vec::new();
    }

    let mut out = bitset_encode_bytes(&non_zero_bitset);
    out.extend_from_slice(&non_zero_bytes);
    out
}

/// Decompress `data` into exactly `target` bytes.
///
/// Input of exactly `target` bytes is taken as stored uncompressed.
pub fn decompress_bytes(data: &[u8], target: usize) -> Result<Vec<u8>, BitsetError> {
    if data.len() > target {
        return Err(BitsetError::ExceededTarget);
    }
    if data.len() == target {
        return Ok(data.to_vec());
    }

    let (out, consumed) = bitset_decode_partial_bytes(data, target)?;
    if consumed != data.len() {
        return Err(BitsetError::UnreferencedData);
    }
    Ok(out)
}

/// Decode the prefix of `data` describing `target` bytes, returning how many
/// input bytes were consumed.
fn bitset_decode_partial_bytes(
    data: &[u8],
    target: usize,
) -> Result<(Vec<u8>, usize), BitsetError> {
    if target == 0 {
        return Ok((Vec::new(), 0));
    }

    let mut decomp = vec![0u8; target];
    let Some(&first) = data.first() else {
        return Ok((decomp, 0));
    };
    if target == 1 {
        decomp[0] = first;
        return Ok((decomp, usize::from(first != 0)));
    }

    let (non_zero_bitset, mut ptr) = bitset_decode_partial_bytes(data, target.div_ceil(8))?;
    for (byte_index, &mask) in non_zero_bitset.iter().enumerate() {
        for bit in 0..8 {
            if mask & (0x80 >> bit) == 0 {
                continue;
            }
            let Some(&byte) = data.get(ptr) else {
                return Err(BitsetError::MissingData);
            };
            let Some(slot) = decomp.get_mut(byte_index * 8 + bit) else {
                return Err(BitsetError::ExceededTarget);
            };
            if byte == 0 {
                return Err(BitsetError::ZeroContent);
            }
            *slot = byte;
            ptr += 1;
        }
    }
    Ok((decomp, ptr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_trailing_byte() {
        let mut data = vec![0u8; 8];
        data[7] = 0x05;

        let compressed = compress_bytes(&data);
        assert_eq!(compressed, vec![0x01, 0x05]);
        assert_eq!(decompress_bytes(&compressed, 8).unwrap(), data);
    }

    #[test]
    fn test_all_zero_section_compresses_to_nothing() {
        let data = vec![0u8; 512];
        assert!(compress_bytes(&data).is_empty());
        assert_eq!(decompress_bytes(&[], 512).unwrap(), data);
    }

    #[test]
    fn test_dense_input_stays_uncompressed() {
        let data: Vec<u8> = (1..=16).collect();
        let compressed = compress_bytes(&data);
        assert_eq!(compressed, data);
        assert_eq!(decompress_bytes(&compressed, 16).unwrap(), data);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decompress_bytes(&[0x01, 0x05, 0x07], 8),
            Err(BitsetError::UnreferencedData)
        );
        assert_eq!(decompress_bytes(&[0x01], 8), Err(BitsetError::MissingData));
        assert_eq!(decompress_bytes(&[0x01, 0x00], 8), Err(BitsetError::ZeroContent));
        assert_eq!(decompress_bytes(&[1; 9], 8), Err(BitsetError::ExceededTarget));
    }

    #[test]
    fn test_bitset_pointing_past_target() {
        // Bitset byte 0x01 marks index 7, but the target only has 4 bytes.
        assert_eq!(
            decompress_bytes(&[0x01, 0x05], 4),
            Err(BitsetError::ExceededTarget)
        );
    }
}
