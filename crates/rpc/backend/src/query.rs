//! Structured query routes against the EVM module and their payloads.

use alloy_primitives::{Bloom, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Module every EVM query is routed to.
pub const EVM_MODULE: &str = "evm";

/// A structured query addressed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRoute {
    HashToHeight(B256),
    HeightToHash(i64),
    Bloom(i64),
    BloomBits(Bytes),
    Section,
}

impl QueryRoute {
    pub fn query_type(&self) -> &'static str {
        match self {
            Self::HashToHeight(_) => "hashToHeight",
            Self::HeightToHash(_) => "heightToHash",
            Self::Bloom(_) => "bloom",
            Self::BloomBits(_) => "bloombits",
            Self::Section => "section",
        }
    }

    /// Render as `custom/evm/<type>[/<param>]`.
    pub fn path(&self) -> String {
        let param = match self {
            Self::HashToHeight(hash) => Some(hash.to_string()),
            Self::HeightToHash(height) | Self::Bloom(height) => Some(height.to_string()),
            Self::BloomBits(key) => Some(key.to_string()),
            Self::Section => None,
        };
        match param {
            Some(param) => format!("custom/{EVM_MODULE}/{}/{param}", self.query_type()),
            None => format!("custom/{EVM_MODULE}/{}", self.query_type()),
        }
    }
}

/// Payload of a `hashToHeight` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBlockNumber {
    pub number: i64,
}

/// Payload of a `bloom` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBloomFilter {
    pub bloom: Bloom,
}

pub fn decode_json<T: serde::de::DeserializeOwned>(
    what: &'static str,
    payload: &[u8],
) -> BackendResult<T> {
    serde_json::from_slice(payload).map_err(|e| BackendError::decode(what, e))
}

/// Interpret raw bytes as a hash: the last 32 bytes, left-padded when shorter.
pub fn hash_from_bytes(bytes: &[u8]) -> B256 {
    let mut out = [0u8; 32];
    let take = bytes.len().min(32);
    out[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    B256::from(out)
}
