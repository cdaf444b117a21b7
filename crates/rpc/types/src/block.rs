//! Ethereum-compatible block types.
#![cfg_attr(test, allow(clippy::indexing_slicing))]

use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256, U64};
use serde::{Deserialize, Serialize};

use crate::header::RpcHeader;
use crate::transaction::RpcTransaction;

/// Ethereum-compatible block representation.
///
/// This matches the format returned by eth_getBlockByNumber/eth_getBlockByHash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    /// Block number
    pub number: U64,
    /// Block hash
    pub hash: B256,
    /// Parent block hash
    pub parent_hash: B256,
    /// Nonce (always zero)
    pub nonce: B64,
    /// SHA3 of uncles data
    pub sha3_uncles: B256,
    /// Bloom filter over every log emitted in the block
    pub logs_bloom: Bloom,
    /// Transactions root (consensus data hash)
    pub transactions_root: B256,
    /// State root (consensus app hash)
    pub state_root: B256,
    /// Receipts root (always zero)
    pub receipts_root: B256,
    /// Block proposer
    pub miner: Address,
    /// Mix hash (always zero)
    pub mix_hash: B256,
    /// Difficulty (always zero)
    pub difficulty: U256,
    /// Total difficulty (always zero)
    pub total_difficulty: U256,
    /// Extra data
    pub extra_data: Bytes,
    /// Block size in bytes
    pub size: U64,
    /// Gas limit
    pub gas_limit: U64,
    /// Gas used
    pub gas_used: U64,
    /// Block timestamp (Unix seconds)
    pub timestamp: U64,
    /// Transactions - either hashes or full objects
    pub transactions: BlockTransactions,
    /// Uncles (always empty)
    pub uncles: Vec<B256>,
}

/// Block transactions - either just hashes or full transaction objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    /// Only transaction hashes
    Hashes(Vec<B256>),
    /// Full transaction objects
    Full(Vec<RpcTransaction>),
}

impl BlockTransactions {
    /// Hashes of every transaction, regardless of representation.
    pub fn hashes(&self) -> Vec<B256> {
        match self {
            Self::Hashes(hashes) => hashes.clone(),
            Self::Full(txs) => txs.iter().map(|tx| tx.hash).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Hashes(hashes) => hashes.len(),
            Self::Full(txs) => txs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RpcBlock {
    /// Empty uncles hash (keccak256 of RLP empty list).
    pub fn empty_uncles_hash() -> B256 {
        // keccak256(rlp([])) = 0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347
        B256::from_slice(&[
            0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc,
            0xd4, 0x1a, 0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd,
            0x40, 0xd4, 0x93, 0x47,
        ])
    }

    /// Project the header fields out of this block.
    ///
    /// Every header the resolver returns goes through here, so two blocks
    /// with equal fields always yield equal headers.
    pub fn header(&self) -> RpcHeader {
        RpcHeader {
            hash: self.hash,
            parent_hash: self.parent_hash,
            sha3_uncles: self.sha3_uncles,
            miner: self.miner,
            state_root: self.state_root,
            transactions_root: self.transactions_root,
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom,
            difficulty: self.difficulty,
            number: self.number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: self.mix_hash,
            nonce: self.nonce,
        }
    }
}
