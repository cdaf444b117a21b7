//! Records returned by the authoritative consensus/state layer.
//!
//! These are the opaque canonical shapes the resolver normalizes into
//! Ethereum-compatible blocks, headers, and receipts.

use alloy_primitives::{Address, Bloom, Bytes, B256};
use exrpc_rpc_types::RpcLog;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BackendError, BackendResult};

/// Header of a consensus block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusHeader {
    pub height: i64,
    /// Block time in Unix seconds.
    pub time: u64,
    pub last_block_hash: B256,
    pub app_hash: Bytes,
    pub data_hash: Bytes,
    pub proposer_address: Address,
}

/// Full consensus block with raw, undecoded transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusBlock {
    pub hash: B256,
    /// Encoded size in bytes.
    pub size: u64,
    pub header: ConsensusHeader,
    pub txs: Vec<Bytes>,
}

impl ConsensusBlock {
    /// Hashes of every raw transaction in block order.
    pub fn tx_hashes(&self) -> Vec<B256> {
        self.txs.iter().map(|raw| consensus_tx_hash(raw)).collect()
    }
}

/// Hash the consensus layer assigns to a raw transaction (sha256).
pub fn consensus_tx_hash(raw: &[u8]) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    B256::from_slice(&hasher.finalize())
}

/// Outcome of delivering one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxResult {
    /// Zero on success.
    pub code: u32,
    /// Encoded [`ExecutionResult`].
    pub data: Bytes,
    #[serde(default)]
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

impl TxResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// A committed transaction located by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxResponse {
    pub hash: B256,
    pub height: i64,
    pub index: u32,
    pub tx: Bytes,
    pub result: TxResult,
}

/// A view of the unconfirmed pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnconfirmedTxs {
    /// Entries returned in `txs`.
    pub count: usize,
    /// Entries held by the pool.
    pub total: usize,
    pub txs: Vec<Bytes>,
}

/// EVM execution result carried in [`TxResult::data`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub bloom: Bloom,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
    #[serde(default)]
    pub ret: Bytes,
    #[serde(default)]
    pub tx_hash: B256,
}

impl ExecutionResult {
    pub fn decode(data: &[u8]) -> BackendResult<Self> {
        serde_json::from_slice(data).map_err(|e| BackendError::decode("execution result", e))
    }

    pub fn encode(&self) -> Bytes {
        // Serializing plain data with string keys cannot fail.
        Bytes::from(serde_json::to_vec(self).unwrap_or_default())
    }
}
