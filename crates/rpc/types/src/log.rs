//! Ethereum-compatible log/event types.

use alloy_primitives::{Address, Bytes, B256, U64};
use serde::{Deserialize, Serialize};

/// Ethereum-compatible log entry.
///
/// This matches the format returned by eth_getLogs and in transaction receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    /// Contract address that emitted the log
    pub address: Address,
    /// Indexed topics (up to 4)
    pub topics: Vec<B256>,
    /// Log data
    pub data: Bytes,
    /// Block number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U64>,
    /// Transaction hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// Transaction index in block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<U64>,
    /// Block hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    /// Log index in block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<U64>,
    /// Whether this log was removed due to chain reorg
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    /// Create a new log entry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        topics: Vec<B256>,
        data: Bytes,
        block_number: u64,
        block_hash: B256,
        tx_hash: B256,
        tx_index: u64,
        log_index: u64,
    ) -> Self {
        Self {
            address,
            topics,
            data,
            block_number: Some(U64::from(block_number)),
            transaction_hash: Some(tx_hash),
            transaction_index: Some(U64::from(tx_index)),
            block_hash: Some(block_hash),
            log_index: Some(U64::from(log_index)),
            removed: false,
        }
    }

    /// Create a pending log (not yet in a block).
    pub fn pending(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
            block_number: None,
            transaction_hash: None,
            transaction_index: None,
            block_hash: None,
            log_index: None,
            removed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_log_serialization() {
        let log = RpcLog::new(
            Address::ZERO,
            vec![B256::ZERO],
            Bytes::from_static(&[1, 2, 3]),
            100,
            B256::ZERO,
            B256::ZERO,
            0,
            0,
        );
        let json_value: Value = serde_json::to_value(&log).unwrap();
        assert_eq!(json_value["blockNumber"], "0x64");
        assert_eq!(json_value["removed"], false);
        assert_eq!(
            json_value["address"],
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_pending_log_omits_linkage() {
        let log = RpcLog::pending(Address::ZERO, vec![], Bytes::new());
        let json_value: Value = serde_json::to_value(&log).unwrap();
        assert!(json_value.get("blockNumber").is_none());
        assert!(json_value.get("transactionHash").is_none());
    }

    #[test]
    fn test_log_deserializes_without_linkage() {
        let json = r#"{"address":"0x0000000000000000000000000000000000000001","topics":[],"data":"0x"}"#;
        let log: RpcLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.address, Address::with_last_byte(1));
        assert!(log.block_hash.is_none());
        assert!(!log.removed);
    }
}
