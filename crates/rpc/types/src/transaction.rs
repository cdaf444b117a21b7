//! Ethereum-compatible transaction types.
#![cfg_attr(test, allow(clippy::indexing_slicing))]

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};

/// Ethereum-compatible transaction representation.
///
/// This matches the format returned by eth_getTransactionByHash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    /// Transaction hash
    pub hash: B256,
    /// Nonce
    pub nonce: U64,
    /// Block hash (null if pending)
    pub block_hash: Option<B256>,
    /// Block number (null if pending)
    pub block_number: Option<U64>,
    /// Transaction index in block (null if pending)
    pub transaction_index: Option<U64>,
    /// Sender address
    pub from: Address,
    /// Recipient address (null for contract creation)
    pub to: Option<Address>,
    /// Value transferred
    pub value: U256,
    /// Gas limit
    pub gas: U64,
    /// Gas price (legacy transactions, max fee for EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Max fee per gas (EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// Max priority fee per gas (EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    /// Input data
    pub input: Bytes,
    /// Signature V
    pub v: U64,
    /// Signature R
    pub r: U256,
    /// Signature S
    pub s: U256,
    /// Transaction type (0 = legacy, 2 = EIP-1559)
    #[serde(rename = "type")]
    pub tx_type: U64,
    /// Chain ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U64>,
}

impl RpcTransaction {
    /// Attach block linkage.
    ///
    /// A zero block hash marks the transaction as not yet mined and leaves
    /// every linkage field null.
    pub fn with_block(mut self, block_hash: B256, block_number: u64, index: u64) -> Self {
        if block_hash.is_zero() {
            self.block_hash = None;
            self.block_number = None;
            self.transaction_index = None;
        } else {
            self.block_hash = Some(block_hash);
            self.block_number = Some(U64::from(block_number));
            self.transaction_index = Some(U64::from(index));
        }
        self
    }

    /// Whether the transaction is still waiting in the pool.
    pub fn is_pending(&self) -> bool {
        self.block_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> RpcTransaction {
        RpcTransaction {
            hash: B256::ZERO,
            nonce: U64::from(1u64),
            block_hash: None,
            block_number: None,
            transaction_index: None,
            from: Address::ZERO,
            to: Some(Address::ZERO),
            value: U256::from(1000),
            gas: U64::from(21000u64),
            gas_price: Some(U256::ZERO),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            input: Bytes::new(),
            v: U64::ZERO,
            r: U256::ZERO,
            s: U256::ZERO,
            tx_type: U64::ZERO,
            chain_id: None,
        }
    }

    #[test]
    fn test_transaction_serialization() {
        let json_value: Value = serde_json::to_value(sample()).unwrap();
        assert_eq!(json_value["nonce"], "0x1");
        assert_eq!(json_value["type"], "0x0");
        assert_eq!(json_value["value"], "0x3e8");
        assert_eq!(json_value["gas"], "0x5208");
        assert_eq!(json_value["blockHash"], Value::Null);
    }

    #[test]
    fn test_zero_block_hash_means_pending() {
        let tx = sample().with_block(B256::ZERO, 0, 0);
        assert!(tx.is_pending());
        assert!(tx.block_number.is_none());
        assert!(tx.transaction_index.is_none());

        let mined = sample().with_block(B256::repeat_byte(1), 7, 2);
        assert!(!mined.is_pending());
        assert_eq!(mined.block_number, Some(U64::from(7u64)));
        assert_eq!(mined.transaction_index, Some(U64::from(2u64)));
    }
}
