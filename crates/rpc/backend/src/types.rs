//! Records held by the local cache source.
//!
//! These mirror what the out-of-band indexer writes after execution and are
//! kept separate from the RPC response types in `exrpc_rpc_types`.

use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256, U64};
use exrpc_rpc_types::{BlockTransactions, RpcBlock, RpcLog, RpcTransaction};
use serde::{Deserialize, Serialize};

/// Block as projected into the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBlock {
    /// Block number/height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// State root after this block.
    pub state_root: B256,
    /// Transactions root.
    pub transactions_root: B256,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
    /// Total gas used in this block.
    pub gas_used: u64,
    /// Gas limit for this block.
    pub gas_limit: u64,
    /// Encoded block size in bytes.
    pub size: u64,
    /// Block proposer.
    pub miner: Address,
    /// Logs bloom. `None` when the indexer has not projected it yet.
    pub logs_bloom: Option<Bloom>,
    /// Transactions in block order.
    pub transactions: Vec<StoredTransaction>,
}

impl StoredBlock {
    /// Convert to RPC block format with the given bloom.
    pub fn to_rpc_block(&self, logs_bloom: Bloom, full_transactions: bool) -> RpcBlock {
        let transactions = if full_transactions {
            BlockTransactions::Full(
                self.transactions
                    .iter()
                    .map(StoredTransaction::to_rpc_transaction)
                    .collect(),
            )
        } else {
            BlockTransactions::Hashes(self.transactions.iter().map(|tx| tx.hash).collect())
        };

        RpcBlock {
            number: U64::from(self.number),
            hash: self.hash,
            parent_hash: self.parent_hash,
            nonce: B64::ZERO,
            sha3_uncles: RpcBlock::empty_uncles_hash(),
            logs_bloom,
            transactions_root: self.transactions_root,
            state_root: self.state_root,
            receipts_root: B256::ZERO,
            miner: self.miner,
            mix_hash: B256::ZERO,
            difficulty: U256::ZERO,
            total_difficulty: U256::ZERO,
            extra_data: Bytes::new(),
            size: U64::from(self.size),
            gas_limit: U64::from(self.gas_limit),
            gas_used: U64::from(self.gas_used),
            timestamp: U64::from(self.timestamp),
            transactions,
            uncles: vec![],
        }
    }
}

/// Stored transaction with full data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTransaction {
    /// Transaction hash.
    pub hash: B256,
    /// Block number this transaction is in.
    pub block_number: u64,
    /// Block hash.
    pub block_hash: B256,
    /// Index within the block.
    pub transaction_index: u32,
    /// Sender address.
    pub from: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Value transferred.
    pub value: U256,
    /// Gas limit.
    pub gas: u64,
    /// Gas price.
    pub gas_price: U256,
    /// Input data.
    pub input: Bytes,
    /// Nonce.
    pub nonce: u64,
    /// Signature V.
    pub v: u64,
    /// Signature R.
    pub r: U256,
    /// Signature S.
    pub s: U256,
    /// Transaction type (0 = legacy, 2 = EIP-1559).
    pub tx_type: u8,
    /// Chain ID.
    pub chain_id: Option<u64>,
}

impl StoredTransaction {
    /// Convert to RPC transaction format.
    pub fn to_rpc_transaction(&self) -> RpcTransaction {
        RpcTransaction {
            hash: self.hash,
            nonce: U64::from(self.nonce),
            block_hash: None,
            block_number: None,
            transaction_index: None,
            from: self.from,
            to: self.to,
            value: self.value,
            gas: U64::from(self.gas),
            gas_price: Some(self.gas_price),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            input: self.input.clone(),
            v: U64::from(self.v),
            r: self.r,
            s: self.s,
            tx_type: U64::from(self.tx_type as u64),
            chain_id: self.chain_id.map(U64::from),
        }
        .with_block(
            self.block_hash,
            self.block_number,
            self.transaction_index as u64,
        )
    }
}

/// Stored transaction receipt.
///
/// Receipts reconstructed by the resolver are committed back in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReceipt {
    /// Transaction hash.
    pub transaction_hash: B256,
    /// Transaction index in block.
    pub transaction_index: u32,
    /// Block hash.
    pub block_hash: B256,
    /// Block number.
    pub block_number: u64,
    /// Sender address.
    pub from: Address,
    /// Recipient address.
    pub to: Option<Address>,
    /// Cumulative gas used up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction.
    pub gas_used: u64,
    /// Contract address if this was a contract creation.
    pub contract_address: Option<Address>,
    /// Logs emitted by this transaction, in emission order.
    pub logs: Vec<StoredLog>,
    /// Bloom over this transaction's logs.
    pub logs_bloom: Bloom,
    /// Status (1 = success, 0 = failure).
    pub status: u8,
    /// Transaction type.
    pub tx_type: u8,
}

impl StoredReceipt {
    /// Logs with block and transaction context attached.
    ///
    /// Each log keeps the block-wide index it was emitted with. Logs stored
    /// without one fall back to their position in this receipt.
    pub fn rpc_logs(&self) -> Vec<RpcLog> {
        self.logs
            .iter()
            .enumerate()
            .map(|(i, log)| {
                log.to_rpc_log(
                    self.block_number,
                    self.block_hash,
                    self.transaction_hash,
                    self.transaction_index,
                    log.log_index.unwrap_or(i as u64),
                )
            })
            .collect()
    }
}

/// Stored log/event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLog {
    /// Contract address that emitted the log.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<B256>,
    /// Log data.
    pub data: Bytes,
    /// Index of the log within its block, as emitted by execution.
    #[serde(default)]
    pub log_index: Option<u64>,
}

impl StoredLog {
    /// Convert to RPC log format with block/tx context.
    pub fn to_rpc_log(
        &self,
        block_number: u64,
        block_hash: B256,
        tx_hash: B256,
        tx_index: u32,
        log_index: u64,
    ) -> RpcLog {
        RpcLog::new(
            self.address,
            self.topics.clone(),
            self.data.clone(),
            block_number,
            block_hash,
            tx_hash,
            tx_index as u64,
            log_index,
        )
    }
}

impl From<&RpcLog> for StoredLog {
    fn from(log: &RpcLog) -> Self {
        Self {
            address: log.address,
            topics: log.topics.clone(),
            data: log.data.clone(),
            log_index: log.log_index.map(|index| index.to::<u64>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx(index: u32) -> StoredTransaction {
        StoredTransaction {
            hash: B256::repeat_byte(index as u8 + 1),
            block_number: 9,
            block_hash: B256::repeat_byte(0x99),
            transaction_index: index,
            from: Address::repeat_byte(0x01),
            to: None,
            value: U256::ZERO,
            gas: 21000,
            gas_price: U256::from(1),
            input: Bytes::new(),
            nonce: index as u64,
            v: 27,
            r: U256::from(1),
            s: U256::from(2),
            tx_type: 0,
            chain_id: Some(1),
        }
    }

    #[test]
    fn test_block_projection_respects_full_flag() {
        let block = StoredBlock {
            number: 9,
            hash: B256::repeat_byte(0x99),
            parent_hash: B256::repeat_byte(0x98),
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            timestamp: 100,
            gas_used: 42000,
            gas_limit: 30_000_000,
            size: 512,
            miner: Address::ZERO,
            logs_bloom: None,
            transactions: vec![sample_tx(0), sample_tx(1)],
        };

        let hashes = block.to_rpc_block(Bloom::ZERO, false);
        assert!(matches!(&hashes.transactions, BlockTransactions::Hashes(h) if h.len() == 2));

        let full = block.to_rpc_block(Bloom::repeat_byte(3), true);
        match &full.transactions {
            BlockTransactions::Full(txs) => {
                assert_eq!(txs[1].transaction_index, Some(U64::from(1u64)));
                assert_eq!(txs[1].block_hash, Some(block.hash));
            }
            other => panic!("expected full transactions, got {other:?}"),
        }
        assert_eq!(full.logs_bloom, Bloom::repeat_byte(3));
    }

    #[test]
    fn test_receipt_logs_carry_context() {
        let receipt = StoredReceipt {
            transaction_hash: B256::repeat_byte(7),
            transaction_index: 3,
            block_hash: B256::repeat_byte(8),
            block_number: 12,
            from: Address::ZERO,
            to: None,
            cumulative_gas_used: 50_000,
            gas_used: 21_000,
            contract_address: None,
            logs: vec![
                StoredLog {
                    address: Address::repeat_byte(1),
                    topics: vec![B256::repeat_byte(2)],
                    data: Bytes::from_static(&[1]),
                    log_index: Some(4),
                },
                StoredLog {
                    address: Address::repeat_byte(1),
                    topics: vec![],
                    data: Bytes::new(),
                    log_index: Some(5),
                },
            ],
            logs_bloom: Bloom::ZERO,
            status: 1,
            tx_type: 2,
        };

        let logs = receipt.rpc_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].log_index, Some(U64::from(4u64)));
        assert_eq!(logs[1].log_index, Some(U64::from(5u64)));
        assert_eq!(logs[0].transaction_index, Some(U64::from(3u64)));
    }

    #[test]
    fn test_unindexed_logs_fall_back_to_position() {
        let emitted = RpcLog::new(
            Address::repeat_byte(1),
            vec![],
            Bytes::new(),
            12,
            B256::repeat_byte(8),
            B256::repeat_byte(7),
            0,
            9,
        );
        assert_eq!(StoredLog::from(&emitted).log_index, Some(9));

        let pending = RpcLog::pending(Address::repeat_byte(1), vec![], Bytes::new());
        let receipt = StoredReceipt {
            transaction_hash: B256::repeat_byte(7),
            transaction_index: 0,
            block_hash: B256::repeat_byte(8),
            block_number: 12,
            from: Address::ZERO,
            to: None,
            cumulative_gas_used: 0,
            gas_used: 0,
            contract_address: None,
            logs: vec![StoredLog::from(&pending), StoredLog::from(&pending)],
            logs_bloom: Bloom::ZERO,
            status: 1,
            tx_type: 0,
        };
        let indices: Vec<_> = receipt.rpc_logs().iter().map(|log| log.log_index).collect();
        assert_eq!(indices, vec![Some(U64::from(0u64)), Some(U64::from(1u64))]);
    }
}
