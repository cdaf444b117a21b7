//! Normalization of consensus records into Ethereum-compatible shapes.

use alloy_primitives::{Bloom, Bytes, B256, B64, U256, U64};
use exrpc_rpc_types::{BlockTransactions, RpcBlock};

use crate::consensus::{ConsensusBlock, ExecutionResult, TxResult};
use crate::evm_tx::{decode_pool_entry, DecodeOutcome, EvmTransaction};
use crate::query::hash_from_bytes;
use crate::types::{StoredLog, StoredReceipt};

/// Build an RPC block from a consensus block.
///
/// Non-EVM transactions are left out of the transaction list. Gas used is the
/// sum of the EVM transactions' gas limits; consensus blocks carry no
/// per-block execution total.
pub fn rpc_block_from_consensus(
    block: &ConsensusBlock,
    logs_bloom: Bloom,
    gas_limit: u64,
    full_transactions: bool,
) -> RpcBlock {
    let mut gas_used = 0u64;
    let mut full = Vec::new();
    let mut hashes = Vec::new();
    let number = u64::try_from(block.header.height).unwrap_or_default();

    for (index, raw) in block.txs.iter().enumerate() {
        let tx = match decode_pool_entry(raw) {
            DecodeOutcome::Decoded(tx) => tx,
            DecodeOutcome::Skipped(reason) => {
                tracing::trace!(height = block.header.height, index, %reason, "Skipping non-EVM transaction");
                continue;
            }
        };
        gas_used = gas_used.saturating_add(tx.gas_limit());
        if full_transactions {
            full.push(tx.to_rpc(block.hash, number, index as u64));
        } else {
            hashes.push(tx.hash());
        }
    }

    let transactions = if full_transactions {
        BlockTransactions::Full(full)
    } else {
        BlockTransactions::Hashes(hashes)
    };

    RpcBlock {
        number: U64::from(number),
        hash: block.hash,
        parent_hash: block.header.last_block_hash,
        nonce: B64::ZERO,
        sha3_uncles: RpcBlock::empty_uncles_hash(),
        logs_bloom,
        transactions_root: hash_from_bytes(&block.header.data_hash),
        state_root: hash_from_bytes(&block.header.app_hash),
        receipts_root: B256::ZERO,
        miner: block.header.proposer_address,
        mix_hash: B256::ZERO,
        difficulty: U256::ZERO,
        total_difficulty: U256::ZERO,
        extra_data: Bytes::new(),
        size: U64::from(block.size),
        gas_limit: U64::from(gas_limit),
        gas_used: U64::from(gas_used),
        timestamp: U64::from(block.header.time),
        transactions,
        uncles: vec![],
    }
}

/// Gas used by the transactions before `index` in block order.
pub fn preceding_gas_used(results: &[TxResult], index: usize) -> u64 {
    results
        .iter()
        .take(index)
        .fold(0u64, |acc, result| acc.saturating_add(result.gas_used))
}

/// Where a committed transaction sits in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxLocation {
    pub tx_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    pub index: u32,
}

/// Rebuild a receipt from a transaction's delivery result.
///
/// Status follows the result code, but an undecodable execution result forces
/// a failed status with no logs.
pub fn receipt_from_result(
    tx: &EvmTransaction,
    location: TxLocation,
    result: &TxResult,
    cumulative_gas_used: u64,
) -> StoredReceipt {
    let mut status = u8::from(result.is_ok());
    let execution = match ExecutionResult::decode(&result.data) {
        Ok(execution) => execution,
        Err(e) => {
            tracing::debug!(tx = %location.tx_hash, error = %e, "Undecodable execution result");
            status = 0;
            ExecutionResult::default()
        }
    };

    StoredReceipt {
        transaction_hash: location.tx_hash,
        transaction_index: location.index,
        block_hash: location.block_hash,
        block_number: location.block_number,
        from: tx.sender(),
        to: tx.to(),
        cumulative_gas_used,
        gas_used: result.gas_used,
        contract_address: execution.contract_address,
        logs: execution.logs.iter().map(StoredLog::from).collect(),
        logs_bloom: execution.bloom,
        status,
        tx_type: tx.tx_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ConsensusHeader;
    use crate::evm_tx::test_signing::{address_of, legacy_tx};
    use alloy_primitives::{Address, Bytes};
    use exrpc_rpc_types::RpcLog;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn block_with(txs: Vec<Bytes>) -> ConsensusBlock {
        ConsensusBlock {
            hash: B256::repeat_byte(0xbb),
            size: 512,
            header: ConsensusHeader {
                height: 9,
                time: 1_700_000_000,
                last_block_hash: B256::repeat_byte(0xaa),
                app_hash: Bytes::from(vec![0x11; 32]),
                data_hash: Bytes::from(vec![0x22; 32]),
                proposer_address: Address::repeat_byte(0x33),
            },
            txs,
        }
    }

    #[test]
    fn test_block_skips_foreign_transactions() {
        let key = SigningKey::random(&mut OsRng);
        let evm = Bytes::from(legacy_tx(&key, 0, 50_000));
        let block = block_with(vec![Bytes::from_static(b"bank-send"), evm.clone()]);

        let rpc = rpc_block_from_consensus(&block, Bloom::ZERO, 1_000_000, true);
        assert_eq!(rpc.transactions.len(), 1);
        assert_eq!(rpc.gas_used, U64::from(50_000));
        assert_eq!(rpc.gas_limit, U64::from(1_000_000));
        assert_eq!(rpc.parent_hash, B256::repeat_byte(0xaa));
        assert_eq!(rpc.state_root, B256::repeat_byte(0x11));
        assert_eq!(rpc.miner, Address::repeat_byte(0x33));

        match &rpc.transactions {
            BlockTransactions::Full(txs) => {
                assert_eq!(txs[0].from, address_of(&key));
                assert_eq!(txs[0].block_hash, Some(block.hash));
                // Index is the position among all raw transactions.
                assert_eq!(txs[0].transaction_index, Some(U64::from(1)));
            }
            other => panic!("expected full transactions, got {other:?}"),
        }

        let hashes = rpc_block_from_consensus(&block, Bloom::ZERO, 1_000_000, false);
        assert_eq!(hashes.transactions.hashes(), block.tx_hashes()[1..].to_vec());
    }

    #[test]
    fn test_preceding_gas_used() {
        let results: Vec<TxResult> = [10, 20, 30]
            .into_iter()
            .map(|gas_used| TxResult {
                gas_used,
                ..Default::default()
            })
            .collect();
        assert_eq!(preceding_gas_used(&results, 0), 0);
        assert_eq!(preceding_gas_used(&results, 2), 30);
        assert_eq!(preceding_gas_used(&results, 10), 60);
    }

    #[test]
    fn test_receipt_status_and_logs() {
        let key = SigningKey::random(&mut OsRng);
        let tx = EvmTransaction::decode(&legacy_tx(&key, 1, 21_000)).unwrap();
        let location = TxLocation {
            tx_hash: tx.hash(),
            block_hash: B256::repeat_byte(1),
            block_number: 4,
            index: 0,
        };
        let execution = ExecutionResult {
            logs: vec![RpcLog::pending(Address::repeat_byte(9), vec![B256::ZERO], Bytes::new())],
            ..Default::default()
        };
        let ok = TxResult {
            data: execution.encode(),
            gas_used: 21_000,
            ..Default::default()
        };

        let receipt = receipt_from_result(&tx, location, &ok, 21_000);
        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.from, address_of(&key));

        let failed = TxResult { code: 5, ..ok.clone() };
        assert_eq!(receipt_from_result(&tx, location, &failed, 21_000).status, 0);

        let garbage = TxResult {
            data: Bytes::from_static(b"\x00garbage"),
            ..ok
        };
        let receipt = receipt_from_result(&tx, location, &garbage, 21_000);
        assert_eq!(receipt.status, 0);
        assert!(receipt.logs.is_empty());
    }
}
