//! In-memory LRU projection of recently executed chain state.
//!
//! The out-of-band indexer writes blocks here after execution; the resolver
//! reads through [`LocalCacheSource`] and commits receipts it had to rebuild.

use std::num::NonZeroUsize;
use std::sync::Arc;

use alloy_primitives::B256;
use lru::LruCache;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{SourceError, SourceResult};
use crate::source::LocalCacheSource;
use crate::types::{StoredBlock, StoredReceipt};

/// Default number of blocks to cache.
const DEFAULT_BLOCK_CACHE_SIZE: usize = 128;
/// Default number of receipts to cache.
const DEFAULT_RECEIPT_CACHE_SIZE: usize = 4096;

/// Configuration for the chain cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Number of blocks to cache.
    #[serde(default = "CacheConfig::default_block_cache_size")]
    pub block_cache_size: usize,
    /// Number of receipts to cache.
    #[serde(default = "CacheConfig::default_receipt_cache_size")]
    pub receipt_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_cache_size: DEFAULT_BLOCK_CACHE_SIZE,
            receipt_cache_size: DEFAULT_RECEIPT_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    const fn default_block_cache_size() -> usize {
        DEFAULT_BLOCK_CACHE_SIZE
    }

    const fn default_receipt_cache_size() -> usize {
        DEFAULT_RECEIPT_CACHE_SIZE
    }
}

/// In-memory LRU cache for chain data.
pub struct ChainCache {
    /// Blocks by number.
    blocks_by_number: RwLock<LruCache<u64, Arc<StoredBlock>>>,
    /// Block number by hash.
    block_number_by_hash: RwLock<LruCache<B256, u64>>,
    /// Receipts by transaction hash.
    receipts: RwLock<LruCache<B256, Arc<StoredReceipt>>>,
    /// Latest block number.
    latest_block: RwLock<Option<u64>>,
}

fn capacity(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN)
}

impl ChainCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            blocks_by_number: RwLock::new(LruCache::new(capacity(config.block_cache_size))),
            block_number_by_hash: RwLock::new(LruCache::new(capacity(config.block_cache_size))),
            receipts: RwLock::new(LruCache::new(capacity(config.receipt_cache_size))),
            latest_block: RwLock::new(None),
        }
    }

    /// Create a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(&CacheConfig::default())
    }

    /// Set the latest block number. Never moves backwards.
    pub fn set_latest_block_number(&self, number: u64) {
        let mut latest = self.latest_block.write();
        if latest.is_none_or(|n| number > n) {
            *latest = Some(number);
        }
    }

    /// Insert a block into the cache.
    pub fn insert_block(&self, block: StoredBlock) {
        let number = block.number;
        let hash = block.hash;

        self.blocks_by_number.write().put(number, Arc::new(block));
        self.block_number_by_hash.write().put(hash, number);
        self.set_latest_block_number(number);
    }

    /// Insert a receipt into the cache.
    pub fn insert_receipt(&self, receipt: StoredReceipt) {
        let hash = receipt.transaction_hash;
        self.receipts.write().put(hash, Arc::new(receipt));
    }
}

impl LocalCacheSource for ChainCache {
    fn latest_height(&self) -> SourceResult<u64> {
        self.latest_block
            .read()
            .ok_or_else(|| SourceError::not_found("latest height"))
    }

    fn block_by_number(&self, number: u64) -> SourceResult<Arc<StoredBlock>> {
        self.blocks_by_number
            .write()
            .get(&number)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("block {number}")))
    }

    fn block_by_hash(&self, hash: B256) -> SourceResult<Arc<StoredBlock>> {
        let number = self
            .block_number_by_hash
            .write()
            .get(&hash)
            .copied()
            .ok_or_else(|| SourceError::not_found(format!("block {hash}")))?;
        self.block_by_number(number)
    }

    fn block_hash_by_number(&self, number: u64) -> SourceResult<B256> {
        self.block_by_number(number).map(|block| block.hash)
    }

    fn transaction_receipt(&self, tx_hash: B256) -> SourceResult<Arc<StoredReceipt>> {
        self.receipts
            .write()
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("receipt {tx_hash}")))
    }

    fn commit_receipt(&self, receipt: StoredReceipt) -> SourceResult<()> {
        self.insert_receipt(receipt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bloom};

    fn make_test_block(number: u64) -> StoredBlock {
        StoredBlock {
            number,
            hash: B256::from([number as u8; 32]),
            parent_hash: B256::from([(number.saturating_sub(1)) as u8; 32]),
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            timestamp: 1000 + number,
            gas_used: 21000 * number,
            gas_limit: 30_000_000,
            size: 0,
            miner: Address::ZERO,
            logs_bloom: Some(Bloom::ZERO),
            transactions: vec![],
        }
    }

    #[test]
    fn test_block_cache() {
        let cache = ChainCache::with_defaults();

        let block = make_test_block(1);
        let hash = block.hash;
        cache.insert_block(block);

        assert_eq!(cache.latest_height(), Ok(1));
        assert!(cache.block_by_number(1).is_ok());
        assert_eq!(cache.block_by_hash(hash).map(|b| b.number), Ok(1));
        assert_eq!(cache.block_hash_by_number(1), Ok(hash));
        assert!(cache.block_by_number(2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_cache_reports_not_found() {
        let cache = ChainCache::with_defaults();
        assert!(cache.latest_height().unwrap_err().is_not_found());
        assert!(cache
            .transaction_receipt(B256::ZERO)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_latest_block_tracking() {
        let cache = ChainCache::with_defaults();

        cache.insert_block(make_test_block(5));
        assert_eq!(cache.latest_height(), Ok(5));

        cache.insert_block(make_test_block(3));
        assert_eq!(cache.latest_height(), Ok(5));

        cache.insert_block(make_test_block(10));
        assert_eq!(cache.latest_height(), Ok(10));
    }

    #[test]
    fn test_lru_evicts_oldest_block() {
        let cache = ChainCache::new(&CacheConfig {
            block_cache_size: 2,
            receipt_cache_size: 2,
        });
        for n in 1..=3 {
            cache.insert_block(make_test_block(n));
        }
        assert!(cache.block_by_number(1).is_err());
        assert!(cache.block_by_number(3).is_ok());
    }
}
