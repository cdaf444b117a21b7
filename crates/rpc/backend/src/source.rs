//! The two data sources every backend read is resolved against.
//!
//! A [`LocalCacheSource`] is consulted first. Any error from it, including
//! [`SourceError::NotFound`](crate::SourceError::NotFound), sends the resolver
//! to the [`AuthoritativeSource`], whose answer is final.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;

use crate::consensus::{ConsensusBlock, TxResponse, TxResult, UnconfirmedTxs};
use crate::error::SourceResult;
use crate::types::{StoredBlock, StoredReceipt};

/// Fast, locally maintained projection of recently executed chain state.
///
/// All methods are synchronous; implementations are expected to be in-process.
pub trait LocalCacheSource: Send + Sync {
    /// Highest height the projection has committed.
    fn latest_height(&self) -> SourceResult<u64>;

    fn block_by_number(&self, number: u64) -> SourceResult<Arc<StoredBlock>>;

    fn block_by_hash(&self, hash: B256) -> SourceResult<Arc<StoredBlock>>;

    fn block_hash_by_number(&self, number: u64) -> SourceResult<B256>;

    fn transaction_receipt(&self, tx_hash: B256) -> SourceResult<Arc<StoredReceipt>>;

    /// Persist a receipt the resolver reconstructed from the authoritative source.
    fn commit_receipt(&self, receipt: StoredReceipt) -> SourceResult<()>;
}

/// Canonical interface to committed chain state and the mempool.
///
/// The client behind it is shared by every caller and must be reentrant.
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    /// Path-addressed structured query, `custom/<module>/<type>/<param>`.
    async fn query(&self, path: &str) -> SourceResult<Bytes>;

    /// Last committed height reported by the chain info endpoint.
    async fn latest_height(&self) -> SourceResult<i64>;

    async fn block(&self, height: i64) -> SourceResult<ConsensusBlock>;

    /// Per-transaction execution results for a block, in block order.
    async fn block_results(&self, height: i64) -> SourceResult<Vec<TxResult>>;

    async fn tx(&self, hash: B256) -> SourceResult<TxResponse>;

    /// Unconfirmed pool entries; `None` means no limit.
    async fn unconfirmed_txs(&self, limit: Option<usize>) -> SourceResult<UnconfirmedTxs>;

    async fn user_unconfirmed_txs(
        &self,
        address: Address,
        limit: Option<usize>,
    ) -> SourceResult<UnconfirmedTxs>;

    async fn user_unconfirmed_tx_count(&self, address: Address) -> SourceResult<usize>;

    async fn unconfirmed_tx_by_hash(&self, hash: B256) -> SourceResult<Bytes>;
}
