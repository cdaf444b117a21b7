//! In-memory authoritative source for tests.
//!
//! Built for this crate's unit tests and, with the `test-utils` feature, for
//! integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::consensus::{consensus_tx_hash, ConsensusBlock, TxResponse, TxResult, UnconfirmedTxs};
use crate::error::{SourceError, SourceResult};
use crate::source::AuthoritativeSource;

#[derive(Default)]
struct MockState {
    queries: BTreeMap<String, Bytes>,
    latest_height: Option<i64>,
    blocks: BTreeMap<i64, ConsensusBlock>,
    block_results: BTreeMap<i64, Vec<TxResult>>,
    txs: BTreeMap<B256, TxResponse>,
    pool: Vec<Bytes>,
    user_pools: BTreeMap<Address, Vec<Bytes>>,
}

/// Authoritative source answering from maps filled by the caller.
///
/// Anything not inserted reports [`SourceError::NotFound`]. A failure armed
/// with [`fail_next`](Self::fail_next) is returned by the next call instead.
#[derive(Default)]
pub struct MockAuthoritativeSource {
    state: Mutex<MockState>,
    failure: Mutex<Option<SourceError>>,
    calls: AtomicUsize,
}

impl MockAuthoritativeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_query(&self, path: impl Into<String>, payload: impl Into<Bytes>) {
        self.state.lock().queries.insert(path.into(), payload.into());
    }

    pub fn set_latest_height(&self, height: i64) {
        self.state.lock().latest_height = Some(height);
    }

    pub fn insert_block(&self, block: ConsensusBlock) {
        self.state.lock().blocks.insert(block.header.height, block);
    }

    pub fn insert_block_results(&self, height: i64, results: Vec<TxResult>) {
        self.state.lock().block_results.insert(height, results);
    }

    pub fn insert_tx(&self, response: TxResponse) {
        self.state.lock().txs.insert(response.hash, response);
    }

    pub fn set_pool(&self, txs: Vec<Bytes>) {
        self.state.lock().pool = txs;
    }

    pub fn set_user_pool(&self, address: Address, txs: Vec<Bytes>) {
        self.state.lock().user_pools.insert(address, txs);
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: SourceError) {
        *self.failure.lock() = Some(error);
    }

    /// Calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> SourceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn pool_view(txs: &[Bytes], limit: Option<usize>) -> UnconfirmedTxs {
    let taken: Vec<Bytes> = txs
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    UnconfirmedTxs {
        count: taken.len(),
        total: txs.len(),
        txs: taken,
    }
}

#[async_trait]
impl AuthoritativeSource for MockAuthoritativeSource {
    async fn query(&self, path: &str) -> SourceResult<Bytes> {
        self.take_failure()?;
        self.state
            .lock()
            .queries
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::not_found(path))
    }

    async fn latest_height(&self) -> SourceResult<i64> {
        self.take_failure()?;
        self.state
            .lock()
            .latest_height
            .ok_or_else(|| SourceError::not_found("chain info"))
    }

    async fn block(&self, height: i64) -> SourceResult<ConsensusBlock> {
        self.take_failure()?;
        self.state
            .lock()
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("block {height}")))
    }

    async fn block_results(&self, height: i64) -> SourceResult<Vec<TxResult>> {
        self.take_failure()?;
        self.state
            .lock()
            .block_results
            .get(&height)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("block results {height}")))
    }

    async fn tx(&self, hash: B256) -> SourceResult<TxResponse> {
        self.take_failure()?;
        self.state
            .lock()
            .txs
            .get(&hash)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("tx {hash}")))
    }

    async fn unconfirmed_txs(&self, limit: Option<usize>) -> SourceResult<UnconfirmedTxs> {
        self.take_failure()?;
        Ok(pool_view(&self.state.lock().pool, limit))
    }

    async fn user_unconfirmed_txs(
        &self,
        address: Address,
        limit: Option<usize>,
    ) -> SourceResult<UnconfirmedTxs> {
        self.take_failure()?;
        let state = self.state.lock();
        let txs = state.user_pools.get(&address).map(Vec::as_slice).unwrap_or_default();
        Ok(pool_view(txs, limit))
    }

    async fn user_unconfirmed_tx_count(&self, address: Address) -> SourceResult<usize> {
        self.take_failure()?;
        Ok(self
            .state
            .lock()
            .user_pools
            .get(&address)
            .map_or(0, Vec::len))
    }

    async fn unconfirmed_tx_by_hash(&self, hash: B256) -> SourceResult<Bytes> {
        self.take_failure()?;
        self.state
            .lock()
            .pool
            .iter()
            .find(|raw| consensus_tx_hash(raw) == hash)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("pending tx {hash}")))
    }
}
