//! The backend resolver.
//!
//! Every read consults the local cache first. Any cache error, not-found
//! included, falls back to the authoritative source, and only the
//! authoritative error is ever surfaced.

use std::sync::Arc;

use alloy_primitives::{Address, Bloom, Bytes, B256};
use async_trait::async_trait;
use exrpc_rpc_types::{BlockNumber, RpcBlock, RpcHeader, RpcLog, RpcTransaction};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bloom::{
    service_filter, start_bloom_handlers, BlockHashResolver, BloomHandlers, BloomServiceConfig,
    BloomSource, BloomStatus, MatcherSession, RetrievalQueue, RetrievalRequest,
};
use crate::config::{BackendConfig, ChainConfig};
use crate::consensus::{ConsensusBlock, ExecutionResult};
use crate::convert::{preceding_gas_used, receipt_from_result, rpc_block_from_consensus, TxLocation};
use crate::error::BackendResult;
use crate::evm_tx::{decode_pool_entry, DecodeOutcome, EvmTransaction};
use crate::query::{decode_json, hash_from_bytes, QueryBlockNumber, QueryBloomFilter, QueryRoute};
use crate::rate_limit::{RateLimiter, RateLimiterRegistry};
use crate::source::{AuthoritativeSource, LocalCacheSource};
use crate::types::{StoredBlock, StoredReceipt};

/// Ethereum-compatible read accessors.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current height: the reported tip minus one, never below zero.
    async fn block_number(&self) -> BackendResult<u64>;

    /// Last committed height as reported by the authoritative source.
    async fn latest_block_number(&self) -> BackendResult<i64>;

    async fn block_height_by_hash(&self, hash: B256) -> BackendResult<i64>;

    async fn block_hash_by_height(&self, height: i64) -> BackendResult<B256>;

    /// `None` when the authoritative source cannot produce the block.
    async fn get_block_by_number(
        &self,
        number: BlockNumber,
        full_transactions: bool,
    ) -> BackendResult<Option<RpcBlock>>;

    /// `None` when the authoritative source cannot produce the block.
    async fn get_block_by_hash(
        &self,
        hash: B256,
        full_transactions: bool,
    ) -> BackendResult<Option<RpcBlock>>;

    async fn header_by_number(&self, number: BlockNumber) -> BackendResult<RpcHeader>;

    async fn header_by_hash(&self, hash: B256) -> BackendResult<RpcHeader>;

    /// Logs of every transaction in a block, one list per transaction.
    async fn get_logs(&self, block_hash: B256) -> BackendResult<Vec<Vec<RpcLog>>>;

    async fn get_transaction_logs(&self, tx_hash: B256) -> BackendResult<Vec<RpcLog>>;

    async fn pending_transactions(&self) -> BackendResult<Vec<RpcTransaction>>;

    async fn pending_transaction_count(&self) -> BackendResult<usize>;

    async fn user_pending_transactions(
        &self,
        address: Address,
        limit: Option<usize>,
    ) -> BackendResult<Vec<RpcTransaction>>;

    async fn user_pending_transactions_count(&self, address: Address) -> BackendResult<usize>;

    /// `None` when the pool entry is not an EVM transaction.
    async fn pending_transaction_by_hash(&self, hash: B256)
        -> BackendResult<Option<RpcTransaction>>;

    async fn bloom_status(&self) -> BloomStatus;

    /// Start the multiplexers of a filter session on the retrieval queue.
    fn service_filter(&self, session: Arc<dyn MatcherSession>) -> Vec<JoinHandle<()>>;

    /// Stop the bloom retrieval workers. Cannot be undone.
    fn close(&self);

    /// Limiter for an API name; `None` means unlimited.
    fn rate_limiter(&self, name: &str) -> Option<Arc<RateLimiter>>;
}

/// Backend resolving against a local cache `L` and an authoritative source `A`.
pub struct EvmBackend<L, A> {
    local: Arc<L>,
    authoritative: Arc<A>,
    bloom: Arc<dyn BloomSource>,
    chain: ChainConfig,
    bloom_config: BloomServiceConfig,
    requests: mpsc::Sender<RetrievalRequest>,
    /// Receiving end of `requests`, taken by the first handler start.
    pending_requests: Mutex<Option<mpsc::Receiver<RetrievalRequest>>>,
    shutdown: watch::Sender<bool>,
    rate_limiters: RateLimiterRegistry,
}

impl<L, A> EvmBackend<L, A>
where
    L: LocalCacheSource + 'static,
    A: AuthoritativeSource + 'static,
{
    pub fn new(
        local: Arc<L>,
        authoritative: Arc<A>,
        bloom: Arc<dyn BloomSource>,
        config: &BackendConfig,
    ) -> Self {
        let bloom_config = config.bloom.service_config(config.chain.start_height);
        let (requests, receiver) = mpsc::channel(bloom_config.service_threads.max(1));
        let (shutdown, _) = watch::channel(false);

        Self {
            local,
            authoritative,
            bloom,
            chain: config.chain.clone(),
            bloom_config,
            requests,
            pending_requests: Mutex::new(Some(receiver)),
            shutdown,
            rate_limiters: RateLimiterRegistry::from_config(&config.rate_limits),
        }
    }

    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    pub fn authoritative(&self) -> &Arc<A> {
        &self.authoritative
    }

    /// Handle for submitting retrieval tasks directly.
    pub fn retrieval_queue(&self) -> RetrievalQueue {
        RetrievalQueue::new(self.requests.clone())
    }

    /// Start the bloom retrieval workers.
    ///
    /// Returns `None` if they were already started.
    pub fn start_bloom_handlers(self: &Arc<Self>) -> Option<BloomHandlers> {
        let receiver = self.pending_requests.lock().take()?;
        Some(start_bloom_handlers(
            Arc::clone(self),
            Arc::clone(&self.bloom),
            receiver,
            self.shutdown.subscribe(),
            self.bloom_config.clone(),
        ))
    }

    async fn resolve_height(&self, number: BlockNumber) -> BackendResult<i64> {
        if number.is_tip() {
            Ok(self.block_number().await? as i64)
        } else {
            Ok(number.as_i64())
        }
    }

    fn cached_block_by_number(&self, height: i64) -> Option<Arc<StoredBlock>> {
        let number = u64::try_from(height).ok()?;
        match self.local.block_by_number(number) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::debug!(height, error = %e, "Block not in local cache");
                None
            }
        }
    }

    fn cached_block_by_hash(&self, hash: B256) -> Option<Arc<StoredBlock>> {
        match self.local.block_by_hash(hash) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::debug!(%hash, error = %e, "Block not in local cache");
                None
            }
        }
    }

    async fn query(&self, route: QueryRoute) -> BackendResult<Bytes> {
        Ok(self.authoritative.query(&route.path()).await?)
    }

    async fn query_height_by_hash(&self, hash: B256) -> BackendResult<i64> {
        let payload = self.query(QueryRoute::HashToHeight(hash)).await?;
        let out: QueryBlockNumber = decode_json("block number", &payload)?;
        Ok(out.number)
    }

    async fn query_bloom(&self, height: i64) -> BackendResult<Bloom> {
        let payload = self.query(QueryRoute::Bloom(height)).await?;
        let out: QueryBloomFilter = decode_json("bloom filter", &payload)?;
        Ok(out.bloom)
    }

    async fn block_from_stored(
        &self,
        block: &StoredBlock,
        full_transactions: bool,
    ) -> BackendResult<RpcBlock> {
        let bloom = match block.logs_bloom {
            Some(bloom) => bloom,
            None => self.query_bloom(block.number as i64).await?,
        };
        Ok(block.to_rpc_block(bloom, full_transactions))
    }

    async fn block_from_consensus(
        &self,
        block: &ConsensusBlock,
        full_transactions: bool,
    ) -> BackendResult<RpcBlock> {
        let bloom = self.query_bloom(block.header.height).await?;
        Ok(rpc_block_from_consensus(
            block,
            bloom,
            self.chain.block_gas_limit,
            full_transactions,
        ))
    }

    /// Fetch a block from the authoritative source, treating failure as absence.
    async fn fetch_block(
        &self,
        height: i64,
        full_transactions: bool,
    ) -> BackendResult<Option<RpcBlock>> {
        let block = match self.authoritative.block(height).await {
            Ok(block) => block,
            Err(e) => {
                tracing::debug!(height, error = %e, "Authoritative block fetch failed");
                return Ok(None);
            }
        };
        self.block_from_consensus(&block, full_transactions)
            .await
            .map(Some)
    }

    async fn header_at(&self, height: i64) -> BackendResult<RpcHeader> {
        if let Some(block) = self.cached_block_by_number(height) {
            return Ok(self.block_from_stored(&block, false).await?.header());
        }
        let block = self.authoritative.block(height).await?;
        Ok(self.block_from_consensus(&block, false).await?.header())
    }

    async fn resolve_block_hash(&self, height: i64) -> BackendResult<B256> {
        if let Ok(number) = u64::try_from(height) {
            match self.local.block_hash_by_number(number) {
                Ok(hash) => return Ok(hash),
                Err(e) => tracing::debug!(height, error = %e, "Block hash not in local cache"),
            }
        }
        let payload = self.query(QueryRoute::HeightToHash(height)).await?;
        Ok(hash_from_bytes(&payload))
    }

    /// Rebuild and cache the receipt of a committed transaction.
    ///
    /// `None` when the authoritative source cannot locate the transaction.
    async fn reconstruct_receipt(&self, tx_hash: B256) -> BackendResult<Option<StoredReceipt>> {
        let response = match self.authoritative.tx(tx_hash).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(tx = %tx_hash, error = %e, "Transaction not found");
                return Ok(None);
            }
        };

        let block = self.authoritative.block(response.height).await?;
        let tx = EvmTransaction::decode(&response.tx)?;

        let mut cumulative_gas_used = response.result.gas_used;
        if response.index != 0 {
            let results = self.authoritative.block_results(response.height).await?;
            cumulative_gas_used = cumulative_gas_used
                .saturating_add(preceding_gas_used(&results, response.index as usize));
        }

        let location = TxLocation {
            tx_hash,
            block_hash: block.hash,
            block_number: u64::try_from(response.height).unwrap_or_default(),
            index: response.index,
        };
        let receipt = receipt_from_result(&tx, location, &response.result, cumulative_gas_used);
        if let Err(e) = self.local.commit_receipt(receipt.clone()) {
            tracing::warn!(tx = %tx_hash, error = %e, "Failed to cache reconstructed receipt");
        }
        Ok(Some(receipt))
    }

    fn decode_pending(&self, txs: &[Bytes]) -> Vec<RpcTransaction> {
        txs.iter()
            .filter_map(|raw| match decode_pool_entry(raw) {
                DecodeOutcome::Decoded(tx) => Some(tx.to_rpc(B256::ZERO, 0, 0)),
                DecodeOutcome::Skipped(reason) => {
                    tracing::debug!(%reason, "Skipping non-EVM pool entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl<L, A> Backend for EvmBackend<L, A>
where
    L: LocalCacheSource + 'static,
    A: AuthoritativeSource + 'static,
{
    async fn block_number(&self) -> BackendResult<u64> {
        let tip = match self.local.latest_height() {
            Ok(height) => i64::try_from(height).unwrap_or(i64::MAX),
            Err(e) => {
                tracing::debug!(error = %e, "Latest height not in local cache");
                self.authoritative.latest_height().await?
            }
        };
        // The tip block may still be executing locally.
        Ok(tip.saturating_sub(1).max(0) as u64)
    }

    async fn latest_block_number(&self) -> BackendResult<i64> {
        Ok(self.authoritative.latest_height().await?)
    }

    async fn block_height_by_hash(&self, hash: B256) -> BackendResult<i64> {
        if let Some(block) = self.cached_block_by_hash(hash) {
            return Ok(block.number as i64);
        }
        self.query_height_by_hash(hash).await
    }

    async fn block_hash_by_height(&self, height: i64) -> BackendResult<B256> {
        self.resolve_block_hash(height).await
    }

    async fn get_block_by_number(
        &self,
        number: BlockNumber,
        full_transactions: bool,
    ) -> BackendResult<Option<RpcBlock>> {
        let height = self.resolve_height(number).await?;
        if let Some(block) = self.cached_block_by_number(height) {
            return self.block_from_stored(&block, full_transactions).await.map(Some);
        }
        self.fetch_block(height, full_transactions).await
    }

    async fn get_block_by_hash(
        &self,
        hash: B256,
        full_transactions: bool,
    ) -> BackendResult<Option<RpcBlock>> {
        if let Some(block) = self.cached_block_by_hash(hash) {
            return self.block_from_stored(&block, full_transactions).await.map(Some);
        }
        let height = self.query_height_by_hash(hash).await?;
        self.fetch_block(height, full_transactions).await
    }

    async fn header_by_number(&self, number: BlockNumber) -> BackendResult<RpcHeader> {
        let height = self.resolve_height(number).await?;
        self.header_at(height).await
    }

    async fn header_by_hash(&self, hash: B256) -> BackendResult<RpcHeader> {
        if let Some(block) = self.cached_block_by_hash(hash) {
            return Ok(self.block_from_stored(&block, false).await?.header());
        }
        let height = self.query_height_by_hash(hash).await?;
        self.header_at(height).await
    }

    async fn get_logs(&self, block_hash: B256) -> BackendResult<Vec<Vec<RpcLog>>> {
        let Some(block) = self.get_block_by_hash(block_hash, false).await? else {
            return Ok(Vec::new());
        };

        let tx_hashes = block.transactions.hashes();
        let mut block_logs = Vec::with_capacity(tx_hashes.len());
        for tx_hash in tx_hashes {
            if let Ok(receipt) = self.local.transaction_receipt(tx_hash) {
                block_logs.push(receipt.rpc_logs());
                continue;
            }
            match self.reconstruct_receipt(tx_hash).await? {
                Some(receipt) => block_logs.push(receipt.rpc_logs()),
                None => {
                    // One unlocatable transaction empties the whole result.
                    // Callers cannot tell this apart from a block without logs.
                    tracing::warn!(block = %block_hash, tx = %tx_hash, "Dropping block logs");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(block_logs)
    }

    async fn get_transaction_logs(&self, tx_hash: B256) -> BackendResult<Vec<RpcLog>> {
        if let Ok(receipt) = self.local.transaction_receipt(tx_hash) {
            return Ok(receipt.rpc_logs());
        }
        let response = self.authoritative.tx(tx_hash).await?;
        let execution = ExecutionResult::decode(&response.result.data)?;
        Ok(execution.logs)
    }

    async fn pending_transactions(&self) -> BackendResult<Vec<RpcTransaction>> {
        let pool = self.authoritative.unconfirmed_txs(None).await?;
        Ok(self.decode_pending(&pool.txs))
    }

    async fn pending_transaction_count(&self) -> BackendResult<usize> {
        Ok(self.authoritative.unconfirmed_txs(None).await?.count)
    }

    async fn user_pending_transactions(
        &self,
        address: Address,
        limit: Option<usize>,
    ) -> BackendResult<Vec<RpcTransaction>> {
        let pool = self
            .authoritative
            .user_unconfirmed_txs(address, limit)
            .await?;
        Ok(self.decode_pending(&pool.txs))
    }

    async fn user_pending_transactions_count(&self, address: Address) -> BackendResult<usize> {
        Ok(self.authoritative.user_unconfirmed_tx_count(address).await?)
    }

    async fn pending_transaction_by_hash(
        &self,
        hash: B256,
    ) -> BackendResult<Option<RpcTransaction>> {
        let raw = self.authoritative.unconfirmed_tx_by_hash(hash).await?;
        Ok(self.decode_pending(std::slice::from_ref(&raw)).pop())
    }

    async fn bloom_status(&self) -> BloomStatus {
        let sections = match self.bloom.indexed_sections().await {
            Ok(sections) => sections,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read indexed bloom sections");
                0
            }
        };
        BloomStatus {
            section_size: self.bloom_config.section_size,
            sections,
        }
    }

    fn service_filter(&self, session: Arc<dyn MatcherSession>) -> Vec<JoinHandle<()>> {
        service_filter(session, self.retrieval_queue(), &self.bloom_config)
    }

    fn close(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("Bloom retrieval shutdown requested");
    }

    fn rate_limiter(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.rate_limiters.get(name)
    }
}

#[async_trait]
impl<L, A> BlockHashResolver for EvmBackend<L, A>
where
    L: LocalCacheSource + 'static,
    A: AuthoritativeSource + 'static,
{
    async fn block_hash_by_height(&self, height: i64) -> BackendResult<B256> {
        self.resolve_block_hash(height).await
    }
}
