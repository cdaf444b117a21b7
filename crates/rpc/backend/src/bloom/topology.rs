//! Where compressed bloom vectors are read from.
//!
//! An embedded node runs the bloom indexer in process and reads its store
//! directly. A remote node asks the authoritative source over structured
//! queries. The backend picks one [`BloomSource`] at construction.

use std::sync::Arc;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use serde::Deserialize;

use super::store::BloomBitsStore;
use crate::error::{BackendError, BackendResult, SourceError};
use crate::query::{decode_json, QueryRoute};
use crate::source::AuthoritativeSource;

/// Deployment topology of the bloom indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomTopology {
    /// Indexer runs in this process.
    #[default]
    Embedded,
    /// Indexer is reached through the authoritative source.
    Remote,
}

/// Read access to indexed bloom sections.
#[async_trait]
pub trait BloomSource: Send + Sync {
    /// Number of fully indexed sections.
    async fn indexed_sections(&self) -> BackendResult<u64>;

    /// Compressed vector stored under a bloom bits key.
    async fn read_compressed(&self, key: &Bytes) -> BackendResult<Vec<u8>>;
}

/// Reads from a store written by the in-process indexer.
pub struct EmbeddedBloomSource {
    store: Arc<dyn BloomBitsStore>,
}

impl EmbeddedBloomSource {
    pub fn new(store: Arc<dyn BloomBitsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BloomSource for EmbeddedBloomSource {
    async fn indexed_sections(&self) -> BackendResult<u64> {
        self.store.stored_sections()
    }

    async fn read_compressed(&self, key: &Bytes) -> BackendResult<Vec<u8>> {
        self.store
            .get(key)?
            .ok_or_else(|| SourceError::not_found(format!("bloom bits {key}")).into())
    }
}

/// Reads through `bloombits` and `section` queries.
pub struct RemoteBloomSource<A> {
    authoritative: Arc<A>,
}

impl<A: AuthoritativeSource> RemoteBloomSource<A> {
    pub fn new(authoritative: Arc<A>) -> Self {
        Self { authoritative }
    }
}

#[async_trait]
impl<A: AuthoritativeSource> BloomSource for RemoteBloomSource<A> {
    async fn indexed_sections(&self) -> BackendResult<u64> {
        let payload = self.authoritative.query(&QueryRoute::Section.path()).await?;
        decode_json("section count", &payload)
    }

    async fn read_compressed(&self, key: &Bytes) -> BackendResult<Vec<u8>> {
        let route = QueryRoute::BloomBits(key.clone());
        let payload = self.authoritative.query(&route.path()).await?;
        Ok(payload.to_vec())
    }
}

/// Build the bloom source for `topology`.
///
/// The embedded topology needs the local store; the remote one ignores it.
pub fn bloom_source<A: AuthoritativeSource + 'static>(
    topology: BloomTopology,
    authoritative: Arc<A>,
    store: Option<Arc<dyn BloomBitsStore>>,
) -> BackendResult<Arc<dyn BloomSource>> {
    match topology {
        BloomTopology::Embedded => {
            let store = store.ok_or_else(|| {
                BackendError::Store("embedded bloom topology requires a local store".to_string())
            })?;
            Ok(Arc::new(EmbeddedBloomSource::new(store)))
        }
        BloomTopology::Remote => Ok(Arc::new(RemoteBloomSource::new(authoritative))),
    }
}
