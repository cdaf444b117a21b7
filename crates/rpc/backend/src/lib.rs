//! Query resolution for Ethereum-compatible reads over a non-Ethereum chain.
//!
//! Every read is answered cache-first: the local projection written by the
//! indexer is consulted, and any miss or failure falls back to the
//! authoritative consensus/state source. Historical log search is served by a
//! worker pool that reads section-indexed bloom bit vectors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                RPC transport (external)              │
//! └───────────────────────┬─────────────────────────────┘
//!                         │
//!           ┌─────────────▼─────────────┐
//!           │         Backend           │
//!           │       (EvmBackend)        │
//!           └──┬──────────┬──────────┬──┘
//!              │          │          │
//!              ▼          ▼          ▼
//! ┌──────────────┐ ┌────────────┐ ┌──────────────────┐
//! │ LocalCache   │ │ Authorit-  │ │ Bloom retrieval  │
//! │ Source       │ │ ative      │ │ workers          │
//! │ (ChainCache) │ │ Source     │ │ (BloomSource)    │
//! └──────────────┘ └────────────┘ └──────────────────┘
//! ```

pub mod backend;
pub mod bloom;
pub mod cache;
pub mod config;
pub mod consensus;
pub mod convert;
pub mod error;
pub mod evm_tx;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod query;
pub mod rate_limit;
pub mod source;
pub mod types;

pub use backend::{Backend, EvmBackend};
pub use bloom::BloomStatus;
pub use cache::{CacheConfig, ChainCache};
pub use config::{load_config, load_config_from_str, BackendConfig};
pub use error::{BackendError, BackendResult, ConfigError, SourceError, SourceResult};
pub use evm_tx::{decode_pool_entry, DecodeOutcome, EvmTransaction};
pub use rate_limit::{RateLimiter, RateLimiterRegistry};
pub use source::{AuthoritativeSource, LocalCacheSource};
pub use types::*;
