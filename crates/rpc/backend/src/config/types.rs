//! Configuration types for the query backend.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::bloom::{
    BloomServiceConfig, BloomTopology, BLOOM_FILTER_THREADS, BLOOM_RETRIEVAL_BATCH,
    BLOOM_SERVICE_THREADS, SECTION_SIZE,
};
use crate::cache::CacheConfig;

/// Root configuration for a backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub bloom: BloomConfig,

    /// Request-rate limits by API name.
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Chain-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    /// Height of the first block this chain produced.
    #[serde(default)]
    pub start_height: i64,

    /// Gas limit reported on blocks built from consensus records.
    #[serde(default = "ChainConfig::default_block_gas_limit")]
    pub block_gas_limit: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            block_gas_limit: Self::default_block_gas_limit(),
        }
    }
}

impl ChainConfig {
    const fn default_block_gas_limit() -> u64 {
        u32::MAX as u64
    }
}

/// Bloom bits index and retrieval service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BloomConfig {
    #[serde(default = "BloomConfig::default_section_size")]
    pub section_size: u64,

    #[serde(default = "BloomConfig::default_service_threads")]
    pub service_threads: usize,

    #[serde(default = "BloomConfig::default_filter_threads")]
    pub filter_threads: usize,

    #[serde(default = "BloomConfig::default_retrieval_batch")]
    pub retrieval_batch: usize,

    #[serde(default)]
    pub retrieval_wait_ms: u64,

    #[serde(default)]
    pub topology: BloomTopology,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            section_size: Self::default_section_size(),
            service_threads: Self::default_service_threads(),
            filter_threads: Self::default_filter_threads(),
            retrieval_batch: Self::default_retrieval_batch(),
            retrieval_wait_ms: 0,
            topology: BloomTopology::default(),
        }
    }
}

impl BloomConfig {
    const fn default_section_size() -> u64 {
        SECTION_SIZE
    }

    const fn default_service_threads() -> usize {
        BLOOM_SERVICE_THREADS
    }

    const fn default_filter_threads() -> usize {
        BLOOM_FILTER_THREADS
    }

    const fn default_retrieval_batch() -> usize {
        BLOOM_RETRIEVAL_BATCH
    }

    /// Settings for the retrieval service on a chain starting at `start_height`.
    pub fn service_config(&self, start_height: i64) -> BloomServiceConfig {
        BloomServiceConfig {
            section_size: self.section_size,
            start_height,
            service_threads: self.service_threads,
            filter_threads: self.filter_threads,
            retrieval_batch: self.retrieval_batch,
            retrieval_wait: Duration::from_millis(self.retrieval_wait_ms),
        }
    }
}

/// Token bucket parameters for one API.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub per_second: f64,

    /// Bucket capacity. Defaults to one second of traffic.
    #[serde(default)]
    pub burst: Option<u32>,
}

impl RateLimitConfig {
    pub fn burst_or_default(&self) -> u32 {
        self.burst
            .unwrap_or_else(|| self.per_second.ceil().clamp(1.0, u32::MAX as f64) as u32)
    }
}

/// Genesis export tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Concurrent file writers. Derived from the CPU count when unset.
    #[serde(default)]
    pub workers: Option<usize>,
}
