//! Section-indexed bloom bits: storage, compression, and the retrieval service.

use std::time::Duration;

pub mod bitutil;
pub mod generator;
pub mod key;
pub mod service;
pub mod store;
pub mod topology;

pub use bitutil::{compress_bytes, decompress_bytes, BitsetError};
pub use generator::{SectionGenerator, BLOOM_BIT_LENGTH, BLOOM_BYTE_LENGTH};
pub use key::bloom_bits_key;
pub use service::{
    section_head_height, serve_task, service_filter, start_bloom_handlers, BlockHashResolver,
    BloomHandlers, BloomServiceConfig, MatcherSession, RetrievalError, RetrievalQueue,
    RetrievalRequest, RetrievalTask,
};
pub use store::{commit_section, BloomBitsStore, MemoryBloomStore, SqliteBloomStore};
pub use topology::{bloom_source, BloomSource, BloomTopology, EmbeddedBloomSource, RemoteBloomSource};

/// Blocks per bloom bits section.
pub const SECTION_SIZE: u64 = 4096;
/// Retrieval workers started by the backend.
pub const BLOOM_SERVICE_THREADS: usize = 16;
/// Multiplexers started per filter session.
pub const BLOOM_FILTER_THREADS: usize = 3;
/// Maximum tasks a multiplexer batches together.
pub const BLOOM_RETRIEVAL_BATCH: usize = 16;
/// Maximum time a multiplexer waits to fill a batch.
pub const BLOOM_RETRIEVAL_WAIT: Duration = Duration::ZERO;

/// Section geometry and indexing progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomStatus {
    pub section_size: u64,
    pub sections: u64,
}
