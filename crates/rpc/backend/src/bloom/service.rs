//! Bloom bits retrieval service.
//!
//! Matcher sessions fan retrieval tasks out over one shared request queue.
//! A fixed pool of workers drains the queue: for every section of a task it
//! resolves the section head hash, reads the compressed vector from the
//! configured [`BloomSource`], and decompresses it. The filled task goes back
//! on the request's own reply channel.
//!
//! ```text
//! MatcherSession --multiplex--> RetrievalQueue --> [worker x N] --> BloomSource
//!        ^                                              |
//!        +-------------- oneshot reply <----------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use super::bitutil::{decompress_bytes, BitsetError};
use super::key::bloom_bits_key;
use super::topology::BloomSource;
use crate::error::{BackendError, BackendResult};

/// Why one section of a retrieval task could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("section {section}: block hash at height {height}: {reason}")]
    BlockHash {
        section: u64,
        height: i64,
        reason: String,
    },
    #[error("section {section}: read bloom bits: {reason}")]
    Read { section: u64, reason: String },
    #[error("section {section}: {source}")]
    Decompress { section: u64, source: BitsetError },
}

/// One bloom bit across a list of sections.
///
/// `bitsets[i]` and `errors[i]` belong to `sections[i]`; at most one of them
/// is set once the task has been served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalTask {
    pub bit: u16,
    pub sections: Vec<u64>,
    pub bitsets: Vec<Option<Vec<u8>>>,
    pub errors: Vec<Option<RetrievalError>>,
}

impl RetrievalTask {
    pub fn new(bit: u16, sections: Vec<u64>) -> Self {
        let len = sections.len();
        Self {
            bit,
            sections,
            bitsets: vec![None; len],
            errors: vec![None; len],
        }
    }

    /// First recorded section error, if any.
    pub fn first_error(&self) -> Option<&RetrievalError> {
        self.errors.iter().flatten().next()
    }
}

/// A task paired with the channel its result is delivered on.
pub struct RetrievalRequest {
    pub task: RetrievalTask,
    pub reply: oneshot::Sender<RetrievalTask>,
}

/// Sending half of the shared retrieval queue.
#[derive(Clone)]
pub struct RetrievalQueue {
    sender: mpsc::Sender<RetrievalRequest>,
}

impl RetrievalQueue {
    pub fn new(sender: mpsc::Sender<RetrievalRequest>) -> Self {
        Self { sender }
    }

    /// Submit a task and wait for the served copy.
    pub async fn retrieve(&self, task: RetrievalTask) -> BackendResult<RetrievalTask> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(RetrievalRequest { task, reply })
            .await
            .map_err(|_| BackendError::ServiceClosed)?;
        response.await.map_err(|_| BackendError::ServiceClosed)
    }
}

/// Resolves the hash of the block at a height.
#[async_trait]
pub trait BlockHashResolver: Send + Sync {
    async fn block_hash_by_height(&self, height: i64) -> BackendResult<B256>;
}

/// A log filter that scans bloom sections through the retrieval queue.
#[async_trait]
pub trait MatcherSession: Send + Sync {
    /// Issue tasks in batches of up to `batch`, waiting at most `wait` to fill
    /// a batch, until the session is done.
    async fn multiplex(&self, batch: usize, wait: Duration, queue: RetrievalQueue);
}

/// Tuning for the retrieval service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomServiceConfig {
    pub section_size: u64,
    pub start_height: i64,
    pub service_threads: usize,
    pub filter_threads: usize,
    pub retrieval_batch: usize,
    pub retrieval_wait: Duration,
}

impl Default for BloomServiceConfig {
    fn default() -> Self {
        Self {
            section_size: super::SECTION_SIZE,
            start_height: 0,
            service_threads: super::BLOOM_SERVICE_THREADS,
            filter_threads: super::BLOOM_FILTER_THREADS,
            retrieval_batch: super::BLOOM_RETRIEVAL_BATCH,
            retrieval_wait: super::BLOOM_RETRIEVAL_WAIT,
        }
    }
}

/// Height of the last block in `section`.
pub fn section_head_height(section: u64, section_size: u64, start_height: i64) -> i64 {
    let offset = section
        .saturating_add(1)
        .saturating_mul(section_size)
        .saturating_sub(1);
    i64::try_from(offset)
        .unwrap_or(i64::MAX)
        .saturating_add(start_height)
}

/// Fill every section of `task`, recording failures per section.
pub async fn serve_task<R>(
    resolver: &R,
    source: &dyn BloomSource,
    config: &BloomServiceConfig,
    mut task: RetrievalTask,
) -> RetrievalTask
where
    R: BlockHashResolver + ?Sized,
{
    let target = (config.section_size / 8) as usize;
    // Slots are rebuilt per request; callers may hand in stale or short ones.
    task.bitsets = vec![None; task.sections.len()];
    task.errors = vec![None; task.sections.len()];
    for (i, &section) in task.sections.iter().enumerate() {
        let height = section_head_height(section, config.section_size, config.start_height);
        let head = match resolver.block_hash_by_height(height).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(section, height, error = %e, "Failed to resolve section head");
                task.errors[i] = Some(RetrievalError::BlockHash {
                    section,
                    height,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let key = bloom_bits_key(task.bit, section, head);
        let compressed = match source.read_compressed(&key).await {
            Ok(compressed) => compressed,
            Err(e) => {
                tracing::warn!(section, bit = task.bit, error = %e, "Failed to read bloom bits");
                task.errors[i] = Some(RetrievalError::Read {
                    section,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match decompress_bytes(&compressed, target) {
            Ok(bitset) => task.bitsets[i] = Some(bitset),
            Err(err) => {
                task.errors[i] = Some(RetrievalError::Decompress {
                    section,
                    source: err,
                })
            }
        }
    }
    task
}

/// Running retrieval workers.
pub struct BloomHandlers {
    handles: Vec<JoinHandle<()>>,
}

impl BloomHandlers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Bloom worker panicked");
            }
        }
    }
}

/// Spawn `config.service_threads` workers draining `requests`.
///
/// Workers stop when `shutdown` flips or its sender is dropped, or when every
/// queue sender is gone. Each accepted request is answered exactly once; a
/// dropped reply receiver is ignored.
pub fn start_bloom_handlers<R>(
    resolver: Arc<R>,
    source: Arc<dyn BloomSource>,
    requests: mpsc::Receiver<RetrievalRequest>,
    shutdown: watch::Receiver<bool>,
    config: BloomServiceConfig,
) -> BloomHandlers
where
    R: BlockHashResolver + ?Sized + 'static,
{
    let shared_rx = Arc::new(Mutex::new(requests));
    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(config.service_threads);

    for worker in 0..config.service_threads {
        let rx = Arc::clone(&shared_rx);
        let resolver = Arc::clone(&resolver);
        let source = Arc::clone(&source);
        let config = Arc::clone(&config);
        let mut shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let request = tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    request = async { rx.lock().await.recv().await } => request,
                };
                let Some(request) = request else { break };

                let served =
                    serve_task(resolver.as_ref(), source.as_ref(), &config, request.task).await;
                let _ = request.reply.send(served);
            }
            tracing::debug!(worker, "Bloom worker stopped");
        }));
    }

    tracing::info!(workers = handles.len(), "Bloom retrieval workers started");
    BloomHandlers { handles }
}

/// Start `config.filter_threads` multiplexers for `session` on the queue.
pub fn service_filter<M>(
    session: Arc<M>,
    queue: RetrievalQueue,
    config: &BloomServiceConfig,
) -> Vec<JoinHandle<()>>
where
    M: MatcherSession + ?Sized + 'static,
{
    (0..config.filter_threads)
        .map(|_| {
            let session = Arc::clone(&session);
            let queue = queue.clone();
            let batch = config.retrieval_batch;
            let wait = config.retrieval_wait;
            tokio::spawn(async move { session.multiplex(batch, wait, queue).await })
        })
        .collect()
}
