//! Bounded pool of blocking file writers.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{ExportError, ExportResult};

/// Writer slots granted per spare CPU.
const JOBS_PER_CPU: usize = 64;

/// Runs blocking jobs with at most `size` in flight.
///
/// [`submit`](Self::submit) waits for a free slot before spawning, so memory
/// stays bounded no matter how many accounts are exported.
/// [`drain`](Self::drain) waits for everything submitted so far.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<ExportResult<()>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            tasks: JoinSet::new(),
            size,
        }
    }

    /// `(cpus - 1) * 64`, at least one CPU's worth.
    pub fn default_size() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        cpus.saturating_sub(1).max(1) * JOBS_PER_CPU
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs spawned and not yet collected by [`drain`](Self::drain).
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Queue `job`, waiting while the pool is full.
    pub async fn submit<F>(&mut self, job: F) -> ExportResult<()>
    where
        F: FnOnce() -> ExportResult<()> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ExportError::PoolClosed)?;
        self.tasks.spawn_blocking(move || {
            let _permit = permit;
            job()
        });
        Ok(())
    }

    /// Wait for every submitted job.
    ///
    /// All jobs run to completion even when one fails; the first failure is
    /// returned. On success, returns the number of jobs completed.
    pub async fn drain(&mut self) -> ExportResult<usize> {
        let mut completed = 0usize;
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => completed += 1,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Export job failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Export worker aborted");
                    first_error.get_or_insert(ExportError::Worker(e.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}
