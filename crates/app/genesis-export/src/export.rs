//! Whole-state export and import.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ExportError, ExportResult};
use crate::files::{
    address_from_file_name, hash_from_file_name, read_code, read_storage, read_tx_logs,
    write_account_code, write_account_storage, write_tx_logs,
};
use crate::layout::{path_exists, ExportLayout};
use crate::pool::WorkerPool;
use crate::snapshot::{EvmStateReader, StateSnapshot};

/// Files produced by one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub accounts: usize,
    pub code_files: usize,
    pub storage_files: usize,
    pub tx_log_files: usize,
}

#[derive(Default)]
struct Counters {
    code_files: AtomicUsize,
    storage_files: AtomicUsize,
    tx_log_files: AtomicUsize,
}

/// Export every account's code and storage, then every transaction's logs.
///
/// The target directory is wiped first. Each file is written by its own pool
/// job; the first failing job fails the export once all jobs have finished.
pub async fn export_state<R>(
    reader: Arc<R>,
    layout: &ExportLayout,
    pool: &mut WorkerPool,
) -> ExportResult<ExportSummary>
where
    R: EvmStateReader + 'static,
{
    layout.prepare()?;
    let counters = Arc::new(Counters::default());
    let accounts = reader.accounts();

    tracing::info!(
        root = %layout.root().display(),
        accounts = accounts.len(),
        workers = pool.size(),
        "Exporting EVM state"
    );

    for address in &accounts {
        let address = *address;

        let (code_reader, code_layout, code_counters) =
            (Arc::clone(&reader), layout.clone(), Arc::clone(&counters));
        pool.submit(move || {
            let code = code_reader.code(&address)?;
            if write_account_code(&code_layout, &address, &code)? {
                code_counters.code_files.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })
        .await?;

        let (storage_reader, storage_layout, storage_counters) =
            (Arc::clone(&reader), layout.clone(), Arc::clone(&counters));
        pool.submit(move || {
            let slots = storage_reader.storage(&address)?;
            if write_account_storage(&storage_layout, &address, slots)? > 0 {
                storage_counters.storage_files.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })
        .await?;
    }

    for hash in reader.tx_log_hashes() {
        let (logs_reader, logs_layout, logs_counters) =
            (Arc::clone(&reader), layout.clone(), Arc::clone(&counters));
        pool.submit(move || {
            let logs = logs_reader.tx_logs(&hash)?;
            write_tx_logs(&logs_layout, &hash, &logs)?;
            logs_counters.tx_log_files.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .await?;
    }

    let jobs = pool.drain().await?;
    let summary = ExportSummary {
        accounts: accounts.len(),
        code_files: counters.code_files.load(Ordering::Relaxed),
        storage_files: counters.storage_files.load(Ordering::Relaxed),
        tx_log_files: counters.tx_log_files.load(Ordering::Relaxed),
    };
    tracing::info!(jobs, ?summary, "Export complete");
    Ok(summary)
}

/// Rebuild state from an export directory.
///
/// Missing sub-directories are treated as empty. Accounts are keyed by the
/// address in each file name.
pub fn import_state(layout: &ExportLayout) -> ExportResult<StateSnapshot> {
    if !path_exists(layout.root()) {
        return Err(ExportError::MissingDirectory(layout.root().to_path_buf()));
    }

    let mut snapshot = StateSnapshot::default();

    for (name, path) in dir_files(&layout.code_dir())? {
        let address = address_from_file_name(&name)?;
        snapshot.account_mut(address).code = read_code(&path)?;
    }

    for (name, path) in dir_files(&layout.storage_dir())? {
        let address = address_from_file_name(&name)?;
        let account = snapshot.account_mut(address);
        account.storage.extend(read_storage(&path)?);
    }

    for (name, path) in dir_files(&layout.txlogs_dir())? {
        let hash = hash_from_file_name(&name)?;
        snapshot.tx_logs.insert(hash, read_tx_logs(&path)?);
    }

    tracing::info!(
        root = %layout.root().display(),
        accounts = snapshot.accounts.len(),
        tx_logs = snapshot.tx_logs.len(),
        "Imported EVM state"
    );
    Ok(snapshot)
}

/// Regular files in `dir` as `(file name, path)`, sorted by name.
fn dir_files(dir: &Path) -> ExportResult<Vec<(String, std::path::PathBuf)>> {
    if !path_exists(dir) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ExportError::io(dir, e))? {
        let entry = entry.map_err(|e| ExportError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, path));
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, B256};
    use exrpc_rpc_types::RpcLog;

    fn sample_state() -> StateSnapshot {
        let mut state = StateSnapshot::default();

        let contract = state.account_mut(Address::repeat_byte(0x11));
        contract.code = Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]);
        contract
            .storage
            .insert(B256::with_last_byte(1), B256::repeat_byte(0xaa));
        contract
            .storage
            .insert(B256::with_last_byte(2), B256::repeat_byte(0xbb));

        state
            .account_mut(Address::repeat_byte(0x22))
            .storage
            .insert(B256::ZERO, B256::with_last_byte(9));

        // No code and no storage: nothing is written for it.
        state.account_mut(Address::repeat_byte(0x33));

        let hash = B256::repeat_byte(0x44);
        state.tx_logs.insert(
            hash,
            vec![RpcLog::new(
                Address::repeat_byte(0x11),
                vec![B256::repeat_byte(1)],
                Bytes::from_static(b"transfer"),
                7,
                B256::repeat_byte(0x55),
                hash,
                0,
                0,
            )],
        );
        state.tx_logs.insert(B256::repeat_byte(0x66), vec![]);
        state
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExportLayout::new(dir.path().join("evm"));
        let state = sample_state();

        let summary = export_state(Arc::new(state.clone()), &layout, &mut WorkerPool::new(4))
            .await
            .unwrap();
        assert_eq!(
            summary,
            ExportSummary {
                accounts: 3,
                code_files: 1,
                storage_files: 2,
                tx_log_files: 2,
            }
        );
        assert!(!layout.storage_path(&Address::repeat_byte(0x33)).exists());

        let imported = import_state(&layout).unwrap();
        let mut expected = state;
        expected.accounts.remove(&Address::repeat_byte(0x33));
        assert_eq!(imported, expected);
    }

    #[tokio::test]
    async fn test_export_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExportLayout::new(dir.path().join("evm"));

        export_state(Arc::new(sample_state()), &layout, &mut WorkerPool::new(2))
            .await
            .unwrap();
        export_state(Arc::new(StateSnapshot::default()), &layout, &mut WorkerPool::new(2))
            .await
            .unwrap();

        assert_eq!(import_state(&layout).unwrap(), StateSnapshot::default());
    }

    #[test]
    fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ExportLayout::new(dir.path().join("nope"));
        assert!(matches!(
            import_state(&missing),
            Err(ExportError::MissingDirectory(_))
        ));

        let layout = ExportLayout::new(dir.path().join("evm"));
        layout.prepare().unwrap();
        fs::write(layout.code_dir().join("not-an-address.code"), "0x00").unwrap();
        assert!(matches!(
            import_state(&layout),
            Err(ExportError::InvalidFileName(_))
        ));
    }

    #[test]
    fn test_import_without_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExportLayout::new(dir.path());
        assert_eq!(import_state(&layout).unwrap(), StateSnapshot::default());
    }
}
