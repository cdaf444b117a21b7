//! Offline export of EVM state into per-account files, and re-import.
//!
//! An export directory holds one code file and one storage file per account
//! plus one log file per transaction (see [`layout`]). Files are written by a
//! bounded [`WorkerPool`] of blocking jobs so very large states stream to disk
//! without holding every file open at once.

pub mod error;
pub mod export;
pub mod files;
pub mod layout;
pub mod pool;
pub mod snapshot;

pub use error::{ExportError, ExportResult};
pub use export::{export_state, import_state, ExportSummary};
pub use files::{
    address_from_file_name, hash_from_file_name, read_code, read_storage, read_tx_logs,
    write_account_code, write_account_storage, write_tx_logs,
};
pub use layout::{path_exists, ExportLayout};
pub use pool::WorkerPool;
pub use snapshot::{AccountState, EvmStateReader, StateSnapshot};
