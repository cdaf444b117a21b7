//! Directory layout of an export.
//!
//! ```text
//! <root>/
//!   code/<address>.code        0x-prefixed hex bytecode
//!   storage/<address>.storage  one `key:value` line per slot
//!   txlogs/<hash>.json         JSON list of the transaction's logs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256};

use crate::error::{ExportError, ExportResult};

pub const CODE_DIR: &str = "code";
pub const STORAGE_DIR: &str = "storage";
pub const TXLOGS_DIR: &str = "txlogs";

pub const CODE_FILE_SUFFIX: &str = ".code";
pub const STORAGE_FILE_SUFFIX: &str = ".storage";
pub const TXLOGS_FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    root: PathBuf,
}

impl ExportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Wipe `root` and create empty `code/`, `storage/` and `txlogs/`.
    pub fn prepare(&self) -> ExportResult<()> {
        if path_exists(&self.root) {
            fs::remove_dir_all(&self.root).map_err(|e| ExportError::io(&self.root, e))?;
        }
        for dir in [self.code_dir(), self.storage_dir(), self.txlogs_dir()] {
            fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;
        }
        tracing::debug!(root = %self.root.display(), "Prepared export directory");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn code_dir(&self) -> PathBuf {
        self.root.join(CODE_DIR)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(STORAGE_DIR)
    }

    pub fn txlogs_dir(&self) -> PathBuf {
        self.root.join(TXLOGS_DIR)
    }

    pub fn code_path(&self, address: &Address) -> PathBuf {
        self.code_dir().join(format!("{address}{CODE_FILE_SUFFIX}"))
    }

    pub fn storage_path(&self, address: &Address) -> PathBuf {
        self.storage_dir()
            .join(format!("{address}{STORAGE_FILE_SUFFIX}"))
    }

    pub fn txlogs_path(&self, hash: &B256) -> PathBuf {
        self.txlogs_dir().join(format!("{hash}{TXLOGS_FILE_SUFFIX}"))
    }
}

/// Whether anything exists at `path`.
pub fn path_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().try_exists().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_clears_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ExportLayout::new(dir.path().join("export"));

        layout.prepare().unwrap();
        let stale = layout.code_path(&Address::repeat_byte(1));
        fs::write(&stale, "0x00").unwrap();

        layout.prepare().unwrap();
        assert!(!path_exists(&stale));
        assert!(layout.code_dir().is_dir());
        assert!(layout.storage_dir().is_dir());
        assert!(layout.txlogs_dir().is_dir());
    }

    #[test]
    fn test_file_names() {
        let layout = ExportLayout::new("/tmp/x");
        let address = Address::repeat_byte(0xab);
        let name = layout.code_path(&address);
        assert_eq!(
            name.file_name().unwrap().to_str().unwrap(),
            format!("{}.code", address.to_checksum(None))
        );

        let hash = B256::repeat_byte(0x0d);
        let name = layout.txlogs_path(&hash);
        assert!(name.ends_with(format!("txlogs/0x{}.json", "0d".repeat(32))));
    }
}
