//! EVM state that can be exported.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use alloy_primitives::{Address, Bytes, B256};
use exrpc_rpc_types::RpcLog;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// Read access to the state being exported.
///
/// Implementations are shared across blocking writer threads.
pub trait EvmStateReader: Send + Sync {
    fn accounts(&self) -> Vec<Address>;

    fn code(&self, address: &Address) -> ExportResult<Bytes>;

    fn storage(&self, address: &Address) -> ExportResult<Vec<(B256, B256)>>;

    fn tx_log_hashes(&self) -> Vec<B256>;

    fn tx_logs(&self, hash: &B256) -> ExportResult<Vec<RpcLog>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(default)]
    pub code: Bytes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<B256, B256>,
}

/// In-memory state, loaded from and saved to JSON.
///
/// ```json
/// {
///   "accounts": {
///     "0x…": { "code": "0x6080…", "storage": { "0x…01": "0x…ff" } }
///   },
///   "txLogs": { "0x…": [ { "address": "0x…", "topics": [], "data": "0x" } ] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub accounts: BTreeMap<Address, AccountState>,
    #[serde(default)]
    pub tx_logs: BTreeMap<B256, Vec<RpcLog>>,
}

impl StateSnapshot {
    pub fn load(path: impl AsRef<Path>) -> ExportResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| ExportError::json(path, e))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ExportResult<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).map_err(|e| ExportError::json(path, e))?;
        fs::write(path, text).map_err(|e| ExportError::io(path, e))
    }

    pub fn account_mut(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_default()
    }
}

impl EvmStateReader for StateSnapshot {
    fn accounts(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    fn code(&self, address: &Address) -> ExportResult<Bytes> {
        Ok(self
            .accounts
            .get(address)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    fn storage(&self, address: &Address) -> ExportResult<Vec<(B256, B256)>> {
        Ok(self
            .accounts
            .get(address)
            .map(|account| account.storage.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default())
    }

    fn tx_log_hashes(&self) -> Vec<B256> {
        self.tx_logs.keys().copied().collect()
    }

    fn tx_logs(&self, hash: &B256) -> ExportResult<Vec<RpcLog>> {
        Ok(self.tx_logs.get(hash).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "accounts": {
            "0x1111111111111111111111111111111111111111": {
                "code": "0x6080",
                "storage": {
                    "0x0000000000000000000000000000000000000000000000000000000000000001":
                    "0x00000000000000000000000000000000000000000000000000000000000000ff"
                }
            },
            "0x2222222222222222222222222222222222222222": {}
        },
        "txLogs": {
            "0x0707070707070707070707070707070707070707070707070707070707070707": [
                { "address": "0x3333333333333333333333333333333333333333", "topics": [], "data": "0x01" }
            ]
        }
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot: StateSnapshot = serde_json::from_str(SNAPSHOT).unwrap();
        assert_eq!(snapshot.accounts.len(), 2);

        let contract = Address::repeat_byte(0x11);
        assert_eq!(snapshot.code(&contract).unwrap(), Bytes::from_static(&[0x60, 0x80]));
        assert_eq!(
            snapshot.storage(&contract).unwrap(),
            vec![(B256::with_last_byte(1), B256::with_last_byte(0xff))]
        );

        let eoa = Address::repeat_byte(0x22);
        assert!(snapshot.code(&eoa).unwrap().is_empty());
        assert!(snapshot.storage(&eoa).unwrap().is_empty());
        assert!(snapshot.code(&Address::ZERO).unwrap().is_empty());

        let hash = B256::repeat_byte(7);
        assert_eq!(snapshot.tx_log_hashes(), vec![hash]);
        assert_eq!(snapshot.tx_logs(&hash).unwrap()[0].data, Bytes::from_static(&[1]));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snapshot: StateSnapshot = serde_json::from_str(SNAPSHOT).unwrap();

        snapshot.save(&path).unwrap();
        assert_eq!(StateSnapshot::load(&path).unwrap(), snapshot);
        assert!(matches!(
            StateSnapshot::load(dir.path().join("missing.json")),
            Err(ExportError::Io { .. })
        ));
    }
}
