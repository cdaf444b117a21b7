//! Ethereum-compatible RPC types served by the exrpc query backend.
//!
//! These types serialize to JSON in the shape Ethereum tooling expects
//! (hex quantities, camelCase keys, null linkage for pending transactions).

use alloy_primitives::U64;
use serde::{Deserialize, Serialize};

pub mod block;
pub mod header;
pub mod log;
pub mod transaction;

pub use block::{BlockTransactions, RpcBlock};
pub use header::RpcHeader;
pub use log::RpcLog;
pub use transaction::RpcTransaction;

/// Block number or tag for RPC requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockNumberOrTag {
    /// Specific block number (hex encoded)
    Number(U64),
    /// Block tag
    Tag(BlockTag),
}

impl Default for BlockNumberOrTag {
    fn default() -> Self {
        BlockNumberOrTag::Tag(BlockTag::Latest)
    }
}

/// Standard Ethereum block tags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
}

/// Signed chain height as seen by the resolver.
///
/// Zero and negative values are sentinels that resolve to the current tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(i64);

impl BlockNumber {
    /// The pending block, resolved like latest.
    pub const PENDING: Self = Self(-2);
    /// The current tip.
    pub const LATEST: Self = Self(-1);
    /// Height 1 is the first block the consensus layer produces.
    pub const EARLIEST: Self = Self(1);

    pub const fn new(height: i64) -> Self {
        Self(height)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Whether this number must be resolved against the current tip.
    pub const fn is_tip(self) -> bool {
        self.0 <= 0
    }
}

impl From<i64> for BlockNumber {
    fn from(height: i64) -> Self {
        Self(height)
    }
}

impl From<BlockNumberOrTag> for BlockNumber {
    fn from(value: BlockNumberOrTag) -> Self {
        match value {
            BlockNumberOrTag::Number(n) => Self(i64::try_from(n.to::<u64>()).unwrap_or(i64::MAX)),
            BlockNumberOrTag::Tag(BlockTag::Earliest) => Self::EARLIEST,
            BlockNumberOrTag::Tag(BlockTag::Pending) => Self::PENDING,
            BlockNumberOrTag::Tag(BlockTag::Latest | BlockTag::Safe | BlockTag::Finalized) => {
                Self::LATEST
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag_serialization() {
        let tag = BlockTag::Latest;
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"latest\"");
    }

    #[test]
    fn test_block_number_or_tag() {
        let num = BlockNumberOrTag::Number(U64::from(100));
        let json = serde_json::to_string(&num).unwrap();
        assert_eq!(json, "\"0x64\"");

        let tag: BlockNumberOrTag = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(BlockNumber::from(tag), BlockNumber::PENDING);
    }

    #[test]
    fn test_tags_resolve_to_tip() {
        for tag in [BlockTag::Latest, BlockTag::Safe, BlockTag::Finalized, BlockTag::Pending] {
            assert!(BlockNumber::from(BlockNumberOrTag::Tag(tag)).is_tip());
        }
        assert!(!BlockNumber::from(BlockNumberOrTag::Tag(BlockTag::Earliest)).is_tip());
    }
}
