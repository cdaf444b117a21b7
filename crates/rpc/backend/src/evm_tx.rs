//! Decoding raw pool and block entries as EVM transactions.
//!
//! The consensus layer carries EVM and non-EVM transactions side by side.
//! [`decode_pool_entry`] reports which one it saw instead of failing, so
//! callers can skip foreign entries explicitly.

use std::sync::OnceLock;

use alloy_consensus::{Signed, TxEip1559, TxLegacy};
use alloy_primitives::{keccak256, Address, PrimitiveSignature, B256, U256, U64};
use exrpc_rpc_types::RpcTransaction;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{All, Message, Secp256k1};

use crate::consensus::consensus_tx_hash;
use crate::error::{BackendError, BackendResult};

/// Transaction type constants per EIP-2718.
pub mod tx_type {
    pub const LEGACY: u8 = 0x00;
    pub const EIP1559: u8 = 0x02;
}

#[derive(Clone, Debug)]
enum Envelope {
    Legacy(Signed<TxLegacy>),
    Eip1559(Signed<TxEip1559>),
}

/// A decoded EVM transaction with its recovered sender.
#[derive(Clone, Debug)]
pub struct EvmTransaction {
    envelope: Envelope,
    sender: Address,
    /// Consensus hash of the raw bytes the transaction was decoded from.
    hash: B256,
}

/// Result of decoding one raw entry.
#[derive(Clone, Debug)]
pub enum DecodeOutcome {
    Decoded(Box<EvmTransaction>),
    /// Not an EVM transaction; carries the decode failure.
    Skipped(String),
}

/// Decode a raw entry without treating foreign transactions as errors.
pub fn decode_pool_entry(raw: &[u8]) -> DecodeOutcome {
    match EvmTransaction::decode(raw) {
        Ok(tx) => DecodeOutcome::Decoded(Box::new(tx)),
        Err(e) => DecodeOutcome::Skipped(e.to_string()),
    }
}

impl EvmTransaction {
    /// Decode a legacy or EIP-1559 transaction, rejecting trailing bytes.
    pub fn decode(raw: &[u8]) -> BackendResult<Self> {
        let Some(&first_byte) = raw.first() else {
            return Err(BackendError::InvalidTransaction("empty input".to_string()));
        };

        // RLP list prefixes start at 0xc0
        let envelope = if first_byte >= 0xc0 {
            let mut cursor = raw;
            let signed = Signed::<TxLegacy>::rlp_decode(&mut cursor)
                .map_err(|e| BackendError::InvalidTransaction(e.to_string()))?;
            ensure_consumed(cursor)?;
            Envelope::Legacy(signed)
        } else if first_byte == tx_type::EIP1559 {
            let mut cursor = raw.get(1..).unwrap_or_default();
            let signed = Signed::<TxEip1559>::rlp_decode(&mut cursor)
                .map_err(|e| BackendError::InvalidTransaction(e.to_string()))?;
            ensure_consumed(cursor)?;
            Envelope::Eip1559(signed)
        } else {
            return Err(BackendError::InvalidTransaction(format!(
                "unsupported transaction type 0x{first_byte:02x}"
            )));
        };

        let sender = match &envelope {
            Envelope::Legacy(signed) => recover_sender(signed.signature_hash(), signed.signature()),
            Envelope::Eip1559(signed) => {
                recover_sender(signed.signature_hash(), signed.signature())
            }
        }?;

        Ok(Self {
            envelope,
            sender,
            hash: consensus_tx_hash(raw),
        })
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn tx_type(&self) -> u8 {
        match &self.envelope {
            Envelope::Legacy(_) => tx_type::LEGACY,
            Envelope::Eip1559(_) => tx_type::EIP1559,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match &self.envelope {
            Envelope::Legacy(signed) => signed.tx().gas_limit,
            Envelope::Eip1559(signed) => signed.tx().gas_limit,
        }
    }

    pub fn to(&self) -> Option<Address> {
        match &self.envelope {
            Envelope::Legacy(signed) => signed.tx().to.to().copied(),
            Envelope::Eip1559(signed) => signed.tx().to.to().copied(),
        }
    }

    /// RPC representation linked to a block; a zero block hash marks it pending.
    pub fn to_rpc(&self, block_hash: B256, block_number: u64, index: u64) -> RpcTransaction {
        let rpc = match &self.envelope {
            Envelope::Legacy(signed) => {
                let tx = signed.tx();
                let signature = signed.signature();
                let parity = signature.v() as u64;
                // EIP-155 replay-protected v when a chain id is present.
                let v = match tx.chain_id {
                    Some(chain_id) => chain_id * 2 + 35 + parity,
                    None => 27 + parity,
                };
                RpcTransaction {
                    hash: self.hash,
                    nonce: U64::from(tx.nonce),
                    block_hash: None,
                    block_number: None,
                    transaction_index: None,
                    from: self.sender,
                    to: tx.to.to().copied(),
                    value: tx.value,
                    gas: U64::from(tx.gas_limit),
                    gas_price: Some(U256::from(tx.gas_price)),
                    max_fee_per_gas: None,
                    max_priority_fee_per_gas: None,
                    input: tx.input.clone(),
                    v: U64::from(v),
                    r: signature.r(),
                    s: signature.s(),
                    tx_type: U64::from(tx_type::LEGACY),
                    chain_id: tx.chain_id.map(U64::from),
                }
            }
            Envelope::Eip1559(signed) => {
                let tx = signed.tx();
                let signature = signed.signature();
                RpcTransaction {
                    hash: self.hash,
                    nonce: U64::from(tx.nonce),
                    block_hash: None,
                    block_number: None,
                    transaction_index: None,
                    from: self.sender,
                    to: tx.to.to().copied(),
                    value: tx.value,
                    gas: U64::from(tx.gas_limit),
                    gas_price: Some(U256::from(tx.max_fee_per_gas)),
                    max_fee_per_gas: Some(U256::from(tx.max_fee_per_gas)),
                    max_priority_fee_per_gas: Some(U256::from(tx.max_priority_fee_per_gas)),
                    input: tx.input.clone(),
                    v: U64::from(signature.v() as u64),
                    r: signature.r(),
                    s: signature.s(),
                    tx_type: U64::from(tx_type::EIP1559),
                    chain_id: Some(U64::from(tx.chain_id)),
                }
            }
        };
        rpc.with_block(block_hash, block_number, index)
    }
}

fn ensure_consumed(rest: &[u8]) -> BackendResult<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(BackendError::InvalidTransaction(format!(
            "{} trailing bytes",
            rest.len()
        )))
    }
}

fn recover_sender(signature_hash: B256, signature: &PrimitiveSignature) -> BackendResult<Address> {
    let invalid = |reason: &str| BackendError::InvalidTransaction(format!("sender recovery: {reason}"));

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    compact[32..].copy_from_slice(&signature.s().to_be_bytes::<32>());

    let recid = RecoveryId::from_i32(if signature.v() { 1 } else { 0 })
        .map_err(|_| invalid("recovery id"))?;
    let recoverable =
        RecoverableSignature::from_compact(&compact, recid).map_err(|_| invalid("signature"))?;
    let msg = Message::from_digest_slice(signature_hash.as_slice()).map_err(|_| invalid("digest"))?;
    let pubkey = secp()
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|_| invalid("public key"))?;

    let uncompressed = pubkey.serialize_uncompressed();
    let pubkey_payload = uncompressed.get(1..).ok_or_else(|| invalid("public key"))?;
    let hash = keccak256(pubkey_payload);
    let address_bytes = hash.as_slice().get(12..).ok_or_else(|| invalid("address"))?;
    Ok(Address::from_slice(address_bytes))
}

fn secp() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}


#[cfg(test)]
mod tests {
    use super::test_signing::*;
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    const LEGACY_TX_RLP: &str = concat!(
        "f86c098504a817c800825208943535353535353535353535353535353535353535880de0",
        "b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590",
        "620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
    );
    const LEGACY_TX_SENDER: &str = "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F";

    #[test]
    fn test_decode_mainnet_legacy_vector() {
        let raw = hex::decode(LEGACY_TX_RLP).expect("valid hex");
        let tx = EvmTransaction::decode(&raw).expect("should decode");

        assert_eq!(tx.tx_type(), tx_type::LEGACY);
        assert_eq!(tx.gas_limit(), 21000);
        assert_eq!(tx.sender(), LEGACY_TX_SENDER.parse::<Address>().unwrap());
        assert_eq!(tx.hash(), consensus_tx_hash(&raw));

        let rpc = tx.to_rpc(B256::ZERO, 0, 0);
        assert_eq!(rpc.v, U64::from(37u64));
        assert_eq!(rpc.nonce, U64::from(9u64));
        assert!(rpc.is_pending());
    }

    #[test]
    fn test_decode_signed_eip1559() {
        let key = SigningKey::random(&mut OsRng);
        let raw = eip1559_tx(&key, 4, 50_000);
        let tx = EvmTransaction::decode(&raw).expect("should decode");

        assert_eq!(tx.tx_type(), tx_type::EIP1559);
        assert_eq!(tx.sender(), address_of(&key));
        assert_eq!(tx.to(), Some(Address::repeat_byte(0x43)));

        let rpc = tx.to_rpc(B256::repeat_byte(9), 10, 1);
        assert_eq!(rpc.block_number, Some(U64::from(10u64)));
        assert_eq!(rpc.max_priority_fee_per_gas, Some(U256::from(1_000_000_000u64)));
    }

    #[test]
    fn test_pool_entry_outcomes() {
        let key = SigningKey::random(&mut OsRng);
        assert!(matches!(
            decode_pool_entry(&legacy_tx(&key, 0, 21000)),
            DecodeOutcome::Decoded(_)
        ));
        assert!(matches!(decode_pool_entry(&[]), DecodeOutcome::Skipped(_)));
        assert!(matches!(
            decode_pool_entry(b"\x0a\x14cosmos-bank-send"),
            DecodeOutcome::Skipped(_)
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut raw = hex::decode(LEGACY_TX_RLP).expect("valid hex");
        raw.push(0x00);
        assert!(EvmTransaction::decode(&raw).is_err());
    }
}
