//! Shared types for the custody signer
//!
//! Data structures that cross module boundaries: the transaction view the
//! signer works on, wallet ownership records, the custodian's signed
//! messages and the assembled per-input signatures.

use bitcoin::secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SignerError, SignerResult};

// =============================================================================
// Signing Hash
// =============================================================================

/// Digest of a transaction's unsigned content; what every party signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningHash([u8; 32]);

impl SigningHash {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_str: &str) -> SignerResult<Self> {
        let bytes = hex::decode(hex_str)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SignerResult<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            SignerError::invalid_response(format!(
                "Signing hash must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether a hex string from the custodian names exactly this digest
    pub fn matches_hex(&self, content: &str) -> bool {
        match hex::decode(content) {
            Ok(bytes) => bytes.as_slice() == self.0.as_slice(),
            Err(_) => false,
        }
    }
}

impl fmt::Display for SigningHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// =============================================================================
// Transaction View
// =============================================================================

/// A transaction input as seen by the signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Previous transaction id (hex)
    pub prev_tx_id: String,
    /// Output index within the previous transaction
    pub prev_index: u32,
    /// Unlock data; present once the input is signed
    pub data: Option<Vec<u8>>,
}

impl TxInput {
    pub fn new(prev_tx_id: impl Into<String>, prev_index: u32) -> Self {
        Self {
            prev_tx_id: prev_tx_id.into(),
            prev_index,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_signed(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }
}

/// The output an input spends, looked up through the previous transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentOutput {
    pub value: u64,
    pub token: String,
    /// Decoded owning address; `None` for non-standard scripts
    pub address: Option<String>,
    /// Mint/melt authority output rather than a value output
    pub authority: bool,
}

// =============================================================================
// Wallet Ownership
// =============================================================================

/// Ownership record for an address held by the local wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressOwnershipInfo {
    pub bip32_address_index: u32,
    pub public_key: PublicKey,
}

impl AddressOwnershipInfo {
    pub fn new(bip32_address_index: u32, public_key: PublicKey) -> Self {
        Self {
            bip32_address_index,
            public_key,
        }
    }

    /// Build from a hex-encoded compressed public key
    pub fn from_hex_key(bip32_address_index: u32, public_key_hex: &str) -> SignerResult<Self> {
        let bytes = hex::decode(public_key_hex)
            .map_err(|e| SignerError::storage(format!("Invalid public key hex: {}", e)))?;
        let public_key = PublicKey::from_slice(&bytes)
            .map_err(|e| SignerError::storage(format!("Invalid public key: {}", e)))?;
        Ok(Self::new(bip32_address_index, public_key))
    }
}

/// An input that needs a wallet-owned signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIndex {
    pub input_index: usize,
    pub address_index: u32,
    pub public_key: PublicKey,
}

/// The caller role of a contract-style transaction, signed outside the inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIndex {
    pub address_index: u32,
    pub public_key: PublicKey,
}

// =============================================================================
// Custodian Signed Messages
// =============================================================================

/// Raw ECDSA signature components as the custodian returns them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignature {
    /// Big-endian `r` (hex)
    pub r: String,
    /// Big-endian `s` (hex)
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u8>,
}

impl RawSignature {
    pub fn new(r: impl Into<String>, s: impl Into<String>) -> Self {
        Self {
            r: r.into(),
            s: s.into(),
            full_sig: None,
            v: None,
        }
    }
}

/// One signed message of a completed custodian operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    /// Digest that was signed (hex)
    pub content: String,
    pub derivation_path: Vec<u32>,
    pub signature: RawSignature,
    /// Compressed public key of the signing address (hex)
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

impl SignedMessage {
    /// Address index is the last derivation path segment
    pub fn address_index(&self) -> Option<u32> {
        self.derivation_path.last().copied()
    }
}

// =============================================================================
// Assembled Signatures
// =============================================================================

/// Final per-input signature, ready to be embedded in the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledSignature {
    pub input_index: usize,
    pub address_index: u32,
    pub public_key: PublicKey,
    /// DER-encoded ECDSA signature
    pub signature: Vec<u8>,
}

/// Standalone signature for the caller role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerSignature {
    pub address_index: u32,
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

/// Everything a signing attempt produces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxSignatures {
    pub input_signatures: Vec<AssembledSignature>,
    pub caller_signature: Option<CallerSignature>,
}

impl TxSignatures {
    pub fn is_empty(&self) -> bool {
        self.input_signatures.is_empty() && self.caller_signature.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_hash_hex_matching() {
        let hash = SigningHash::new([0xab; 32]);
        assert!(hash.matches_hex(&"ab".repeat(32)));
        assert!(hash.matches_hex(&"AB".repeat(32)));
        assert!(!hash.matches_hex(&format!("{}ac", "ab".repeat(31))));
        assert!(!hash.matches_hex("not hex"));
        assert!(!hash.matches_hex(&"ab".repeat(31)));
    }

    #[test]
    fn test_signing_hash_length() {
        assert!(SigningHash::from_hex(&"00".repeat(31)).is_err());
        assert!(SigningHash::from_hex(&"00".repeat(32)).is_ok());
    }

    #[test]
    fn test_input_signed_state() {
        let input = TxInput::new("00ff", 1);
        assert!(!input.is_signed());
        assert!(input.clone().with_data(vec![1, 2, 3]).is_signed());
        assert!(!input.with_data(Vec::new()).is_signed());
    }

    #[test]
    fn test_signed_message_wire_shape() {
        let json = r#"{
            "content": "abcd",
            "algorithm": "MPC_ECDSA_SECP256K1",
            "derivationPath": [44, 280, 0, 0, 7],
            "signature": { "r": "01", "s": "02", "fullSig": "0102", "v": 0 },
            "publicKey": "02aa"
        }"#;

        let message: SignedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.address_index(), Some(7));
        assert_eq!(message.signature.r, "01");
        assert_eq!(message.signature.full_sig.as_deref(), Some("0102"));
    }
}
