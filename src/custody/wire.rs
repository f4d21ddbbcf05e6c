//! Custodian wire format
//!
//! Request and response bodies of the custodian's REST API.

use serde::{Deserialize, Serialize};

use crate::types::{SignedMessage, SigningHash};

/// Signing algorithm requested for every raw message
pub const RAW_SIGNING_ALGORITHM: &str = "MPC_ECDSA_SECP256K1";

/// Note attached to every raw signing operation
pub const RAW_SIGNING_NOTE: &str = "Transaction signed by custody-signer using raw signing";

// =============================================================================
// Requests
// =============================================================================

/// `POST /v1/transactions` body for a raw signing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSigningRequest {
    pub operation: String,
    /// Idempotency key; the signing hash in hex
    pub external_tx_id: String,
    pub note: String,
    pub extra_parameters: ExtraParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraParameters {
    pub raw_message_data: RawMessageData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessageData {
    pub algorithm: String,
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub content: String,
    pub derivation_path: Vec<u32>,
}

impl RawSigningRequest {
    /// One message per address index, all carrying the same digest
    pub fn new(signing_hash: &SigningHash, address_indices: &[u32], derivation_prefix: &[u32]) -> Self {
        let content = signing_hash.to_hex();
        let messages = address_indices
            .iter()
            .map(|&index| RawMessage {
                content: content.clone(),
                derivation_path: derivation_path(derivation_prefix, index),
            })
            .collect();

        Self {
            operation: "RAW".to_string(),
            external_tx_id: content.clone(),
            note: RAW_SIGNING_NOTE.to_string(),
            extra_parameters: ExtraParameters {
                raw_message_data: RawMessageData {
                    algorithm: RAW_SIGNING_ALGORITHM.to_string(),
                    messages,
                },
            },
        }
    }
}

/// Full derivation path for an address index
pub fn derivation_path(prefix: &[u32], address_index: u32) -> Vec<u32> {
    let mut path = Vec::with_capacity(prefix.len() + 1);
    path.extend_from_slice(prefix);
    path.push(address_index);
    path
}

// =============================================================================
// Responses
// =============================================================================

/// Custodian operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Submitted,
    Queued,
    PendingAuthorization,
    PendingSignature,
    #[serde(rename = "PENDING_3RD_PARTY")]
    PendingThirdParty,
    Broadcasting,
    Confirming,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Rejected,
    Blocked,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// No further transitions happen after a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed
                | OperationStatus::Failed
                | OperationStatus::Cancelled
                | OperationStatus::Rejected
                | OperationStatus::Blocked
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Submitted => "SUBMITTED",
            OperationStatus::Queued => "QUEUED",
            OperationStatus::PendingAuthorization => "PENDING_AUTHORIZATION",
            OperationStatus::PendingSignature => "PENDING_SIGNATURE",
            OperationStatus::PendingThirdParty => "PENDING_3RD_PARTY",
            OperationStatus::Broadcasting => "BROADCASTING",
            OperationStatus::Confirming => "CONFIRMING",
            OperationStatus::Completed => "COMPLETED",
            OperationStatus::Failed => "FAILED",
            OperationStatus::Cancelling => "CANCELLING",
            OperationStatus::Cancelled => "CANCELLED",
            OperationStatus::Rejected => "REJECTED",
            OperationStatus::Blocked => "BLOCKED",
            OperationStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransactionResponse {
    pub id: String,
    pub status: OperationStatus,
}

/// Operation details as returned by the status endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub id: String,
    #[serde(default)]
    pub external_tx_id: Option<String>,
    pub status: OperationStatus,
    #[serde(default)]
    pub sub_status: Option<String>,
    #[serde(default)]
    pub signed_messages: Option<Vec<SignedMessage>>,
}

/// Error body returned on non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// `GET /v1/vault/public_key_info` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyInfo {
    pub public_key: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub derivation_path: Option<Vec<u32>>,
}
