//! Unified error types for the custody signer
//!
//! Every failure of a signing attempt flows through [`SignerError`].
//! Request handlers use [`SignerError::code`] to surface the reason
//! distinctly from a generic failure.

use serde::{Deserialize, Serialize};

/// Main error type for all signing operations
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Network failure talking to the custodian
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response that is not the idempotent "already exists" case
    #[error("Custodian returned HTTP {status}: {message}")]
    Provider {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// Polling ceiling exceeded without a terminal status
    #[error("Transaction signing timeout: {external_id} still pending after {attempts} status checks")]
    SigningTimeout { external_id: String, attempts: u32 },

    /// The custodian reported a terminal failure status
    #[error("Custodian reported {status} for signing operation {id}")]
    ProviderFailed {
        id: String,
        status: String,
        reason: Option<String>,
    },

    #[error("Custodian did not return signatures for operation {id}")]
    NoSignatures { id: String },

    /// Returned content does not match the submitted signing hash
    #[error("Custodian returned inconsistent signatures in operation {id}")]
    InconsistentSignature { id: String, address_index: Option<u32> },

    #[error("Custodian did not return signature for address index {address_index} in operation {id}")]
    MissingSignature { id: String, address_index: u32 },

    /// Returned public key differs from the locally known key
    #[error("Custodian signature does not match local public key for address index {address_index} in operation {id}")]
    PublicKeyMismatch { id: String, address_index: u32 },

    #[error("Signing cancelled by caller")]
    Cancelled,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid custodian response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request authentication failed: {0}")]
    Auth(String),

    #[error("Wallet storage error: {0}")]
    Storage(String),
}

impl SignerError {
    // Convenience constructors

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::InvalidSignature(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable category for the error
    pub fn code(&self) -> ErrorCode {
        match self {
            SignerError::Transport(_) => ErrorCode::NetworkError,
            SignerError::Provider { .. } => ErrorCode::ProviderError,
            SignerError::SigningTimeout { .. } => ErrorCode::Timeout,
            SignerError::ProviderFailed { .. } => ErrorCode::ProviderFailed,
            SignerError::NoSignatures { .. } => ErrorCode::NoSignatures,
            SignerError::InconsistentSignature { .. } => ErrorCode::InconsistentSignature,
            SignerError::MissingSignature { .. } => ErrorCode::MissingSignature,
            SignerError::PublicKeyMismatch { .. } => ErrorCode::PublicKeyMismatch,
            SignerError::Cancelled => ErrorCode::Cancelled,
            SignerError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            SignerError::InvalidResponse(_) => ErrorCode::ParseError,
            SignerError::Config(_) => ErrorCode::ConfigError,
            SignerError::Auth(_) => ErrorCode::AuthError,
            SignerError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// Whether the failure came from the custodian disagreeing with local state.
    ///
    /// Retrying these never helps.
    pub fn is_protocol_inconsistency(&self) -> bool {
        matches!(
            self,
            SignerError::NoSignatures { .. }
                | SignerError::InconsistentSignature { .. }
                | SignerError::MissingSignature { .. }
                | SignerError::PublicKeyMismatch { .. }
        )
    }

    /// Serializable view for request handlers
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Transport / provider
    NetworkError,
    ProviderError,
    ProviderFailed,
    Timeout,
    Cancelled,

    // Protocol inconsistencies
    NoSignatures,
    InconsistentSignature,
    MissingSignature,
    PublicKeyMismatch,

    // Encoding
    InvalidSignature,
    ParseError,

    // Local setup
    ConfigError,
    AuthError,
    StorageError,
}

/// Error as surfaced to callers of the signing subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type alias for signing operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::InvalidResponse(e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::InvalidResponse(format!("Invalid hex: {}", e))
    }
}

impl From<std::io::Error> for SignerError {
    fn from(e: std::io::Error) -> Self {
        SignerError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for SignerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SignerError::Transport("Request timed out".to_string())
        } else if e.is_connect() {
            SignerError::Transport("Connection failed".to_string())
        } else if e.is_decode() {
            SignerError::InvalidResponse(e.to_string())
        } else {
            SignerError::Transport(e.to_string())
        }
    }
}

impl From<bitcoin::bip32::Error> for SignerError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        SignerError::Config(format!("BIP32 error: {}", e))
    }
}
