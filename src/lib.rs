//! Custody Signer Library
//!
//! Signs wallet transactions with keys held by a remote MPC custodian.
//!
//! # Architecture
//!
//! This crate provides:
//! - **signing**: Correlation of owned inputs with custodian signatures, DER encoding
//! - **custody**: Custodian REST client, request authentication, status polling
//! - **config**: Provider configuration from settings or environment
//! - **logging**: Tracing setup and redaction helpers
//!
//! The wallet storage and transaction model are consumed through the
//! [`WalletStorage`] and [`SigningTransaction`] traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use custody_signer::{compute_signatures, CustodianClient, ProviderConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = CustodianClient::new(ProviderConfig::from_env()?)?;
//! let signatures = compute_signatures(&tx, &storage, &client, &CancellationToken::new()).await?;
//! ```

pub mod config;
pub mod custody;
pub mod error;
pub mod logging;
pub mod signing;
pub mod types;

// Re-export key types for convenience
pub use config::{PollPolicy, ProviderConfig};
pub use custody::{CustodianClient, ProviderOutcome, SigningProvider};
pub use error::{ErrorCode, SignerError, SignerResult};
pub use signing::{compute_signatures, sign_transaction, SigningTransaction, WalletStorage};
pub use types::*;
