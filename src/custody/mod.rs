//! Custodial Signing
//!
//! The remote custodian holds the private keys. This module speaks its
//! submit-then-poll protocol and hides it behind [`SigningProvider`], so the
//! correlation engine never sees HTTP, tokens or retry details.

mod auth;
mod client;
mod poll;
mod verify;
mod wire;

pub use auth::*;
pub use client::*;
pub use poll::*;
pub use verify::*;
pub use wire::*;

use async_trait::async_trait;
use bitcoin::secp256k1::PublicKey;
use tokio_util::sync::CancellationToken;

use crate::error::SignerResult;
use crate::types::{SignedMessage, SigningHash};

/// Terminal result of one signing operation at the custodian
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Custodian finished signing
    Completed {
        id: String,
        signed_messages: Vec<SignedMessage>,
    },
    /// Custodian reached a terminal failure status
    Failed {
        id: String,
        status: OperationStatus,
        reason: Option<String>,
    },
    /// Polling ceiling exhausted before a terminal status
    TimedOut { external_id: String, attempts: u32 },
}

/// Adapter over a remote custodian that signs raw digests
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Request one signature of `signing_hash` per address index and wait
    /// for the operation to reach a terminal state.
    ///
    /// Resubmitting the same `signing_hash` must be idempotent.
    async fn send_and_await(
        &self,
        signing_hash: &SigningHash,
        address_indices: &[u32],
        cancel: &CancellationToken,
    ) -> SignerResult<ProviderOutcome>;

    /// Compressed public key the custodian holds for an address index
    async fn address_public_key(&self, address_index: u32) -> SignerResult<PublicKey>;
}
