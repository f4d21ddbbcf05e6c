//! Wallet and transaction collaborators
//!
//! The signer does not own address storage or the transaction model.
//! These traits are the seams it consumes them through.

use async_trait::async_trait;

use crate::error::SignerResult;
use crate::types::{
    AddressOwnershipInfo, AssembledSignature, CallerSignature, SigningHash, SpentOutput, TxInput,
};

/// Read-only view of the wallet's address and UTXO storage
#[async_trait]
pub trait WalletStorage: Send + Sync {
    /// Output spent by `input`, looked up through its previous transaction
    async fn spent_output(&self, input: &TxInput) -> SignerResult<SpentOutput>;

    /// Ownership record for `address`; `None` when the wallet does not own it
    async fn address_ownership(&self, address: &str) -> SignerResult<Option<AddressOwnershipInfo>>;
}

/// The transaction being signed
pub trait SigningTransaction: Send + Sync {
    /// Deterministic digest of the unsigned content
    fn signing_hash(&self) -> SigningHash;

    /// Inputs in positional order
    fn inputs(&self) -> &[TxInput];

    /// Address of the caller role, for transactions that carry one
    fn caller_address(&self) -> Option<String> {
        None
    }

    /// Embed a completed input signature
    fn attach_input_signature(&mut self, signature: &AssembledSignature) -> SignerResult<()>;

    /// Embed the caller signature
    fn attach_caller_signature(&mut self, signature: &CallerSignature) -> SignerResult<()>;
}
