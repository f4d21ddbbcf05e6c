//! Signing Correlation Engine
//!
//! Turns a transaction into custodian signatures:
//!
//! 1. Find the unsigned inputs whose spent outputs the wallet owns
//! 2. Ask the custodian for one signature per distinct address index
//! 3. Check every returned message against the signing hash and the local
//!    public keys
//! 4. Pair signatures back to input positions (and the caller, if any)
//!
//! Nothing is returned unless every requested signature checks out.

use std::collections::HashMap;

use bitcoin::secp256k1::PublicKey;
use tokio_util::sync::CancellationToken;

use super::collaborators::{SigningTransaction, WalletStorage};
use super::der::encode_der;
use crate::custody::{ProviderOutcome, SigningProvider};
use crate::error::{SignerError, SignerResult};
use crate::logging::redact_hash;
use crate::types::{
    AssembledSignature, CallerIndex, CallerSignature, SignedMessage, SigningHash, SigningIndex,
    TxSignatures,
};

// =============================================================================
// Signing Plan
// =============================================================================

/// What needs signing before the custodian is contacted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningPlan {
    /// Owned unsigned inputs, in input order
    pub inputs: Vec<SigningIndex>,
    pub caller: Option<CallerIndex>,
}

impl SigningPlan {
    /// Distinct address indices to request, in first-seen order
    pub fn address_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = Vec::new();
        let all = self
            .inputs
            .iter()
            .map(|s| s.address_index)
            .chain(self.caller.as_ref().map(|c| c.address_index));

        for index in all {
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        indices
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.caller.is_none()
    }
}

/// Verified signature for one address index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedSignature {
    pub der: Vec<u8>,
    /// Public key bytes the custodian reported
    pub public_key: Vec<u8>,
}

/// Collect the inputs and caller role the wallet must sign for.
///
/// Inputs that already carry data, spend outputs without a decodable
/// address, or spend outputs of foreign addresses are skipped.
pub async fn collect_signing_indices<T, S>(tx: &T, storage: &S) -> SignerResult<SigningPlan>
where
    T: SigningTransaction + ?Sized,
    S: WalletStorage + ?Sized,
{
    let mut plan = SigningPlan::default();

    for (input_index, input) in tx.inputs().iter().enumerate() {
        if input.is_signed() {
            continue;
        }

        let spent = storage.spent_output(input).await?;
        let Some(address) = spent.address else {
            continue;
        };

        // Not a wallet address
        let Some(info) = storage.address_ownership(&address).await? else {
            continue;
        };

        plan.inputs.push(SigningIndex {
            input_index,
            address_index: info.bip32_address_index,
            public_key: info.public_key,
        });
    }

    if let Some(address) = tx.caller_address() {
        if let Some(info) = storage.address_ownership(&address).await? {
            plan.caller = Some(CallerIndex {
                address_index: info.bip32_address_index,
                public_key: info.public_key,
            });
        }
    }

    Ok(plan)
}

/// Index the custodian's messages by address index.
///
/// Every message must be over `signing_hash`. Repeated address indices are
/// expected when several inputs share an address; the first one wins.
pub fn correlate_signed_messages(
    id: &str,
    signing_hash: &SigningHash,
    messages: &[SignedMessage],
) -> SignerResult<HashMap<u32, CorrelatedSignature>> {
    let mut by_index = HashMap::with_capacity(messages.len());

    for message in messages {
        let address_index = message.address_index().ok_or_else(|| {
            SignerError::invalid_response(format!("Signed message without derivation path in {}", id))
        })?;

        if !signing_hash.matches_hex(&message.content) {
            return Err(SignerError::InconsistentSignature {
                id: id.to_string(),
                address_index: Some(address_index),
            });
        }

        if by_index.contains_key(&address_index) {
            tracing::debug!(id, address_index, "Skipping repeated signature for shared address");
            continue;
        }

        let public_key = hex::decode(&message.public_key).map_err(|e| {
            SignerError::invalid_response(format!("Invalid public key hex in {}: {}", id, e))
        })?;

        by_index.insert(
            address_index,
            CorrelatedSignature {
                der: encode_der(&message.signature)?,
                public_key,
            },
        );
    }

    Ok(by_index)
}

/// Pair correlated signatures with the plan, checking public keys
pub fn assemble_signatures(
    id: &str,
    plan: &SigningPlan,
    signatures: &HashMap<u32, CorrelatedSignature>,
) -> SignerResult<TxSignatures> {
    let lookup = |address_index: u32, public_key: &PublicKey| -> SignerResult<Vec<u8>> {
        let sig = signatures.get(&address_index).ok_or_else(|| SignerError::MissingSignature {
            id: id.to_string(),
            address_index,
        })?;
        if sig.public_key.as_slice() != public_key.serialize().as_slice() {
            return Err(SignerError::PublicKeyMismatch {
                id: id.to_string(),
                address_index,
            });
        }
        Ok(sig.der.clone())
    };

    let mut result = TxSignatures::default();

    for entry in &plan.inputs {
        result.input_signatures.push(AssembledSignature {
            input_index: entry.input_index,
            address_index: entry.address_index,
            public_key: entry.public_key,
            signature: lookup(entry.address_index, &entry.public_key)?,
        });
    }

    if let Some(caller) = &plan.caller {
        result.caller_signature = Some(CallerSignature {
            address_index: caller.address_index,
            public_key: caller.public_key,
            signature: lookup(caller.address_index, &caller.public_key)?,
        });
    }

    Ok(result)
}

// =============================================================================
// Entry Points
// =============================================================================

/// Compute every signature the wallet owes `tx`.
///
/// Returns an empty result without contacting the custodian when the wallet
/// owns nothing in the transaction.
pub async fn compute_signatures<T, S, P>(
    tx: &T,
    storage: &S,
    provider: &P,
    cancel: &CancellationToken,
) -> SignerResult<TxSignatures>
where
    T: SigningTransaction + ?Sized,
    S: WalletStorage + ?Sized,
    P: SigningProvider + ?Sized,
{
    let signing_hash = tx.signing_hash();
    let plan = collect_signing_indices(tx, storage).await?;

    if plan.is_empty() {
        tracing::debug!(hash = %redact_hash(&signing_hash.to_hex()), "Nothing to sign");
        return Ok(TxSignatures::default());
    }

    let indices = plan.address_indices();
    tracing::info!(
        hash = %redact_hash(&signing_hash.to_hex()),
        inputs = plan.inputs.len(),
        caller = plan.caller.is_some(),
        addresses = indices.len(),
        "Requesting custodian signatures"
    );

    let (id, messages) = match provider.send_and_await(&signing_hash, &indices, cancel).await? {
        ProviderOutcome::Completed { id, signed_messages } => (id, signed_messages),
        ProviderOutcome::Failed { id, status, reason } => {
            tracing::warn!(id = %id, %status, ?reason, "Custodian refused to sign");
            return Err(SignerError::ProviderFailed {
                id,
                status: status.to_string(),
                reason,
            })
        }
        ProviderOutcome::TimedOut { external_id, attempts } => {
            return Err(SignerError::SigningTimeout { external_id, attempts })
        }
    };

    if messages.is_empty() {
        return Err(SignerError::NoSignatures { id });
    }

    let signatures = correlate_signed_messages(&id, &signing_hash, &messages)
        .and_then(|correlated| assemble_signatures(&id, &plan, &correlated))
        .inspect_err(|e| {
            if e.is_protocol_inconsistency() {
                tracing::error!(id = %id, error = %e, "Custodian response disagrees with wallet state");
            } else {
                tracing::warn!(id = %id, error = %e, "Custodian response rejected");
            }
        })?;

    tracing::info!(
        id = %id,
        signatures = signatures.input_signatures.len(),
        "Custodian signatures assembled"
    );
    Ok(signatures)
}

/// Compute and embed the signatures into `tx`.
///
/// The transaction is only touched once every signature is available.
pub async fn sign_transaction<T, S, P>(
    tx: &mut T,
    storage: &S,
    provider: &P,
    cancel: &CancellationToken,
) -> SignerResult<TxSignatures>
where
    T: SigningTransaction + ?Sized,
    S: WalletStorage + ?Sized,
    P: SigningProvider + ?Sized,
{
    let signatures = compute_signatures(&*tx, storage, provider, cancel).await?;

    for signature in &signatures.input_signatures {
        tx.attach_input_signature(signature)?;
    }
    if let Some(caller) = &signatures.caller_signature {
        tx.attach_caller_signature(caller)?;
    }

    Ok(signatures)
}
