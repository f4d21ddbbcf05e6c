//! Account Key Verification
//!
//! The wallet only ever sees public keys. Before a custodian-backed wallet
//! is used, the key the custodian reports for address 0 is checked against
//! the one derived locally from the account xpub.

use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{PublicKey, Secp256k1};

use super::SigningProvider;
use crate::error::{SignerError, SignerResult};

/// Non-hardened path from a custodian root xpub to the wallet account
pub const ACCOUNT_PATH: [u32; 3] = [44, 280, 0];

/// Operation id reported on an account verification mismatch
pub const ACCOUNT_VERIFICATION_ID: &str = "account-verification";

/// Derive the account xpub from the custodian's root xpub
pub fn derive_account_xpub(root_xpub: &str) -> SignerResult<Xpub> {
    let root = Xpub::from_str(root_xpub.trim())?;
    derive_path(&root, &ACCOUNT_PATH)
}

/// Public key of `0/address_index` under an account xpub
pub fn derive_address_public_key(account_xpub: &Xpub, address_index: u32) -> SignerResult<PublicKey> {
    let child = derive_path(account_xpub, &[0, address_index])?;
    Ok(child.public_key)
}

/// Check that the custodian holds the key for address 0 of `account_xpub`
pub async fn verify_custodian_account<P>(provider: &P, account_xpub: &Xpub) -> SignerResult<PublicKey>
where
    P: SigningProvider + ?Sized,
{
    let local = derive_address_public_key(account_xpub, 0)?;
    let remote = provider.address_public_key(0).await?;

    if remote != local {
        tracing::error!(
            local = %local,
            remote = %remote,
            "Custodian public key does not match local public key"
        );
        return Err(SignerError::PublicKeyMismatch {
            id: ACCOUNT_VERIFICATION_ID.to_string(),
            address_index: 0,
        });
    }

    tracing::info!("Custodian account verified");
    Ok(local)
}

fn derive_path(xpub: &Xpub, path: &[u32]) -> SignerResult<Xpub> {
    let secp = Secp256k1::verification_only();
    let children = path
        .iter()
        .map(|&index| ChildNumber::from_normal_idx(index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(xpub.derive_pub(&secp, &children)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::ProviderOutcome;
    use crate::types::SigningHash;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    const ROOT_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    struct KeyOnly(PublicKey);

    #[async_trait]
    impl SigningProvider for KeyOnly {
        async fn send_and_await(
            &self,
            _signing_hash: &SigningHash,
            _address_indices: &[u32],
            _cancel: &CancellationToken,
        ) -> SignerResult<ProviderOutcome> {
            unreachable!("verification never signs")
        }

        async fn address_public_key(&self, _address_index: u32) -> SignerResult<PublicKey> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_account_derivation_is_step_by_step() {
        let root = Xpub::from_str(ROOT_XPUB).unwrap();
        let account = derive_account_xpub(ROOT_XPUB).unwrap();

        let mut step = root;
        for index in ACCOUNT_PATH {
            step = derive_path(&step, &[index]).unwrap();
        }
        assert_eq!(account, step);
        assert_eq!(account.depth, root.depth + 3);
        assert_eq!(
            account.to_string(),
            "xpub6Cxnxy4QXvNbJ3xCdTDGNUvb99WATLXPSHnPCmwAw9qNJLp1tRkSn6zXtEF8RTX8VPKYNYKKHvAv1TzDicK3hS6k6wDjTCfJbhVi9vwnM9d"
        );
    }

    #[test]
    fn test_address_keys() {
        let account = derive_account_xpub(ROOT_XPUB).unwrap();
        assert_eq!(
            derive_address_public_key(&account, 0).unwrap().to_string(),
            "03648d2be76cfb1fdfc14f20bcf2747750c6d1d7b42d439e7bbba780e327bb8d4b"
        );
        assert_eq!(
            derive_address_public_key(&account, 2).unwrap().to_string(),
            "033607b5f6c22ff68071d6ed9f76ac91ed98577fcdc471491d09aa6febf5649db3"
        );
    }

    #[test]
    fn test_rejects_invalid_xpub() {
        assert!(derive_account_xpub("xpub-not-really").is_err());
    }

    #[test]
    fn test_hardened_index_rejected() {
        let account = derive_account_xpub(ROOT_XPUB).unwrap();
        assert!(derive_address_public_key(&account, 0x8000_0000).is_err());
    }

    #[tokio::test]
    async fn test_verify_matching_account() {
        let account = derive_account_xpub(ROOT_XPUB).unwrap();
        let expected = derive_address_public_key(&account, 0).unwrap();

        let verified = verify_custodian_account(&KeyOnly(expected), &account).await.unwrap();
        assert_eq!(verified, expected);
    }

    #[tokio::test]
    async fn test_verify_mismatched_account() {
        let account = derive_account_xpub(ROOT_XPUB).unwrap();
        let other = derive_address_public_key(&account, 1).unwrap();

        let err = verify_custodian_account(&KeyOnly(other), &account).await.unwrap_err();
        assert!(matches!(err, SignerError::PublicKeyMismatch { address_index: 0, .. }));
    }
}
