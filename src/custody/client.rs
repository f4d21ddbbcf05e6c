//! Custodian REST client
//!
//! Submits raw signing requests and follows them to a terminal status.
//! Every request is authenticated individually; tokens are never reused.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::secp256k1::PublicKey;
use reqwest::{Client, Method};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::auth::{JwtAuthenticator, RequestAuthenticator};
use super::poll::poll_until_terminal;
use super::wire::{
    derivation_path, CreateTransactionResponse, OperationStatus, ProviderErrorBody, PublicKeyInfo,
    RawSigningRequest, TransactionInfo, RAW_SIGNING_ALGORITHM,
};
use super::{ProviderOutcome, SigningProvider};
use crate::config::ProviderConfig;
use crate::error::{SignerError, SignerResult};
use crate::logging::{redact_hash, redact_value};
use crate::types::SigningHash;

const API_VERSION: &str = "v1";
const USER_AGENT: &str = concat!("custody-signer/", env!("CARGO_PKG_VERSION"));

/// Result of submitting a signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created { id: String, status: OperationStatus },
    /// An operation with this external id was submitted before
    AlreadyExists,
}

/// Client for the custodian's raw signing API
pub struct CustodianClient {
    http: Client,
    config: ProviderConfig,
    auth: Arc<dyn RequestAuthenticator>,
}

impl CustodianClient {
    /// Build a client authenticating with the configured RSA secret
    pub fn new(config: ProviderConfig) -> SignerResult<Self> {
        let auth = JwtAuthenticator::from_pem(config.api_key.clone(), config.api_secret.expose_secret())?;
        Self::with_authenticator(config, Arc::new(auth))
    }

    pub fn with_authenticator(
        config: ProviderConfig,
        auth: Arc<dyn RequestAuthenticator>,
    ) -> SignerResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_nodelay(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SignerError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config, auth })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    // =========================================================================
    // Signing operations
    // =========================================================================

    /// Submit one raw message per address index, all over `signing_hash`.
    ///
    /// A duplicate external id means the same hash was submitted earlier and
    /// is reported as [`SubmitOutcome::AlreadyExists`].
    pub async fn submit_raw_signing_request(
        &self,
        signing_hash: &SigningHash,
        address_indices: &[u32],
    ) -> SignerResult<SubmitOutcome> {
        let request = RawSigningRequest::new(signing_hash, address_indices, &self.config.derivation_prefix);
        let body = serde_json::to_vec(&request)?;
        let uri = format!("/{}/transactions", API_VERSION);

        tracing::info!(
            external_id = %redact_hash(&request.external_tx_id),
            messages = address_indices.len(),
            "Submitting raw signing request"
        );

        match self.send::<CreateTransactionResponse>(Method::POST, &uri, body).await {
            Ok(created) => {
                tracing::debug!(id = %created.id, status = %created.status, "Signing request created");
                Ok(SubmitOutcome::Created {
                    id: created.id,
                    status: created.status,
                })
            }
            Err(SignerError::Provider { code: Some(code), .. }) if code == self.config.duplicate_error_code => {
                tracing::info!(
                    external_id = %redact_hash(&request.external_tx_id),
                    "Signing request already exists, resuming"
                );
                Ok(SubmitOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn transaction_by_id(&self, id: &str) -> SignerResult<TransactionInfo> {
        let uri = format!("/{}/transactions/{}", API_VERSION, id);
        self.send(Method::GET, &uri, Vec::new()).await
    }

    pub async fn transaction_by_external_id(&self, external_id: &str) -> SignerResult<TransactionInfo> {
        let uri = format!("/{}/transactions/external_tx_id/{}", API_VERSION, external_id);
        self.send(Method::GET, &uri, Vec::new()).await
    }

    /// Poll by external id until terminal or the configured ceiling
    pub async fn poll_until_complete(
        &self,
        external_id: &str,
        cancel: &CancellationToken,
    ) -> SignerResult<ProviderOutcome> {
        poll_until_terminal(external_id, &self.config.poll, cancel, move || {
            self.transaction_by_external_id(external_id)
        })
        .await
    }

    // =========================================================================
    // Vault queries
    // =========================================================================

    /// Public key the custodian holds at `derivation_path`
    pub async fn public_key_info(&self, path: &[u32]) -> SignerResult<PublicKeyInfo> {
        let path_json = serde_json::to_string(path)?;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("derivationPath", &path_json)
            .append_pair("algorithm", RAW_SIGNING_ALGORITHM)
            .append_pair("compressed", "true")
            .finish();
        let uri = format!("/{}/vault/public_key_info?{}", API_VERSION, query);
        self.send(Method::GET, &uri, Vec::new()).await
    }

    /// Check credentials and connectivity with a minimal authenticated call
    pub async fn ping(&self) -> SignerResult<()> {
        let uri = format!("/{}/vault/accounts_paged?orderBy=DESC&limit=1", API_VERSION);
        self.send::<serde_json::Value>(Method::GET, &uri, Vec::new()).await?;
        Ok(())
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn send<T: DeserializeOwned>(&self, method: Method, uri: &str, body: Vec<u8>) -> SignerResult<T> {
        let token = self.auth.authorize(uri, &body)?;
        let url = self.config.endpoint(uri)?;

        let mut request = self
            .http
            .request(method, url)
            .header("X-API-Key", self.auth.api_key())
            .bearer_auth(token);
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let parsed: Option<ProviderErrorBody> = serde_json::from_slice(&bytes).ok();
            let (code, message) = match parsed {
                Some(b) => (b.code, b.message.unwrap_or_default()),
                None => (None, String::from_utf8_lossy(&bytes).into_owned()),
            };
            tracing::debug!(status = status.as_u16(), ?code, "Custodian rejected request");
            return Err(SignerError::Provider {
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            SignerError::invalid_response(format!("Unexpected body from {}: {}", uri, e))
        })
    }
}

impl std::fmt::Debug for CustodianClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodianClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("api_key", &redact_value(&self.config.api_key))
            .finish()
    }
}

#[async_trait]
impl SigningProvider for CustodianClient {
    async fn send_and_await(
        &self,
        signing_hash: &SigningHash,
        address_indices: &[u32],
        cancel: &CancellationToken,
    ) -> SignerResult<ProviderOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SignerError::Cancelled),
            submitted = self.submit_raw_signing_request(signing_hash, address_indices) => submitted?,
        };
        self.poll_until_complete(&signing_hash.to_hex(), cancel).await
    }

    async fn address_public_key(&self, address_index: u32) -> SignerResult<PublicKey> {
        let path = derivation_path(&self.config.derivation_prefix, address_index);
        let info = self.public_key_info(&path).await?;
        let bytes = hex::decode(&info.public_key)?;
        PublicKey::from_slice(&bytes)
            .map_err(|e| SignerError::invalid_response(format!("Invalid public key from custodian: {}", e)))
    }
}
