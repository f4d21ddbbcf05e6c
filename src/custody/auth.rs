//! Request Authentication
//!
//! Every call to the custodian carries a short-lived RS256 JWT bound to the
//! request path, a fresh nonce and the SHA-256 of the body. Tokens expire
//! within a minute, so one is minted per request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{SignerError, SignerResult};
use crate::logging::redact_value;

/// Token lifetime; kept under the custodian's one-minute limit
pub const TOKEN_TTL_SECS: i64 = 55;

/// Produces the credentials for one outbound request
pub trait RequestAuthenticator: Send + Sync {
    /// Value of the `X-API-Key` header
    fn api_key(&self) -> &str;

    /// Bearer token for a request to `uri` (path and query) with `body`
    fn authorize(&self, uri: &str, body: &[u8]) -> SignerResult<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Claims<'a> {
    uri: &'a str,
    nonce: String,
    iat: i64,
    exp: i64,
    sub: &'a str,
    body_hash: String,
}

/// RS256 JWT authenticator keyed by the API secret
pub struct JwtAuthenticator {
    api_key: String,
    signing_key: SigningKey<Sha256>,
}

impl JwtAuthenticator {
    pub fn new(api_key: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            api_key: api_key.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Load the secret from PEM (PKCS#8 or PKCS#1)
    pub fn from_pem(api_key: impl Into<String>, pem: &str) -> SignerResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| SignerError::Auth(format!("Invalid API secret: {}", e)))?;
        Ok(Self::new(api_key, private_key))
    }

    /// Mint a token as of `now` (unix seconds)
    pub fn token_at(&self, uri: &str, body: &[u8], now: i64) -> SignerResult<String> {
        let claims = Claims {
            uri,
            nonce: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            sub: &self.api_key,
            body_hash: body_hash(body),
        };

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| SignerError::Auth(format!("Failed to encode claims: {}", e)))?;
        let signing_input = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));

        let signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| SignerError::Auth(format!("Failed to sign token: {}", e)))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_vec())
        ))
    }
}

impl RequestAuthenticator for JwtAuthenticator {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn authorize(&self, uri: &str, body: &[u8]) -> SignerResult<String> {
        self.token_at(uri, body, chrono::Utc::now().timestamp())
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("api_key", &redact_value(&self.api_key))
            .field("signing_key", &redact_value("rsa"))
            .finish()
    }
}

/// Hex SHA-256 of a request body (empty for GET)
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
