//! Custodian Provider Configuration
//!
//! Connection settings for the custodian:
//! - Base URL with TLS enforcement (plain HTTP only for loopback)
//! - API key and RSA secret (held as a secret, never logged)
//! - Polling policy for signing operations
//! - Derivation prefix applied to every address index

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{SignerError, SignerResult};

/// Custodian error code for a duplicate `externalTxId`
pub const DUPLICATE_EXTERNAL_TX_ID_CODE: i64 = 1438;

/// BIP44 prefix for the wallet's account, followed by the address index
pub const DEFAULT_DERIVATION_PREFIX: [u32; 4] = [44, 280, 0, 0];

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 600;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Environment variables
pub const ENV_URL: &str = "CUSTODIAN_URL";
pub const ENV_API_KEY: &str = "CUSTODIAN_API_KEY";
pub const ENV_API_SECRET: &str = "CUSTODIAN_API_SECRET";
pub const ENV_API_SECRET_FILE: &str = "CUSTODIAN_API_SECRET_FILE";
pub const ENV_POLL_INTERVAL_MS: &str = "CUSTODIAN_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "CUSTODIAN_POLL_MAX_ATTEMPTS";

// =============================================================================
// Poll Policy
// =============================================================================

/// How long to wait for a signing operation to reach a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each status check
    pub interval: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Total wait before a pending operation times out
    pub fn ceiling(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS)
    }
}

// =============================================================================
// Provider Configuration
// =============================================================================

/// Everything needed to talk to the custodian
#[derive(Debug)]
pub struct ProviderConfig {
    pub base_url: Url,
    pub api_key: String,
    pub api_secret: SecretString,
    pub poll: PollPolicy,
    pub derivation_prefix: Vec<u32>,
    pub request_timeout: Duration,
    /// Error code the custodian uses for an already submitted operation
    pub duplicate_error_code: i64,
}

/// Serialized form, e.g. from a TOML or JSON settings file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderSettings {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub api_secret_file: Option<String>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub poll_max_attempts: Option<u32>,
    #[serde(default)]
    pub derivation_prefix: Option<Vec<u32>>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub duplicate_error_code: Option<i64>,
}

impl ProviderConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>, api_secret: SecretString) -> SignerResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SignerError::config(format!("Invalid custodian URL: {}", e)))?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            api_secret,
            poll: PollPolicy::default(),
            derivation_prefix: DEFAULT_DERIVATION_PREFIX.to_vec(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            duplicate_error_code: DUPLICATE_EXTERNAL_TX_ID_CODE,
        })
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_derivation_prefix(mut self, prefix: Vec<u32>) -> Self {
        self.derivation_prefix = prefix;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_duplicate_error_code(mut self, code: i64) -> Self {
        self.duplicate_error_code = code;
        self
    }

    /// Absolute URL for an API path such as `/v1/transactions`
    ///
    /// Any path on the base URL is kept as a prefix.
    pub fn endpoint(&self, uri: &str) -> SignerResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let prefix = format!("{}/", base.path());
            base.set_path(&prefix);
        }

        base.join(uri.trim_start_matches('/'))
            .map_err(|e| SignerError::config(format!("Invalid endpoint {}: {}", uri, e)))
    }

    /// Reject settings that would leak credentials or never finish
    pub fn validate(&self) -> SignerResult<()> {
        match self.base_url.scheme() {
            "https" => {}
            "http" => {
                // Allow HTTP only for loopback development servers
                let loopback = matches!(
                    self.base_url.host_str(),
                    Some("localhost") | Some("127.0.0.1") | Some("[::1]")
                );
                if !loopback {
                    return Err(SignerError::config(
                        "Custodian URL must use HTTPS outside of localhost",
                    ));
                }
            }
            other => {
                return Err(SignerError::config(format!(
                    "Unsupported URL scheme: {}",
                    other
                )))
            }
        }

        if !self.base_url.username().is_empty() || self.base_url.password().is_some() {
            return Err(SignerError::config(
                "Custodian URL must not embed credentials",
            ));
        }

        if self.api_key.trim().is_empty() {
            return Err(SignerError::config("API key is empty"));
        }

        if self.api_secret.expose_secret().trim().is_empty() {
            return Err(SignerError::config("API secret is empty"));
        }

        if self.poll.max_attempts == 0 {
            return Err(SignerError::config("Poll max attempts must be at least 1"));
        }

        if self.poll.interval.is_zero() {
            return Err(SignerError::config("Poll interval must be positive"));
        }

        if self.derivation_prefix.is_empty() {
            return Err(SignerError::config("Derivation prefix is empty"));
        }

        Ok(())
    }

    pub fn from_settings(settings: ProviderSettings) -> SignerResult<Self> {
        let secret = match (settings.api_secret, settings.api_secret_file) {
            (Some(secret), _) => secret,
            (None, Some(path)) => read_secret_file(Path::new(&path))?,
            (None, None) => return Err(SignerError::config("API secret is not configured")),
        };

        let mut config = Self::new(&settings.url, settings.api_key, SecretString::from(secret))?;

        let mut poll = PollPolicy::default();
        if let Some(ms) = settings.poll_interval_ms {
            poll.interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = settings.poll_max_attempts {
            poll.max_attempts = attempts;
        }
        config.poll = poll;

        if let Some(prefix) = settings.derivation_prefix {
            config.derivation_prefix = prefix;
        }
        if let Some(secs) = settings.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(code) = settings.duplicate_error_code {
            config.duplicate_error_code = code;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from the `CUSTODIAN_*` environment variables
    pub fn from_env() -> SignerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> SignerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SignerError::config(format!("{} is not set", name)))
        };

        let poll_interval_ms = lookup(ENV_POLL_INTERVAL_MS)
            .map(|v| parse_number::<u64>(ENV_POLL_INTERVAL_MS, &v))
            .transpose()?;
        let poll_max_attempts = lookup(ENV_POLL_MAX_ATTEMPTS)
            .map(|v| parse_number::<u32>(ENV_POLL_MAX_ATTEMPTS, &v))
            .transpose()?;

        Self::from_settings(ProviderSettings {
            url: required(ENV_URL)?,
            api_key: required(ENV_API_KEY)?,
            api_secret: lookup(ENV_API_SECRET).filter(|v| !v.trim().is_empty()),
            api_secret_file: lookup(ENV_API_SECRET_FILE),
            poll_interval_ms,
            poll_max_attempts,
            derivation_prefix: None,
            request_timeout_secs: None,
            duplicate_error_code: None,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> SignerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SignerError::config(format!("{} must be a number, got {:?}", name, value)))
}

fn read_secret_file(path: &Path) -> SignerResult<String> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SignerError::config(format!("Cannot read API secret file {}: {}", path.display(), e))
    })?;
    Ok(contents.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(url: &str) -> ProviderConfig {
        ProviderConfig::new(url, "key", SecretString::from("secret".to_string())).unwrap()
    }

    #[test]
    fn test_default_poll_ceiling() {
        let poll = PollPolicy::default();
        assert_eq!(poll.max_attempts, 600);
        assert_eq!(poll.ceiling(), Duration::from_secs(600));
    }

    #[test]
    fn test_https_required() {
        assert!(config("https://api.custodian.example").validate().is_ok());
        assert!(config("http://api.custodian.example").validate().is_err());
        assert!(config("http://127.0.0.1:8080").validate().is_ok());
        assert!(config("http://localhost:8080").validate().is_ok());
        assert!(config("ftp://api.custodian.example").validate().is_err());
        assert!(config("https://user:pw@api.custodian.example").validate().is_err());
    }

    #[test]
    fn test_rejects_degenerate_polling_and_prefix() {
        let zero_interval = config("https://api.custodian.example")
            .with_poll_policy(PollPolicy::new(Duration::ZERO, 10));
        assert!(zero_interval.validate().is_err());

        let no_prefix = config("https://api.custodian.example").with_derivation_prefix(Vec::new());
        assert!(no_prefix.validate().is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let cfg = config("https://api.custodian.example");
        assert_eq!(
            cfg.endpoint("/v1/transactions").unwrap().as_str(),
            "https://api.custodian.example/v1/transactions"
        );
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let cfg = config("https://gw.example/custodian");
        assert_eq!(
            cfg.endpoint("/v1/transactions").unwrap().as_str(),
            "https://gw.example/custodian/v1/transactions"
        );

        let trailing = config("https://gw.example/custodian/");
        assert_eq!(
            trailing
                .endpoint("/v1/vault/accounts_paged?orderBy=DESC&limit=1")
                .unwrap()
                .as_str(),
            "https://gw.example/custodian/v1/vault/accounts_paged?orderBy=DESC&limit=1"
        );
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_URL, "https://api.custodian.example"),
            (ENV_API_KEY, "key-1"),
            (ENV_API_SECRET, "pem"),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_POLL_MAX_ATTEMPTS, "4"),
        ]
        .into_iter()
        .collect();

        let cfg = ProviderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.api_key, "key-1");
        assert_eq!(cfg.poll, PollPolicy::new(Duration::from_millis(250), 4));
        assert_eq!(cfg.derivation_prefix, vec![44, 280, 0, 0]);
        assert_eq!(cfg.duplicate_error_code, DUPLICATE_EXTERNAL_TX_ID_CODE);
    }

    #[test]
    fn test_from_lookup_missing_values() {
        let err = ProviderConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(ENV_URL));

        let bad_number = ProviderConfig::from_lookup(|k| match k {
            ENV_URL => Some("https://a.example".to_string()),
            ENV_API_KEY => Some("k".to_string()),
            ENV_API_SECRET => Some("s".to_string()),
            ENV_POLL_MAX_ATTEMPTS => Some("many".to_string()),
            _ => None,
        });
        assert!(bad_number.is_err());
    }

    #[test]
    fn test_secret_file() {
        let path = std::env::temp_dir().join(format!("custody-secret-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, "  pem-contents\n").unwrap();

        let settings = ProviderSettings {
            url: "https://api.custodian.example".to_string(),
            api_key: "k".to_string(),
            api_secret: None,
            api_secret_file: Some(path.display().to_string()),
            poll_interval_ms: None,
            poll_max_attempts: Some(0),
            derivation_prefix: None,
            request_timeout_secs: None,
            duplicate_error_code: None,
        };

        // Zero attempts is rejected after the secret loads
        let err = ProviderConfig::from_settings(settings.clone()).unwrap_err();
        assert!(err.to_string().contains("attempts"));

        let cfg = ProviderConfig::from_settings(ProviderSettings {
            poll_max_attempts: None,
            ..settings
        })
        .unwrap();
        assert_eq!(cfg.api_secret.expose_secret(), "pem-contents");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_secret_not_in_debug() {
        let cfg = config("https://api.custodian.example");
        assert!(!format!("{:?}", cfg).contains("\"secret\""));
    }
}
