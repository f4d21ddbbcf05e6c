//! Structured Logging with Sensitive Data Redaction
//!
//! Events go through `tracing`. Values placed in log fields pass through
//! the redaction helpers here:
//! - API keys and secrets are fully redacted
//! - Signing hashes and external ids are shortened

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Filter used when neither the caller nor `RUST_LOG` supplies one
pub const DEFAULT_FILTER: &str = "custody_signer=info";

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global stderr subscriber. Repeated calls are ignored.
pub fn init_logging(filter: Option<&str>) {
    INIT.get_or_init(|| {
        let env_filter = match filter {
            Some(directives) => EnvFilter::try_new(directives).ok(),
            None => EnvFilter::try_from_default_env().ok(),
        }
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}

/// Fully redact a sensitive value
pub fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.len();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Partially redact a hash (show first 10 and last 6 chars)
pub fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    if trimmed.len() <= 20 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    format!("{}...{}", &trimmed[..10], &trimmed[trimmed.len() - 6..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_value() {
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
        assert_eq!(redact_value("secret_key_12345"), "[REDACTED:16chars]");
    }

    #[test]
    fn test_redact_hash() {
        let hash = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
        let redacted = redact_hash(hash);
        assert_eq!(redacted, "1234567890...abcdef");
        assert_eq!(redact_hash("tx-1"), "tx-1");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(Some("custody_signer=debug"));
        init_logging(None);
    }
}
