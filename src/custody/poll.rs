//! Status polling
//!
//! A signing operation is polled at a fixed interval until it reaches a
//! terminal status or the attempt ceiling runs out.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::wire::{OperationStatus, TransactionInfo};
use super::ProviderOutcome;
use crate::config::PollPolicy;
use crate::error::{SignerError, SignerResult};
use crate::logging::redact_hash;

/// Where a signing operation stands from the client's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningPhase {
    Submitted,
    Polling { attempt: u32 },
    Finished(ProviderOutcome),
}

/// Poll `fetch` until the operation is terminal.
///
/// Each attempt waits `policy.interval` and then fetches once, so the
/// ceiling is `max_attempts` fetches over `max_attempts * interval`.
/// Transport errors from `fetch` abort the wait.
pub async fn poll_until_terminal<F, Fut>(
    external_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut fetch: F,
) -> SignerResult<ProviderOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SignerResult<TransactionInfo>>,
{
    let mut phase = SigningPhase::Submitted;

    for attempt in 1..=policy.max_attempts {
        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SignerError::Cancelled),
            info = async {
                tokio::time::sleep(policy.interval).await;
                fetch().await
            } => info?,
        };

        phase = SigningPhase::Polling { attempt };
        tracing::debug!(
            external_id = %redact_hash(external_id),
            attempt,
            status = %info.status,
            "Polled signing operation"
        );

        if let Some(outcome) = outcome_for(info) {
            tracing::info!(
                external_id = %redact_hash(external_id),
                attempt,
                "Signing operation reached a terminal status"
            );
            phase = SigningPhase::Finished(outcome);
            break;
        }
    }

    match phase {
        SigningPhase::Finished(outcome) => Ok(outcome),
        _ => {
            tracing::warn!(
                external_id = %redact_hash(external_id),
                attempts = policy.max_attempts,
                "Signing operation still pending at poll ceiling"
            );
            Ok(ProviderOutcome::TimedOut {
                external_id: external_id.to_string(),
                attempts: policy.max_attempts,
            })
        }
    }
}

/// Terminal outcome for a status snapshot; `None` while still in flight
pub fn outcome_for(info: TransactionInfo) -> Option<ProviderOutcome> {
    match info.status {
        OperationStatus::Completed => Some(ProviderOutcome::Completed {
            id: info.id,
            signed_messages: info.signed_messages.unwrap_or_default(),
        }),
        status if status.is_terminal() => Some(ProviderOutcome::Failed {
            id: info.id,
            status,
            reason: info.sub_status.filter(|s| !s.is_empty()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn info(status: OperationStatus) -> TransactionInfo {
        TransactionInfo {
            id: "tx-1".to_string(),
            external_tx_id: Some("ab".repeat(32)),
            status,
            sub_status: None,
            signed_messages: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_exact_ceiling() {
        let policy = PollPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let outcome = poll_until_terminal("ext", &policy, &CancellationToken::new(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(info(OperationStatus::PendingSignature)) }
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            ProviderOutcome::TimedOut {
                external_id: "ext".to_string(),
                attempts: 600
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 600);
        assert_eq!(start.elapsed(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_on_terminal_status() {
        let policy = PollPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = poll_until_terminal("ext", &policy, &CancellationToken::new(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Ok(info(OperationStatus::Queued))
                } else {
                    Ok(info(OperationStatus::Completed))
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(outcome, ProviderOutcome::Completed { ref signed_messages, .. } if signed_messages.is_empty()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_carries_sub_status() {
        let outcome = poll_until_terminal("ext", &PollPolicy::default(), &CancellationToken::new(), || async {
            let mut failed = info(OperationStatus::Failed);
            failed.sub_status = Some("SIGNER_REJECTED".to_string());
            Ok(failed)
        })
        .await
        .unwrap();

        assert_eq!(
            outcome,
            ProviderOutcome::Failed {
                id: "tx-1".to_string(),
                status: OperationStatus::Failed,
                reason: Some("SIGNER_REJECTED".to_string()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let result = poll_until_terminal("ext", &PollPolicy::default(), &cancel, || async {
            Ok(info(OperationStatus::Submitted))
        })
        .await;

        assert!(matches!(result, Err(SignerError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_propagates() {
        let result = poll_until_terminal("ext", &PollPolicy::default(), &CancellationToken::new(), || async {
            Err(SignerError::Transport("Connection failed".to_string()))
        })
        .await;

        assert!(matches!(result, Err(SignerError::Transport(_))));
    }

    #[test]
    fn test_outcome_for_in_flight() {
        assert!(outcome_for(info(OperationStatus::Broadcasting)).is_none());
        assert!(outcome_for(info(OperationStatus::Unknown)).is_none());
        assert!(matches!(
            outcome_for(info(OperationStatus::Blocked)),
            Some(ProviderOutcome::Failed { status: OperationStatus::Blocked, .. })
        ));
    }
}
