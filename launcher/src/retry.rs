//! Bounded retry with a fixed delay for network-dependent steps.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::mask::Redactor;

/// Attempt budget and pause between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is used up.
///
/// Returns true on the first success. Waits `policy.delay` after every
/// failed attempt except the last. The wait yields to the runtime and ends
/// early when `cancel` fires, in which case no further attempt is made.
/// Error messages pass through `redactor` before they are logged.
pub async fn retry<F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    redactor: &Redactor,
    cancel: &CancellationToken,
    mut operation: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let max_attempts = policy.max_attempts;
    for attempt in 1..=max_attempts {
        info!(attempt, max_attempts, "{label}");
        let err = match operation().await {
            Ok(()) => return true,
            Err(err) => err,
        };
        warn!(
            attempt,
            max_attempts,
            error = %redactor.redact(&format!("{err:#}")),
            "{label} attempt failed"
        );
        if cancel.is_cancelled() {
            return false;
        }
        if attempt < max_attempts {
            info!(delay_secs = policy.delay.as_secs(), "waiting before retry");
            tokio::select! {
                () = tokio::time::sleep(policy.delay) => {}
                () = cancel.cancelled() => return false,
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success_with_one_delay_per_failure() {
        for succeed_on in 1..=4u32 {
            let calls = Cell::new(0u32);
            let start = Instant::now();
            let ok = retry(
                &policy(4),
                "op",
                &Redactor::new(),
                &CancellationToken::new(),
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n >= succeed_on {
                            Ok(())
                        } else {
                            Err(anyhow::anyhow!("fail {n}"))
                        }
                    }
                },
            )
            .await;
            assert!(ok);
            assert_eq!(calls.get(), succeed_on);
            assert_eq!(start.elapsed(), Duration::from_secs(5) * (succeed_on - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_without_trailing_delay() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let ok = retry(
            &policy(3),
            "op",
            &Redactor::new(),
            &CancellationToken::new(),
            || {
                calls.set(calls.get() + 1);
                async { Err(anyhow::anyhow!("down")) }
            },
        )
        .await;
        assert!(!ok);
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        let calls = Cell::new(0u32);
        let ok = retry(&policy(5), "op", &Redactor::new(), &cancel, || {
            calls.set(calls.get() + 1);
            cancel.cancel();
            async { Err(anyhow::anyhow!("interrupted")) }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.get(), 1);
    }
}
