//! Bounded waiting for UI conditions
//!
//! Every suspension point carries a maximum wait. Exceeding it yields
//! `None`/`false` to the caller, who decides whether that is an action
//! error or a fatal session failure.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::errors::ActionError;

/// Wait budgets applied by drivers and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Interval between condition probes (milliseconds)
    pub poll_interval_ms: u64,

    /// Default bound for a single action (milliseconds)
    pub action_timeout_ms: u64,

    /// Bound for a dialog to close after a recovery click (milliseconds)
    pub dialog_close_timeout_ms: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            action_timeout_ms: 10_000,
            dialog_close_timeout_ms: 3_000,
        }
    }
}

impl WaitPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn dialog_close_timeout(&self) -> Duration {
        Duration::from_millis(self.dialog_close_timeout_ms)
    }
}

/// Probe until it yields a value or the timeout elapses.
///
/// The probe runs at least once. Probe errors end the wait immediately.
pub async fn poll_for<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<Option<T>, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ActionError>>,
{
    let deadline = Instant::now() + timeout;
    let mut probes = 0u32;
    loop {
        probes += 1;
        if let Some(value) = probe().await? {
            debug!(probes, "wait condition observed");
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(probes, timeout_ms = timeout.as_millis() as u64, "wait elapsed");
            return Ok(None);
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// Boolean form of [`poll_for`].
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<bool, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ActionError>>,
{
    let observed = poll_for(timeout, interval, || {
        let fut = probe();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await?;
    Ok(observed.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_wait_policy() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.poll_interval_ms, 250);
        assert_eq!(policy.action_timeout_ms, 10_000);
        assert_eq!(policy.dialog_close_timeout_ms, 3_000);
    }

    #[tokio::test]
    async fn poll_returns_once_condition_holds() {
        let calls = AtomicU32::new(0);
        let seen = poll_until(Duration::from_secs(1), Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await
        .unwrap();
        assert!(seen);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_gives_up_after_timeout() {
        let seen = poll_until(Duration::from_millis(20), Duration::from_millis(5), || async {
            Ok(false)
        })
        .await
        .unwrap();
        assert!(!seen);
    }

    #[tokio::test]
    async fn probe_errors_end_the_wait() {
        let result = poll_for::<(), _, _>(Duration::from_secs(1), Duration::from_millis(1), || async {
            Err(ActionError::driver("session closed"))
        })
        .await;
        assert_eq!(result, Err(ActionError::driver("session closed")));
    }
}
