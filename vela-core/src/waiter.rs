//! Waiter - polling for remote status transitions
//!
//! Control-plane mutations are eventually consistent: a create or delete
//! call returns before the resource reaches a usable status. `StateChange`
//! polls a refresh closure with exponential backoff until the reported
//! status lands in a target set, and `retry_matching` re-runs an operation
//! for a bounded window while a specific error keeps occurring.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::provider::{ProviderError, ProviderResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
const MAX_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Generic status poller.
///
/// The refresh closure fetches the remote resource and reports it together
/// with its status label; `Ok(None)` means the resource was not found.
/// `wait` polls until the status reaches the target set, the resource
/// disappears (success for deletion waiters, which have an empty target
/// set), or the timeout elapses.
pub struct StateChange<F> {
    pending: Vec<String>,
    target: Vec<String>,
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    not_found_checks: u32,
    refresh: F,
}

impl<F, Fut, T> StateChange<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<Option<(T, String)>>>,
{
    pub fn new(refresh: F) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            min_interval: DEFAULT_MIN_INTERVAL,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            refresh,
        }
    }

    /// Statuses the resource is allowed to report while the transition is
    /// in progress. Anything outside pending and target fails immediately.
    pub fn pending(mut self, statuses: &[&str]) -> Self {
        self.pending = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Statuses that complete the wait. Leave empty for deletion waiters,
    /// which complete when the resource disappears.
    pub fn target(mut self, statuses: &[&str]) -> Self {
        self.target = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Initial pause before the first poll. Counts against the timeout.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Starting poll interval; doubles after each poll, capped at 30s.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// How many consecutive not-found reads to tolerate while a fresh
    /// create propagates (ignored by deletion waiters).
    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll until the target set is reached. Returns the last fetched
    /// object, or `None` when a deletion waiter observed disappearance.
    pub async fn wait(mut self) -> ProviderResult<Option<T>> {
        let deadline = Instant::now() + self.timeout;

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let mut interval = self.min_interval;
        let mut not_found = 0u32;
        let mut last_status: Option<String> = None;

        loop {
            match (self.refresh)().await? {
                Some((object, status)) => {
                    if self.target.iter().any(|t| *t == status) {
                        return Ok(Some(object));
                    }
                    if !self.pending.iter().any(|p| *p == status) {
                        return Err(ProviderError::new(format!(
                            "unexpected status '{}', waiting for one of [{}]",
                            status,
                            self.target.join(", ")
                        )));
                    }
                    not_found = 0;
                    last_status = Some(status);
                }
                None => {
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ProviderError::new(format!(
                            "resource not found after {} consecutive checks",
                            self.not_found_checks
                        )));
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let last = last_status.as_deref().unwrap_or("<not found>");
                return Err(ProviderError::new(format!(
                    "timeout after {:?} waiting for status [{}] (last status: '{}')",
                    self.timeout,
                    self.target.join(", "),
                    last
                )));
            }

            debug!(
                status = last_status.as_deref().unwrap_or("<not found>"),
                "waiting for status change"
            );
            // Never start a sleep that would overshoot the deadline; the
            // final poll happens right at it.
            sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(MAX_INTERVAL);
        }
    }
}

/// Retry an operation while `matches` accepts the returned error.
///
/// Used by delete handlers that must out-wait a propagation error. After
/// the window closes one final attempt is made and its result returned
/// as-is.
pub async fn retry_matching<T, F, Fut, M>(
    timeout: Duration,
    matches: M,
    mut op: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
    M: Fn(&ProviderError) -> bool,
{
    let deadline = Instant::now() + timeout;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if matches(&err) => {
                if Instant::now() >= deadline {
                    return op().await;
                }
                debug!(error = %err, "retryable error, retrying");
                sleep(RETRY_INTERVAL).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(
        statuses: Vec<Option<&'static str>>,
    ) -> impl FnMut() -> std::future::Ready<ProviderResult<Option<(&'static str, String)>>> {
        let mut steps = statuses.into_iter();
        move || {
            let step = steps.next().unwrap_or(None);
            std::future::ready(Ok(step.map(|s| (s, s.to_string()))))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reaches_target() {
        let result = StateChange::new(scripted(vec![
            Some("creating"),
            Some("creating"),
            Some("active"),
        ]))
        .pending(&["creating", "modifying"])
        .target(&["active"])
        .timeout(Duration::from_secs(60))
        .wait()
        .await
        .unwrap();

        assert_eq!(result, Some("active"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_fails_on_unexpected_status() {
        let err = StateChange::new(scripted(vec![Some("creating"), Some("failed")]))
            .pending(&["creating"])
            .target(&["active"])
            .timeout(Duration::from_secs(60))
            .wait()
            .await
            .unwrap_err();

        assert!(err.message.contains("unexpected status 'failed'"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_with_last_status() {
        let err = StateChange::new(scripted(vec![Some("creating"); 100]))
            .pending(&["creating"])
            .target(&["active"])
            .timeout(Duration::from_secs(5))
            .min_interval(Duration::from_secs(1))
            .wait()
            .await
            .unwrap_err();

        assert!(err.message.contains("timeout"));
        assert!(err.message.contains("last status: 'creating'"));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_waiter_succeeds_on_disappearance() {
        let result = StateChange::new(scripted(vec![Some("deleting"), Some("deleting"), None]))
            .pending(&["deleting"])
            .target(&[])
            .timeout(Duration::from_secs(60))
            .wait()
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_tolerated_while_creating() {
        let result = StateChange::new(scripted(vec![None, None, Some("active")]))
            .target(&["active"])
            .timeout(Duration::from_secs(60))
            .wait()
            .await
            .unwrap();

        assert_eq!(result, Some("active"));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_not_found_fails() {
        let err = StateChange::new(scripted(vec![None; 10]))
            .target(&["active"])
            .timeout(Duration::from_secs(600))
            .not_found_checks(3)
            .wait()
            .await
            .unwrap_err();

        assert!(err.message.contains("not found after 3 consecutive checks"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_counts_against_timeout() {
        let err = StateChange::new(scripted(vec![Some("pending"); 10]))
            .pending(&["pending"])
            .target(&["available"])
            .timeout(Duration::from_secs(10))
            .delay(Duration::from_secs(30))
            .wait()
            .await
            .unwrap_err();

        assert!(err.message.contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_errors_fail_immediately() {
        let mut calls = 0u32;
        let err = StateChange::new(move || {
            calls += 1;
            let result: ProviderResult<Option<((), String)>> = match calls {
                1 => Ok(Some(((), "creating".to_string()))),
                _ => Err(ProviderError::new("DescribeUserGroups failed")),
            };
            std::future::ready(result)
        })
        .pending(&["creating"])
        .target(&["active"])
        .timeout(Duration::from_secs(60))
        .wait()
        .await
        .unwrap_err();

        assert!(err.message.contains("DescribeUserGroups failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_matching_retries_until_success() {
        let mut attempts = 0u32;
        let result = retry_matching(
            Duration::from_secs(120),
            |err| err.message.contains("still propagating"),
            move || {
                attempts += 1;
                let result = if attempts < 3 {
                    Err(ProviderError::new("still propagating"))
                } else {
                    Ok(attempts)
                };
                std::future::ready(result)
            },
        )
        .await
        .unwrap();

        assert_eq!(result, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_matching_passes_through_other_errors() {
        let err = retry_matching(
            Duration::from_secs(120),
            |err| err.message.contains("still propagating"),
            || std::future::ready(Err::<(), _>(ProviderError::new("access denied"))),
        )
        .await
        .unwrap_err();

        assert_eq!(err.message, "access denied");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_matching_gives_up_after_deadline() {
        let mut attempts = 0u32;
        let err = retry_matching(
            Duration::from_secs(12),
            |err| err.message.contains("still propagating"),
            move || {
                attempts += 1;
                std::future::ready(Err::<(), _>(ProviderError::new(format!(
                    "still propagating (attempt {attempts})"
                ))))
            },
        )
        .await
        .unwrap_err();

        // The post-deadline final attempt is surfaced verbatim
        assert!(err.message.contains("still propagating"));
    }
}
