//! Bounded retry with per-attempt timeout and exponential backoff
//!
//! [`retry_with_backoff`] drives any async operation through the attempts a
//! [`RetryPolicy`] allows. Each attempt runs under its own timer; when the timer
//! fires the attempt's future is dropped, which aborts whatever it had in flight.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::error::{AttemptRecord, FetchError, RetryFailure};

/// Default number of attempts per call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default delay after the first failed attempt in milliseconds
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Default multiplier applied to the delay after each further failure
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// How many times to try, how long each try may take, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts; values below 1 are treated as 1
    pub max_attempts: u32,
    /// Time limit for a single attempt
    pub timeout: Duration,
    /// Wait after the first failed attempt
    pub base_delay: Duration,
    /// Growth of the wait after each further failure
    pub backoff_factor: u32,
    /// Report attempt failures at info/warn level instead of debug
    pub verbose: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            verbose: false,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and per-attempt timeout,
    /// keeping the default backoff
    pub fn new(max_attempts: u32, timeout_ms: u64) -> Self {
        Self {
            max_attempts,
            timeout: Duration::from_millis(timeout_ms),
            ..Self::default()
        }
    }

    /// Sets the backoff base delay and factor
    pub fn with_backoff(mut self, base_delay: Duration, factor: u32) -> Self {
        self.base_delay = base_delay;
        self.backoff_factor = factor;
        self
    }

    /// Sets whether attempt failures are reported loudly
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of attempts that will actually be made
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after the failed attempt with 0-based index `attempt`
    ///
    /// `base_delay * factor^attempt`, saturating instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are used up
///
/// `operation` receives the 0-based attempt index. An attempt that outlives
/// `policy.timeout` fails with [`FetchError::Timeout`]. Between failed attempts
/// the loop sleeps for [`RetryPolicy::delay_after`]; there is no sleep after the
/// final attempt. On exhaustion the last attempt's error is returned together
/// with the history of every failed attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts();
    let mut history = Vec::with_capacity(attempts as usize);
    let mut attempt = 0;

    loop {
        let result = match timeout(policy.timeout, operation(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(policy.timeout)),
        };

        let err = match result {
            Ok(value) => {
                if policy.verbose && attempt > 0 {
                    info!(attempt, "request succeeded after retry");
                } else {
                    debug!(attempt, "request succeeded");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        history.push(AttemptRecord {
            index: attempt,
            timeout: policy.timeout,
            error: err.to_string(),
        });

        if attempt + 1 >= attempts {
            if policy.verbose {
                warn!(attempts, error = %err, "giving up after final attempt");
            } else {
                debug!(attempts, error = %err, "giving up after final attempt");
            }
            return Err(RetryFailure { last: err, history });
        }

        let delay = policy.delay_after(attempt);
        if policy.verbose {
            warn!(
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            );
        } else {
            debug!(
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            );
        }

        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Paused-clock timers fire on millisecond ticks, so allow a little slack
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(10),
            "expected about {:?}, got {:?}",
            expected,
            actual
        );
    }

    fn unavailable() -> FetchError {
        FetchError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            url: "http://localhost/api/news".to_string(),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_millis(5000));
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.backoff_factor, 2);
        assert!(!policy.verbose);
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_after(64),
            Duration::from_millis(500).saturating_mul(u32::MAX)
        );
    }

    #[test]
    fn test_zero_attempts_treated_as_one() {
        let policy = RetryPolicy::new(0, 1000);
        assert_eq!(policy.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_makes_exactly_n_attempts() {
        for n in 1..=5u32 {
            let calls = AtomicU32::new(0);
            let policy = RetryPolicy::new(n, 1000);

            let result: Result<(), _> = retry_with_backoff(&policy, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(FetchError::Status {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        url: format!("attempt-{}", attempt),
                    })
                }
            })
            .await;

            let failure = result.expect_err("every attempt fails");
            assert_eq!(calls.load(Ordering::SeqCst), n);
            assert_eq!(failure.attempts(), n as usize);
            match failure.last {
                FetchError::Status { url, .. } => assert_eq!(url, format!("attempt-{}", n - 1)),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_attempt_without_further_tries() {
        for n in 2..=4u32 {
            let calls = AtomicU32::new(0);
            let policy = RetryPolicy::new(n, 1000);

            let result = retry_with_backoff(&policy, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt + 1 < n {
                        Err(unavailable())
                    } else {
                        Ok("payload")
                    }
                }
            })
            .await;

            assert_eq!(result.expect("last attempt succeeds"), "payload");
            assert_eq!(calls.load(Ordering::SeqCst), n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let start = Instant::now();

        let result = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.expect("succeeds"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_before_each_retry() {
        let policy = RetryPolicy::new(4, 1000);
        let start = Instant::now();
        let started_at = Arc::new(Mutex::new(Vec::new()));

        let recorder = started_at.clone();
        let _: Result<(), _> = retry_with_backoff(&policy, move |_| {
            recorder
                .lock()
                .expect("recorder lock")
                .push(start.elapsed());
            async { Err(unavailable()) }
        })
        .await;

        let started_at = started_at.lock().expect("recorder lock").clone();
        let expected = [0, 500, 1500, 3500];
        assert_eq!(started_at.len(), expected.len());
        for (actual, ms) in started_at.iter().zip(expected) {
            assert_close(*actual, Duration::from_millis(ms));
        }
        // No sleep after the final attempt
        assert_close(start.elapsed(), Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out_and_is_retried() {
        let policy = RetryPolicy::new(3, 200);
        let start = Instant::now();
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    sleep(Duration::from_secs(3600)).await;
                }
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.expect("second attempt succeeds"), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_close(start.elapsed(), Duration::from_millis(200 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_time_bounded_by_timeouts_and_backoff() {
        let policy = RetryPolicy::new(3, 1000);
        let start = Instant::now();

        let result: Result<(), _> = retry_with_backoff(&policy, |_| async {
            sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;

        let failure = result.expect_err("every attempt hangs");
        assert!(failure.last.is_timeout());
        assert!(failure
            .history
            .iter()
            .all(|record| record.error.contains("timed out")));
        // Three 1s timeouts plus 500ms and 1000ms of backoff
        assert_close(start.elapsed(), Duration::from_millis(3000 + 1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_keeps_every_failure_in_order() {
        let policy = RetryPolicy::new(3, 1000).with_verbose(true);

        let result: Result<(), _> = retry_with_backoff(&policy, |attempt| async move {
            Err(FetchError::InvalidUrl(format!("cause-{}", attempt)))
        })
        .await;

        let failure = result.expect_err("every attempt fails");
        let indices: Vec<u32> = failure.history.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(failure.history[0].error.contains("cause-0"));
        assert!(failure.history[2].error.contains("cause-2"));
        assert!(failure
            .history
            .iter()
            .all(|r| r.timeout == Duration::from_millis(1000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_backoff_parameters() {
        let policy = RetryPolicy::new(3, 1000).with_backoff(Duration::from_millis(100), 3);
        let start = Instant::now();

        let _: Result<(), _> = retry_with_backoff(&policy, |_| async { Err(unavailable()) }).await;

        // 100ms then 300ms
        assert_close(start.elapsed(), Duration::from_millis(400));
    }
}
