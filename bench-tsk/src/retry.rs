//  RETRY.rs
//    by Lut99
//
//  Created:
//    15 Feb 2023, 09:40:27
//  Last edited:
//    22 Feb 2023, 10:51:36
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the policy with which single API calls are retried when
//!   they fail transiently.
//

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use bench_cfg::agent::{RetryConfig, DEFAULT_MAX_RETRIES};

use crate::errors::ApiError;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use reqwest::StatusCode;

    use super::*;

    fn failure(code: StatusCode) -> ApiError { ApiError::RequestFailure{ address: "http://test".into(), code, err: None } }

    #[test]
    fn retry_default_is_ten() {
        assert_eq!(RetryPolicy::default().max_retries, 10);
        assert_eq!(RetryPolicy::from(&RetryConfig::default()).max_retries, 10);
    }

    #[test]
    fn retry_backoff_is_capped() {
        let policy: RetryPolicy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(60), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_transient_until_exhausted() {
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let policy: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50));
        let res: Result<(), ApiError> = policy.run("test", &CancellationToken::new(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(failure(StatusCode::SERVICE_UNAVAILABLE))
        }).await;
        assert_eq!(res.unwrap_err().status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        // The first attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_terminal_surfaces_immediately() {
        for code in [ StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN, StatusCode::NOT_FOUND, StatusCode::CONFLICT, StatusCode::NOT_IMPLEMENTED ] {
            let calls: &AtomicU32 = &AtomicU32::new(0);
            let res: Result<(), ApiError> = RetryPolicy::default().run("test", &CancellationToken::new(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure(code))
            }).await;
            assert_eq!(res.unwrap_err().status(), Some(code));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers() {
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let res: Result<u32, ApiError> = RetryPolicy::default().run("test", &CancellationToken::new(), move || async move {
            let n: u32 = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(failure(StatusCode::TOO_MANY_REQUESTS)) } else { Ok(n) }
        }).await;
        assert_eq!(res.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_on_cancel() {
        let token: CancellationToken = CancellationToken::new();
        token.cancel();
        let res: Result<(), ApiError> = RetryPolicy::default().run("test", &token, || async { Err::<(), ApiError>(failure(StatusCode::BAD_GATEWAY)) }).await;
        assert!(res.unwrap_err().is_cancelled());
    }
}





/***** LIBRARY *****/
/// Defines how often, and how patiently, a single API call is retried when it fails transiently.
///
/// Terminal failures are never retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// The number of retries after the first attempt.
    pub max_retries : u32,
    /// The delay before the first retry. Doubles every retry.
    pub base_delay  : Duration,
    /// The maximum delay between two attempts.
    pub max_delay   : Duration,
}

impl RetryPolicy {
    /// Constructor for the RetryPolicy.
    #[inline]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self { Self { max_retries, base_delay, max_delay } }

    /// Constructor for a RetryPolicy that never retries. Used for calls that are repeated by a poll loop anyway.
    #[inline]
    pub fn none() -> Self { Self { max_retries: 0, base_delay: Duration::ZERO, max_delay: Duration::ZERO } }



    /// Returns the delay before the given retry (zero-indexed).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor: u32 = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Runs the given operation until it succeeds, fails terminally or runs out of retries.
    ///
    /// # Arguments
    /// - `what`: Some description of the operation, for debugging.
    /// - `token`: Retrying stops (with [`ApiError::Cancelled`]) once this token is cancelled.
    /// - `op`: The operation to run. Called once per attempt.
    ///
    /// # Returns
    /// The result of the first successful attempt.
    ///
    /// # Errors
    /// This function errors with the error of the last attempt if it was terminal or if there are no retries left.
    pub async fn run<T, F, Fut>(&self, what: &str, token: &CancellationToken, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retry: u32 = 0;
        loop {
            let res: Result<T, ApiError> = tokio::select! {
                biased;
                _   = token.cancelled() => { return Err(ApiError::Cancelled); },
                res = op()              => res,
            };

            match res {
                Ok(res) => { return Ok(res); },
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay: Duration = self.delay(retry);
                    retry += 1;
                    warn!("Attempt {}/{} of {} failed (retrying in {}ms): {}", retry, self.max_retries + 1, what, delay.as_millis(), err);
                    tokio::select! {
                        biased;
                        _ = token.cancelled()        => { return Err(ApiError::Cancelled); },
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
                Err(err) => {
                    if retry > 0 { debug!("Giving up on {} after {} retries", what, retry); }
                    return Err(err);
                },
            }
        }
    }
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_retries : DEFAULT_MAX_RETRIES,
            base_delay  : Duration::from_millis(500),
            max_delay   : Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    #[inline]
    fn from(value: &RetryConfig) -> Self {
        Self {
            max_retries : value.max_retries,
            base_delay  : value.base_delay(),
            max_delay   : value.max_delay(),
        }
    }
}
