//  POLLING.rs
//    by Lut99
//
//  Created:
//    16 Feb 2023, 14:03:51
//  Last edited:
//    22 Feb 2023, 10:47:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the polling engine, which turns a one-shot check against
//!   an API into a bounded, cancellable wait.
//

use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::errors::ApiError;
pub use crate::errors::PollError as Error;
use crate::retry::RetryPolicy;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use reqwest::StatusCode;

    use super::*;

    fn options(interval_ms: u64, timeout_ms: u64) -> PollingOptions { PollingOptions::new(Duration::from_millis(interval_ms), Duration::from_millis(timeout_ms)) }

    #[tokio::test(start_paused = true)]
    async fn poll_satisfied() {
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let res: PollOutcome<u32> = poll_for_condition("counter", move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) }, |n: &u32| *n >= 3, &options(100, 10_000), &CancellationToken::new()).await.unwrap();
        assert_eq!(res, PollOutcome::Satisfied(3));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_within_one_interval() {
        let start: Instant = Instant::now();
        let err: Error = poll_for_condition("never", || async { Ok(false) }, |b: &bool| *b, &options(300, 1_000), &CancellationToken::new()).await.unwrap_err();
        let elapsed: Duration = start.elapsed();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(1_000));
        assert!(elapsed < Duration::from_millis(1_300));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_zero_timeout_fails_on_first_attempt() {
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let err: Error = poll_for_condition("never", move || async move { calls.fetch_add(1, Ordering::SeqCst); Ok(false) }, |b: &bool| *b, &options(1_000, 0), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout{ attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_hanging_attempt_times_out() {
        let start: Instant = Instant::now();
        let err: Error = poll_for_condition("hang", || std::future::pending::<Result<bool, ApiError>>(), |b: &bool| *b, &options(100, 200), &CancellationToken::new()).await.unwrap_err();
        let elapsed: Duration = start.elapsed();
        assert!(matches!(err, Error::Timeout{ attempts: 1, .. }));
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));

        // An attempt that answers late is cut off at the deadline too
        let start: Instant = Instant::now();
        let err: Error = poll_for_condition("slow", || async { tokio::time::sleep(Duration::from_secs(30)).await; Ok(true) }, |b: &bool| *b, &options(100, 500), &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_cancel_beats_timeout() {
        // The second attempt happens when the timeout elapses, and cancels during that attempt
        let token: CancellationToken = CancellationToken::new();
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let inner: &CancellationToken = &token;
        let res: PollOutcome<bool> = poll_for_condition("never", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 { inner.cancel(); }
            Ok(false)
        }, |b: &bool| *b, &options(1_000, 1_000), &token).await.unwrap();
        assert_eq!(res, PollOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Also when the operation itself hangs
        let token: CancellationToken = CancellationToken::new();
        token.cancel();
        let res: PollOutcome<bool> = poll_for_condition("hang", || std::future::pending(), |b: &bool| *b, &options(1_000, 0), &token).await.unwrap();
        assert_eq!(res, PollOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_transient_keeps_going_terminal_aborts() {
        let calls: &AtomicU32 = &AtomicU32::new(0);
        let res: PollOutcome<u32> = poll_for_condition("flaky", move || async move {
            let n: u32 = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(ApiError::RequestFailure{ address: "http://test".into(), code: StatusCode::BAD_GATEWAY, err: None }) } else { Ok(n) }
        }, |_: &u32| true, &options(10, 10_000), &CancellationToken::new()).await.unwrap();
        assert_eq!(res, PollOutcome::Satisfied(2));

        let err: Error = poll_for_condition("broken", || async { Err::<bool, ApiError>(ApiError::RequestFailure{ address: "http://test".into(), code: StatusCode::FORBIDDEN, err: None }) }, |b: &bool| *b, &options(10, 10_000), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::CallError{ .. }));
    }
}





/***** LIBRARY *****/
/// Defines how patiently to poll.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollingOptions {
    /// The time between two attempts.
    pub interval : Duration,
    /// The time after the first attempt after which we give up.
    pub timeout  : Duration,
}

impl PollingOptions {
    /// Constructor for the PollingOptions.
    #[inline]
    pub fn new(interval: Duration, timeout: Duration) -> Self { Self { interval, timeout } }
}



/// The ways in which polling may end that are not failures.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome<T> {
    /// The condition was met by the given value.
    Satisfied(T),
    /// Polling was cancelled before the condition was met.
    Cancelled,
}

impl<T> PollOutcome<T> {
    /// Maps the value of a satisfied outcome.
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollOutcome<U> {
        match self {
            Self::Satisfied(value) => PollOutcome::Satisfied(f(value)),
            Self::Cancelled        => PollOutcome::Cancelled,
        }
    }

    /// Returns whether polling was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }
}



/// Repeatedly runs an operation until its result satisfies a predicate.
///
/// Transient failures of the operation count as "not yet"; any other failure aborts polling. Cancellation always takes precedence over timing out.
///
/// # Arguments
/// - `what`: A description of what we are waiting for, used in logs and errors.
/// - `op`: The operation to run on every attempt.
/// - `predicate`: Decides whether the result of an attempt is the one we're waiting for.
/// - `options`: The interval between attempts and the time after which we give up.
/// - `token`: Cancels polling.
///
/// # Returns
/// The result that satisfied the predicate, or [`PollOutcome::Cancelled`].
///
/// # Errors
/// This function errors if the timeout elapsed (during an attempt or after it, but never before it) or an attempt failed terminally.
pub async fn poll_for_condition<T, F, Fut, P>(what: &str, mut op: F, mut predicate: P, options: &PollingOptions, token: &CancellationToken) -> Result<PollOutcome<T>, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    P: FnMut(&T) -> bool,
{
    debug!("Polling for {} (interval: {}ms, timeout: {}ms)...", what, options.interval.as_millis(), options.timeout.as_millis());
    let start: Instant = Instant::now();
    let mut attempts   : u32 = 0;
    let mut last_error : Option<ApiError> = None;
    loop {
        // Run the attempt, which may not outlast the deadline
        attempts += 1;
        let remaining: Duration = options.timeout.saturating_sub(start.elapsed());
        let res: Result<T, ApiError> = tokio::select! {
            biased;
            _   = token.cancelled()                    => { return Ok(PollOutcome::Cancelled); },
            res = tokio::time::timeout(remaining, op()) => match res {
                Ok(res) => res,
                Err(_)  => {
                    debug!("Attempt {} for {} did not finish before the deadline", attempts, what);
                    return Err(Error::Timeout{ what: what.into(), timeout: options.timeout, attempts, last_error });
                },
            },
        };
        match res {
            Ok(value) => {
                if predicate(&value) {
                    info!("Condition '{}' met after {} attempt{}", what, attempts, if attempts == 1 { "" } else { "s" });
                    return Ok(PollOutcome::Satisfied(value));
                }
                last_error = None;
            },
            Err(err) if err.is_cancelled() => { return Ok(PollOutcome::Cancelled); },
            Err(err) if err.is_transient() => {
                debug!("Attempt {} for {} failed transiently: {}", attempts, what, err);
                last_error = Some(err);
            },
            Err(err) => { return Err(Error::CallError{ what: what.into(), err }); },
        }

        // See if we have time for another one
        if token.is_cancelled() { return Ok(PollOutcome::Cancelled); }
        let elapsed: Duration = start.elapsed();
        if elapsed >= options.timeout {
            return Err(Error::Timeout{ what: what.into(), timeout: options.timeout, attempts, last_error });
        }
        let wait: Duration = options.interval.min(options.timeout - elapsed);
        tokio::select! {
            biased;
            _ = token.cancelled()        => { return Ok(PollOutcome::Cancelled); },
            _ = tokio::time::sleep(wait) => {},
        }
    }
}



/// Polls until the remote answers heartbeats.
#[inline]
pub async fn poll_for_heartbeat(client: &ApiClient, options: &PollingOptions, token: &CancellationToken) -> Result<PollOutcome<()>, Error> {
    let what: String = format!("heartbeat of '{}'", client.address());
    let retry: RetryPolicy = RetryPolicy::none();
    poll_for_condition(&what, || client.get_heartbeat(Some(&retry), token), |_| true, options, token).await
}

/// Polls until the remote executor marks itself online.
#[inline]
pub async fn poll_for_server_online(client: &ApiClient, options: &PollingOptions, token: &CancellationToken) -> Result<PollOutcome<()>, Error> {
    let what: String = format!("'{}' to come online", client.address());
    let retry: RetryPolicy = RetryPolicy::none();
    Ok(poll_for_condition(&what, || client.get_server_online_status(Some(&retry), token), |online| *online, options, token).await?.map(|_| ()))
}

/// Polls until the remote hosts a state document with the given key that satisfies the given predicate.
///
/// # Arguments
/// - `client`: The client of the instance that hosts the document.
/// - `key`: The key of the document.
/// - `predicate`: Decides whether the (typed) document is the one we're waiting for.
/// - `options`: The interval between attempts and the time after which we give up.
/// - `token`: Cancels polling.
///
/// # Returns
/// The document that satisfied the predicate, or [`PollOutcome::Cancelled`].
///
/// # Errors
/// This function errors if we timed out, or the document exists but does not have the fields of `T`.
pub async fn poll_for_state<T, P>(client: &ApiClient, key: &str, mut predicate: P, options: &PollingOptions, token: &CancellationToken) -> Result<PollOutcome<T>, Error>
where
    T: DeserializeOwned,
    P: FnMut(&T) -> bool,
{
    let what: String = format!("state '{}' on '{}'", key, client.address());
    let retry: RetryPolicy = RetryPolicy::none();
    let outcome: PollOutcome<Option<T>> = poll_for_condition(&what, || client.get_state_as::<T>(key, Some(&retry), token), |state: &Option<T>| state.as_ref().map(&mut predicate).unwrap_or(false), options, token).await?;
    Ok(match outcome {
        PollOutcome::Satisfied(Some(state)) => PollOutcome::Satisfied(state),
        // The predicate never accepts `None`
        PollOutcome::Satisfied(None) | PollOutcome::Cancelled => PollOutcome::Cancelled,
    })
}
