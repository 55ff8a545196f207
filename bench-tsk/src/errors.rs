//  ERRORS.rs
//    by Lut99
//
//  Created:
//    15 Feb 2023, 09:14:03
//  Last edited:
//    22 Feb 2023, 11:28:47
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors that may occur in the `bench-tsk` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

use bench_shr::debug::BlockFormatter;


/***** LIBRARY *****/
/// Defines errors that relate to calling the API of an instance.
#[derive(Debug)]
pub enum ApiError {
    /// Failed to create the HTTP client.
    ClientCreateError{ err: reqwest::Error },
    /// Failed to serialize the body of a request.
    RequestSerializeError{ address: String, err: serde_json::Error },
    /// Failed to parse the URL of a request.
    UrlParseError{ url: String, err: url::ParseError },
    /// The URL of a request cannot have a path.
    UrlNotABase{ url: String },
    /// Failed to build a request.
    RequestBuildError{ address: String, err: reqwest::Error },
    /// Failed to send a request (or to receive its response).
    RequestError{ address: String, err: reqwest::Error },
    /// The remote answered with a non-success status code.
    RequestFailure{ address: String, code: StatusCode, err: Option<String> },
    /// Failed to get the body of a response.
    ResponseBodyError{ address: String, err: reqwest::Error },
    /// Failed to parse the body of a response.
    ResponseJsonParseError{ address: String, raw: String, err: serde_json::Error },
    /// A state document did not have the fields of the requested type.
    StateParseError{ address: String, err: specifications::errors::StateError },
    /// A document was reported to exist, but it vanished before we could read it.
    StateVanished{ address: String, key: String },

    /// The call was cancelled before it completed.
    Cancelled,
}

impl ApiError {
    /// Returns whether this error is worth retrying.
    ///
    /// Failures to connect or time-outs are transient, as are the status codes `5xx`, `408 REQUEST TIMEOUT` and `429 TOO MANY REQUESTS`. Everything else (including cancellation) is terminal.
    pub fn is_transient(&self) -> bool {
        use ApiError::*;
        match self {
            RequestError{ err, .. }    => err.is_connect() || err.is_timeout() || err.is_request(),
            RequestFailure{ code, .. } => is_transient_status(*code),

            _ => false,
        }
    }

    /// Returns whether this error represents a cancellation rather than a failure.
    #[inline]
    pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }

    /// Returns whether the remote refused the request itself (`4xx` or `501 NOT IMPLEMENTED`), as opposed to failing to handle it.
    #[inline]
    pub fn is_rejection(&self) -> bool {
        self.status().map(|code| code.is_client_error() || code == StatusCode::NOT_IMPLEMENTED).unwrap_or(false)
    }

    /// Returns whether the remote answered with `409 CONFLICT`.
    #[inline]
    pub fn is_conflict(&self) -> bool { self.status() == Some(StatusCode::CONFLICT) }

    /// Returns the status code the remote answered with, if this error is about one.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RequestFailure{ code, .. } => Some(*code),
            _                                => None,
        }
    }
}

/// Returns whether the given status code should be retried.
#[inline]
pub fn is_transient_status(code: StatusCode) -> bool {
    (code.is_server_error() && code != StatusCode::NOT_IMPLEMENTED) || code == StatusCode::REQUEST_TIMEOUT || code == StatusCode::TOO_MANY_REQUESTS
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ApiError::*;
        match self {
            ClientCreateError{ err }                    => write!(f, "Failed to create HTTP client: {}", err),
            RequestSerializeError{ address, err }       => write!(f, "Failed to serialize request body for '{}': {}", address, err),
            UrlParseError{ url, err }                   => write!(f, "Failed to parse URL '{}': {}", url, err),
            UrlNotABase{ url }                          => write!(f, "URL '{}' cannot have a path", url),
            RequestBuildError{ address, err }           => write!(f, "Failed to build request to '{}': {}", address, err),
            RequestError{ address, err }                => write!(f, "Failed to send request to '{}': {}", address, err),
            RequestFailure{ address, code, err }        => write!(f, "Request to '{}' failed with status code {} ({}){}", address, code, code.canonical_reason().unwrap_or("???"), if let Some(err) = err { if !err.is_empty() { format!(": {}", err) } else { String::new() } } else { String::new() }),
            ResponseBodyError{ address, err }           => write!(f, "Failed to get response body from '{}': {}", address, err),
            ResponseJsonParseError{ address, raw, err } => write!(f, "Failed to parse response from '{}' as JSON: {}\n\n{}\n\n", address, err, BlockFormatter::new(raw)),
            StateParseError{ address, err }             => write!(f, "Failed to interpret state document from '{}': {}", address, err),
            StateVanished{ address, key }               => write!(f, "State document '{}' on '{}' disappeared while being created", key, address),

            Cancelled => write!(f, "Request was cancelled"),
        }
    }
}

impl Error for ApiError {}



/// Defines errors that relate to polling.
#[derive(Debug)]
pub enum PollError {
    /// The condition did not become true in time.
    Timeout{ what: String, timeout: Duration, attempts: u32, last_error: Option<ApiError> },
    /// A call failed in a way that polling longer won't fix.
    CallError{ what: String, err: ApiError },
}

impl PollError {
    /// Returns whether this error is a timeout.
    #[inline]
    pub fn is_timeout(&self) -> bool { matches!(self, Self::Timeout{ .. }) }
}

impl Display for PollError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use PollError::*;
        match self {
            Timeout{ what, timeout, attempts, last_error } => write!(f, "Timed out after {:.2}s ({} attempt{}) waiting for {}{}", timeout.as_secs_f64(), attempts, if *attempts == 1 { "" } else { "s" }, what, if let Some(err) = last_error { format!(" (last error: {})", err) } else { String::new() }),
            CallError{ what, err }                        => write!(f, "Failed to poll for {}: {}", what, err),
        }
    }
}

impl Error for PollError {}



/// Defines errors that relate to running external processes.
#[derive(Debug)]
pub enum ProcessError {
    /// The working directory of the process does not exist.
    WorkingDirNotFound{ path: PathBuf },
    /// Failed to spawn the process.
    SpawnError{ command: String, err: std::io::Error },
    /// Attempted to start a process that was already started.
    AlreadyStarted{ command: String },
    /// Attempted to wait for or kill a process that was never started.
    NotStarted{ command: String },
    /// Failed to wait for the process to exit.
    WaitError{ command: String, err: std::io::Error },
    /// Failed to kill the process.
    KillError{ command: String, err: std::io::Error },
}

impl Display for ProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ProcessError::*;
        match self {
            WorkingDirNotFound{ path } => write!(f, "Working directory '{}' not found", path.display()),
            SpawnError{ command, err } => write!(f, "Failed to spawn '{}': {}", command, err),
            AlreadyStarted{ command }  => write!(f, "Process '{}' was already started", command),
            NotStarted{ command }      => write!(f, "Process '{}' was never started", command),
            WaitError{ command, err }  => write!(f, "Failed to wait for process '{}': {}", command, err),
            KillError{ command, err }  => write!(f, "Failed to kill process '{}': {}", command, err),
        }
    }
}

impl Error for ProcessError {}
