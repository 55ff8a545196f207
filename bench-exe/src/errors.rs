//  ERRORS.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 09:47:05
//  Last edited:
//    27 Feb 2023, 14:11:38
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors that may occur in the `bench-exe` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use bench_cfg::errors::LayoutError;
use bench_shr::debug::{BlockFormatter, PrettyListFormatter};
use bench_tsk::errors::{ApiError, PollError, ProcessError};
use specifications::instructions::InstructionsType;
use specifications::role::Role;


/***** LIBRARY *****/
/// Machine-readable classes of the fatal errors of an executor, so callers don't have to match on messages.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorReason {
    /// Something required before coordination can even begin is missing (including the local role).
    DependencyMissing,
    /// The layout cannot support the requested run.
    LayoutInvalid,
    /// The local role is not one the workload supports.
    RoleNotSupported,
    /// A peer never became ready within the polling timeout.
    ApiStatePollingTimeout,
    /// A call to an API failed terminally, or ran out of retries.
    ApiRequestFailed,
    /// The server refused an instruction.
    InstructionRejected,
    /// The workload exited unexpectedly.
    WorkloadFailed,
    /// The workload could not be started.
    WorkloadStartupFailed,
    /// The output of the workload could not be turned into metrics.
    WorkloadResultsParseFailed,
}

impl Display for ErrorReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ErrorReason::*;
        match self {
            DependencyMissing          => write!(f, "DependencyMissing"),
            LayoutInvalid              => write!(f, "LayoutInvalid"),
            RoleNotSupported           => write!(f, "RoleNotSupported"),
            ApiStatePollingTimeout     => write!(f, "ApiStatePollingTimeout"),
            ApiRequestFailed           => write!(f, "ApiRequestFailed"),
            InstructionRejected        => write!(f, "InstructionRejected"),
            WorkloadFailed             => write!(f, "WorkloadFailed"),
            WorkloadStartupFailed      => write!(f, "WorkloadStartupFailed"),
            WorkloadResultsParseFailed => write!(f, "WorkloadResultsParseFailed"),
        }
    }
}



/// Defines errors that relate to loading or interpreting a workload profile.
#[derive(Debug)]
pub enum ProfileError {
    /// Failed to open the given file.
    FileOpenError{ path: PathBuf, err: std::io::Error },
    /// Failed to parse the given file as YAML.
    FileParseError{ path: PathBuf, err: serde_yaml::Error },
    /// Failed to parse the given reader as YAML.
    ReaderParseError{ err: serde_yaml::Error },

    /// The profile does not support any role.
    NoSupportedRoles{ name: String },
    /// The polling interval of the profile is zero.
    ZeroInterval{ name: String },
    /// A placeholder in a template was never closed.
    UnterminatedPlaceholder{ template: String },
    /// A placeholder in a template is not one we know.
    UnknownPlaceholder{ template: String, name: String },
    /// A property placeholder referred to a property that was not given.
    MissingProperty{ template: String, name: String },
    /// A metrics pattern is not a valid regular expression.
    IllegalMetricsPattern{ pattern: String, err: regex::Error },
    /// A metrics pattern lacks a capture group we need.
    MissingMetricsGroup{ pattern: String, group: &'static str },
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ProfileError::*;
        match self {
            FileOpenError{ path, err }  => write!(f, "Failed to open workload profile '{}': {}", path.display(), err),
            FileParseError{ path, err } => write!(f, "Failed to parse workload profile '{}' as YAML: {}", path.display(), err),
            ReaderParseError{ err }     => write!(f, "Failed to parse workload profile as YAML: {}", err),

            NoSupportedRoles{ name }                => write!(f, "Workload profile '{}' does not support any role", name),
            ZeroInterval{ name }                    => write!(f, "Workload profile '{}' has a polling interval of zero", name),
            UnterminatedPlaceholder{ template }     => write!(f, "Unterminated placeholder in '{}'", template),
            UnknownPlaceholder{ template, name }    => write!(f, "Unknown placeholder '{{{}}}' in '{}'", name, template),
            MissingProperty{ template, name }       => write!(f, "Property '{}' referred to in '{}' is not given", name, template),
            IllegalMetricsPattern{ pattern, err }   => write!(f, "Illegal metrics pattern '{}': {}", pattern, err),
            MissingMetricsGroup{ pattern, group }   => write!(f, "Metrics pattern '{}' has no capture group named '{}'", pattern, group),
        }
    }
}

impl Error for ProfileError {}



/// Defines errors that relate to extracting metrics from workload output.
#[derive(Debug)]
pub enum MetricsError {
    /// The pattern matched nowhere in the output.
    NoMatches{ pattern: String },
    /// A matched value is not a number.
    IllegalValue{ name: String, raw: String, err: std::num::ParseFloatError },
}

impl Display for MetricsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use MetricsError::*;
        match self {
            NoMatches{ pattern }           => write!(f, "Metrics pattern '{}' matched nothing in the workload output", pattern),
            IllegalValue{ name, raw, err } => write!(f, "Value '{}' of metric '{}' is not a number: {}", raw, name, err),
        }
    }
}

impl Error for MetricsError {}



/// Defines the fatal errors of an executor. Cancellation is never one of them.
#[derive(Debug)]
pub enum ExecutorError {
    /// The executor was asked to execute before it was initialized.
    NotInitialized,
    /// The local agent could not be found in the layout.
    UnresolvedRole{ agent_id: String, err: LayoutError },
    /// The local role is not supported by the workload.
    RoleNotSupported{ role: Role, supported: Vec<Role> },
    /// The peer of the local role could not be found in the layout.
    PeerResolveError{ role: Role, err: LayoutError },
    /// Failed to create the client for an API.
    ClientCreateError{ address: String, err: ApiError },

    /// Waiting for a peer timed out.
    PollingTimeout{ err: PollError },
    /// Waiting for a peer failed.
    PollingError{ err: PollError },
    /// An API call failed.
    ApiCallError{ what: &'static str, err: ApiError },
    /// The server refused an instruction.
    InstructionRejected{ kind: InstructionsType, err: ApiError },

    /// Failed to build the command line of the workload.
    CommandError{ role: Role, err: ProfileError },
    /// Failed to start the workload.
    ProcessStartError{ command: String, err: ProcessError },
    /// Failed to wait for the workload.
    ProcessWaitError{ command: String, err: ProcessError },
    /// The workload exited with a non-zero code.
    WorkloadFailed{ command: String, code: Option<i32>, stdout: String, stderr: String },
    /// The output of the workload could not be parsed.
    ResultsParseError{ command: String, stdout: String, stderr: String, err: MetricsError },
}

impl ExecutorError {
    /// Returns the class of this error.
    pub fn reason(&self) -> ErrorReason {
        use ExecutorError::*;
        match self {
            NotInitialized          => ErrorReason::DependencyMissing,
            UnresolvedRole{ .. }    => ErrorReason::DependencyMissing,
            RoleNotSupported{ .. }  => ErrorReason::RoleNotSupported,
            PeerResolveError{ .. }  => ErrorReason::LayoutInvalid,
            ClientCreateError{ .. } => ErrorReason::ApiRequestFailed,

            PollingTimeout{ .. }      => ErrorReason::ApiStatePollingTimeout,
            PollingError{ .. }        => ErrorReason::ApiRequestFailed,
            ApiCallError{ .. }        => ErrorReason::ApiRequestFailed,
            InstructionRejected{ .. } => ErrorReason::InstructionRejected,

            CommandError{ .. }      => ErrorReason::WorkloadStartupFailed,
            ProcessStartError{ .. } => ErrorReason::WorkloadStartupFailed,
            ProcessWaitError{ .. }  => ErrorReason::WorkloadFailed,
            WorkloadFailed{ .. }    => ErrorReason::WorkloadFailed,
            ResultsParseError{ .. } => ErrorReason::WorkloadResultsParseFailed,
        }
    }
}

impl From<PollError> for ExecutorError {
    #[inline]
    fn from(value: PollError) -> Self {
        if value.is_timeout() { Self::PollingTimeout{ err: value } } else { Self::PollingError{ err: value } }
    }
}

impl Display for ExecutorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ExecutorError::*;
        match self {
            NotInitialized                     => write!(f, "Executor was not initialized"),
            UnresolvedRole{ agent_id, err }    => write!(f, "Failed to determine the role of agent '{}': {}", agent_id, err),
            RoleNotSupported{ role, supported } => write!(f, "Role '{}' is not supported (expected {})", role, PrettyListFormatter::new(supported.iter(), "or")),
            PeerResolveError{ role, err }      => write!(f, "Failed to find the peer of role '{}': {}", role, err),
            ClientCreateError{ address, err }  => write!(f, "Failed to create API client for '{}': {}", address, err),

            PollingTimeout{ err }            => write!(f, "{}", err),
            PollingError{ err }              => write!(f, "{}", err),
            ApiCallError{ what, err }        => write!(f, "Failed to {}: {}", what, err),
            InstructionRejected{ kind, err } => write!(f, "Instruction '{}' was rejected: {}", kind, err),

            CommandError{ role, err }       => write!(f, "Failed to build the command of role '{}': {}", role, err),
            ProcessStartError{ command, err } => write!(f, "Failed to start workload '{}': {}", command, err),
            ProcessWaitError{ command, err }  => write!(f, "Failed to wait for workload '{}': {}", command, err),
            WorkloadFailed{ command, code, stdout, stderr } => write!(f, "Workload '{}' failed with exit code {}\n\nstdout:\n{}\n\nstderr:\n{}\n\n",
                command,
                code.map(|c| c.to_string()).unwrap_or_else(|| "<killed>".into()),
                BlockFormatter::new(stdout).with_max_lines(50),
                BlockFormatter::new(stderr).with_max_lines(50),
            ),
            ResultsParseError{ command, stdout, stderr, err } => write!(f, "Failed to parse results of workload '{}': {}\n\nstdout:\n{}\n\nstderr:\n{}\n\n",
                command,
                err,
                BlockFormatter::new(stdout).with_max_lines(50),
                BlockFormatter::new(stderr).with_max_lines(50),
            ),
        }
    }
}

impl Error for ExecutorError {}
