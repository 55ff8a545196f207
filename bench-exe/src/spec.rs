//  SPEC.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 09:55:30
//  Last edited:
//    27 Feb 2023, 13:40:02
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the capabilities of executors and the interfaces of the
//!   collaborators they report to.
//

use std::fmt::{Display, Formatter, Result as FResult};

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use bench_shr::debug::EnumDebug;
use bench_tsk::process::ProcessOutput;
use specifications::metrics::Metric;
use specifications::properties::Properties;
use specifications::role::Role;

use crate::errors::{ExecutorError, MetricsError};


/***** LIBRARY *****/
/// Something that must be prepared before it can do anything.
#[async_trait]
pub trait Initializable {
    /// Prepares this thing. Must be called exactly once, before anything else.
    ///
    /// # Errors
    /// This function errors if a dependency is missing or the local role cannot be run.
    async fn initialize(&mut self, token: &CancellationToken) -> Result<(), ExecutorError>;
}

/// Something that runs a workload.
#[async_trait]
pub trait Executable {
    /// Runs the workload to completion.
    ///
    /// # Returns
    /// The results of the run, or [`ExecutionOutcome::Cancelled`] if the token was cancelled somewhere along the way.
    ///
    /// # Errors
    /// This function errors if the run failed. Cleanup has happened by the time it returns.
    async fn execute(&mut self, token: &CancellationToken) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Something that plays (a subset of) the roles of a workload.
pub trait RoleAware {
    /// The roles this thing is able to play.
    fn supported_roles(&self) -> &[Role];

    /// The role this thing plays, once known. `None` in single-machine mode, where it plays all of them.
    fn role(&self) -> Option<&Role>;
}



/// Receives the observable events of executors. Calls are fire-and-forget.
pub trait TelemetrySink: Send + Sync {
    /// Logs a notable event.
    fn log_message(&self, event: &str, context: &Properties);

    /// Logs the metrics produced by a workload.
    fn log_metrics(&self, workload: &str, role: &Role, metrics: &[Metric], context: &Properties);
}

/// A [`TelemetrySink`] that writes everything to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn log_message(&self, event: &str, context: &Properties) {
        if context.is_empty() {
            info!("[telemetry] {}", event);
        } else {
            info!("[telemetry] {} ({})", event, context.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<String>>().join(", "));
        }
    }

    fn log_metrics(&self, workload: &str, role: &Role, metrics: &[Metric], _context: &Properties) {
        for metric in metrics {
            info!("[telemetry] {} ({}): {}", workload, role, metric);
        }
    }
}



/// Turns the raw output of a workload into metrics.
pub trait MetricsParser {
    /// Parses the given output.
    ///
    /// # Errors
    /// This function errors if the output does not contain the expected metrics.
    fn parse(&self, raw: &str) -> Result<Vec<Metric>, MetricsError>;
}



/// The phases of an executor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutorState {
    /// Constructed, but nothing has happened yet.
    Created,
    /// Resolving the role and building the clients.
    Initializing,
    /// Ready to execute.
    Initialized,
    /// Running the client role.
    ClientRunning,
    /// Running the server role.
    ServerRunning,
    /// Running both roles on this machine, server first.
    BothSequential,
    /// Done, either with results or because it was cancelled.
    Completed,
    /// Failed.
    Faulted,
}

impl ExecutorState {
    /// Returns whether this state is final.
    #[inline]
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Faulted) }
}

impl EnumDebug for ExecutorState {
    #[inline]
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}", self) }
}

impl Display for ExecutorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ExecutorState::*;
        match self {
            Created        => write!(f, "Created"),
            Initializing   => write!(f, "Initializing"),
            Initialized    => write!(f, "Initialized"),
            ClientRunning  => write!(f, "ClientRunning"),
            ServerRunning  => write!(f, "ServerRunning"),
            BothSequential => write!(f, "BothSequential"),
            Completed      => write!(f, "Completed"),
            Faulted        => write!(f, "Faulted"),
        }
    }
}



/// What one role produced.
#[derive(Clone, Debug)]
pub struct RoleResult {
    /// The role that ran.
    pub role         : Role,
    /// The command line of its workload.
    pub command_line : String,
    /// The output of its workload.
    pub output       : ProcessOutput,
    /// The metrics extracted from that output.
    pub metrics      : Vec<Metric>,
}

/// How an execution ended, if not with an error.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    /// The workload ran; these are the results of every role whose workload exited by itself.
    Completed(Vec<RoleResult>),
    /// The execution was cancelled. Everything has been cleaned up.
    Cancelled,
}

impl ExecutionOutcome {
    /// Returns whether the execution was cancelled.
    #[inline]
    pub fn is_cancelled(&self) -> bool { matches!(self, Self::Cancelled) }

    /// Returns the results, if any.
    #[inline]
    pub fn results(&self) -> &[RoleResult] {
        match self {
            Self::Completed(results) => results,
            Self::Cancelled          => &[],
        }
    }
}
