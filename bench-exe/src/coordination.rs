//  COORDINATION.rs
//    by Lut99
//
//  Created:
//    21 Feb 2023, 09:12:19
//  Last edited:
//    27 Feb 2023, 13:02:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the things that the role executors share: the clients of the
//!   APIs involved, the resolved topology and the collaborators that run
//!   and observe the workload.
//

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use log::{debug, warn};

use bench_api::spec::Context;
use bench_tsk::client::ApiClient;
use bench_tsk::errors::{ApiError, PollError};
use bench_tsk::polling::{PollOutcome, PollingOptions};
use bench_tsk::process::{CommandSpec, ProcessManager, ProcessOutput, ProcessProxy};
use specifications::metrics::Metric;
use specifications::properties::Properties;
use specifications::role::Role;

use crate::errors::ExecutorError;
use crate::parser::RegexMetricsParser;
use crate::profile::{CommandTemplate, TemplateVars, WorkloadProfile};
use crate::spec::{MetricsParser as _, RoleResult, TelemetrySink};


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use chrono::Utc;

    use bench_cfg::spec::Address;
    use bench_tsk::dummy::DummyProcessManager;

    use super::*;
    use crate::errors::ErrorReason;
    use crate::spec::LogTelemetry;

    const PROFILE: &str = r#"
name: iperf
server_port: 5201
server:
  path: iperf3
  args: [ "-s" ]
client:
  path: iperf3
  args: [ "-c", "{ServerIp}" ]
metrics:
  client: '(?P<name>\w+)=(?P<value>[0-9.]+)'
"#;

    fn coordination() -> Coordination {
        let api: Arc<ApiClient> = Arc::new(ApiClient::new(Address::ip(Ipv4Addr::LOCALHOST, 1)).unwrap());
        Coordination {
            profile   : Arc::new(WorkloadProfile::from_reader(PROFILE.as_bytes()).unwrap()),
            topology  : Topology::loopback(),
            polling   : PollingOptions::new(std::time::Duration::from_secs(1), std::time::Duration::from_secs(1)),
            local     : api.clone(),
            server    : api,
            context   : Arc::new(Context::new()),
            processes : Arc::new(DummyProcessManager::new()),
            telemetry : Arc::new(LogTelemetry),
        }
    }

    fn output(stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput { exit_code: Some(0), stdout: stdout.into(), stderr: stderr.into(), started: Utc::now(), exited: Utc::now() }
    }

    #[test]
    fn finish_extracts_metrics() {
        let result: RoleResult = coordination().finish(&Role::Client, "iperf3 -c 127.0.0.1".into(), output("bandwidth=941.2\nretries=3\n", "")).unwrap();
        assert_eq!(result.metrics.len(), 2);

        // No pattern for the server, so no metrics either
        let result: RoleResult = coordination().finish(&Role::Server, "iperf3 -s".into(), output("whatever", "")).unwrap();
        assert!(result.metrics.is_empty());
    }

    #[test]
    fn finish_unparseable_output_keeps_output() {
        let err: ExecutorError = coordination().finish(&Role::Client, "iperf3 -c 127.0.0.1".into(), output("connection refused", "iperf3: error")).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::WorkloadResultsParseFailed);
        match &err {
            ExecutorError::ResultsParseError{ stdout, stderr, .. } => {
                assert_eq!(stdout, "connection refused");
                assert_eq!(stderr, "iperf3: error");
            },
            err => panic!("Unexpected error: {:?}", err),
        }
        assert!(err.to_string().contains("connection refused"));
    }
}





/***** AUXILLARY *****/
/// Why a sequence of steps stopped early.
#[derive(Debug)]
pub(crate) enum Stop {
    /// The token was cancelled.
    Cancelled,
    /// Something failed.
    Failed(ExecutorError),
}

impl From<ExecutorError> for Stop {
    #[inline]
    fn from(value: ExecutorError) -> Self { Self::Failed(value) }
}

/// The result of a step that may be cut short by cancellation.
pub(crate) type Step<T> = Result<T, Stop>;

/// Interprets the result of an API call as a step.
#[inline]
pub(crate) fn api<T>(what: &'static str, res: Result<T, ApiError>) -> Step<T> {
    match res {
        Ok(res)                         => Ok(res),
        Err(err) if err.is_cancelled() => Err(Stop::Cancelled),
        Err(err)                        => Err(Stop::Failed(ExecutorError::ApiCallError{ what, err })),
    }
}

/// Interprets the result of polling as a step.
#[inline]
pub(crate) fn polled<T>(res: Result<PollOutcome<T>, PollError>) -> Step<T> {
    match res {
        Ok(PollOutcome::Satisfied(value)) => Ok(value),
        Ok(PollOutcome::Cancelled)        => Err(Stop::Cancelled),
        Err(err)                          => Err(Stop::Failed(err.into())),
    }
}





/***** LIBRARY *****/
/// The addresses of the machines that play the roles.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Topology {
    /// The address of the server-role instance.
    pub server_ip : IpAddr,
    /// The address of the (first) client-role instance.
    pub client_ip : IpAddr,
}

impl Topology {
    /// Constructor for the Topology where both roles run on this machine.
    #[inline]
    pub fn loopback() -> Self {
        Self { server_ip: IpAddr::V4(Ipv4Addr::LOCALHOST), client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST) }
    }
}



/// The state shared by the sub-executors of one run. Only ever read after construction.
pub struct Coordination {
    /// The workload to run.
    pub profile   : Arc<WorkloadProfile>,
    /// Where the roles are.
    pub topology  : Topology,
    /// How patiently to wait for the server.
    pub polling   : PollingOptions,

    /// The client of the API of this instance.
    pub local     : Arc<ApiClient>,
    /// The client of the API of the server-role instance. The same as `local` if that's us.
    pub server    : Arc<ApiClient>,
    /// The in-process side of the local API, where the instruction dispatcher registers.
    pub context   : Arc<Context>,

    /// Runs the workloads.
    pub processes : Arc<dyn ProcessManager>,
    /// Receives what happens.
    pub telemetry : Arc<dyn TelemetrySink>,
}

impl Coordination {
    /// Builds the command of the given role.
    ///
    /// # Arguments
    /// - `role`: The role to build the command of.
    /// - `server_ip`: The address of the server to substitute, which may differ from the topology's if the server advertised another.
    /// - `properties`: The properties that `{Property:<name>}` placeholders refer to.
    ///
    /// # Errors
    /// This function errors if the role has no command or the command fails to render.
    pub fn command(&self, role: &Role, server_ip: IpAddr, properties: &Properties) -> Result<CommandSpec, ExecutorError> {
        let template: &CommandTemplate = match self.profile.command(role) {
            Some(template) => template,
            None           => { return Err(ExecutorError::RoleNotSupported{ role: role.clone(), supported: self.profile.supported_roles.clone() }); },
        };
        let vars: TemplateVars = TemplateVars { server_ip, server_port: self.profile.server_port, client_ip: self.topology.client_ip, properties };
        template.render(&vars).map_err(|err| ExecutorError::CommandError{ role: role.clone(), err })
    }

    /// Creates and starts the process for the given command.
    ///
    /// # Errors
    /// This function errors if the process failed to start.
    pub async fn start(&self, role: &Role, spec: &CommandSpec) -> Result<Box<dyn ProcessProxy>, ExecutorError> {
        let mut process: Box<dyn ProcessProxy> = match self.processes.create(spec) {
            Ok(process) => process,
            Err(err)    => { return Err(ExecutorError::ProcessStartError{ command: spec.command_line(), err }); },
        };
        if let Err(err) = process.start().await { return Err(ExecutorError::ProcessStartError{ command: spec.command_line(), err }); }
        self.telemetry.log_message("WorkloadStarted", &Properties::new().with("Role", role.to_string()).with("CommandLine", spec.command_line()));
        Ok(process)
    }

    /// Turns the output of a finished workload into the result of its role, and reports it.
    ///
    /// # Errors
    /// This function errors if the workload failed or its output does not parse.
    pub fn finish(&self, role: &Role, command_line: String, output: ProcessOutput) -> Result<RoleResult, ExecutorError> {
        debug!("Workload '{}' of role {} exited with code {:?}", command_line, role, output.exit_code);
        if !output.success() {
            return Err(ExecutorError::WorkloadFailed{ command: command_line, code: output.exit_code, stdout: output.stdout, stderr: output.stderr });
        }

        // Extract the metrics, if the profile tells us how
        let parser: Option<RegexMetricsParser> = match self.profile.metrics_parser(role) {
            Ok(parser) => parser,
            Err(err)   => { return Err(ExecutorError::CommandError{ role: role.clone(), err }); },
        };
        let metrics: Vec<Metric> = match parser.map(|p| p.parse(&output.stdout)).transpose() {
            Ok(metrics) => metrics.unwrap_or_default(),
            Err(err)    => { return Err(ExecutorError::ResultsParseError{ command: command_line, stdout: output.stdout, stderr: output.stderr, err }); },
        };

        let context: Properties = Properties::new()
            .with("CommandLine", command_line.clone())
            .with("StartTime", output.started.to_rfc3339())
            .with("EndTime", output.exited.to_rfc3339());
        self.telemetry.log_metrics(&self.profile.name, role, &metrics, &context);
        Ok(RoleResult { role: role.clone(), command_line, output, metrics })
    }

    /// Kills the given process if it still runs. Never fails; failures are only logged.
    pub async fn kill(&self, process: &mut Option<Box<dyn ProcessProxy>>) {
        if let Some(mut process) = process.take() {
            if process.is_running() {
                if let Err(err) = process.kill().await { warn!("Failed to kill workload '{}': {}", process.command_line(), err); }
            }
        }
    }
}
