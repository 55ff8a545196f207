//  DISPATCH.rs
//    by Lut99
//
//  Created:
//    22 Feb 2023, 10:14:51
//  Last edited:
//    27 Feb 2023, 15:26:09
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the loop with which a server-role executor reacts to the
//!   instructions pushed by its client.
//

use std::fmt::{Display, Formatter, Result as FResult};

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bench_api::spec::{InstructionRequest, InstructionVerdict};
use bench_shr::debug::EnumDebug;
use bench_tsk::errors::ProcessError;
use bench_tsk::process::{CommandSpec, ProcessOutput, ProcessProxy};
use specifications::instructions::{Instructions, InstructionsType};
use specifications::role::Role;

use crate::coordination::{Coordination, Step, Stop};
use crate::errors::ExecutorError;
use crate::spec::RoleResult;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bench_api::spec::Context;
    use bench_cfg::spec::Address;
    use bench_tsk::client::ApiClient;
    use bench_tsk::dummy::DummyProcessManager;
    use bench_tsk::polling::PollingOptions;
    use specifications::properties::Properties;
    use tokio::sync::oneshot;

    use super::*;
    use crate::coordination::Topology;
    use crate::profile::WorkloadProfile;
    use crate::spec::LogTelemetry;

    const PROFILE: &str = r#"
name: sockperf
coordination: instructions
server_port: 11111
server:
  path: sockperf
  args: [ "server", "--port={ServerPort}", "--{Property:Protocol}" ]
client:
  path: sockperf
  args: [ "ping-pong", "--ip={ServerIp}" ]
"#;

    fn coordination(processes: &DummyProcessManager) -> Coordination {
        let client: Arc<ApiClient> = Arc::new(ApiClient::new(Address::localhost(9)).unwrap());
        Coordination {
            profile   : Arc::new(WorkloadProfile::from_reader(PROFILE.as_bytes()).unwrap()),
            topology  : Topology::loopback(),
            polling   : PollingOptions::new(Duration::from_secs(1), Duration::from_secs(1)),
            local     : client.clone(),
            server    : client,
            context   : Arc::new(Context::new()),
            processes : Arc::new(processes.clone()),
            telemetry : Arc::new(LogTelemetry),
        }
    }

    async fn send(tx: &mpsc::Sender<InstructionRequest>, instructions: Instructions) -> InstructionVerdict {
        let (reply, rx): (oneshot::Sender<InstructionVerdict>, oneshot::Receiver<InstructionVerdict>) = oneshot::channel();
        tx.send(InstructionRequest{ instructions, reply }).await.unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn dispatch_start_without_reset_is_refused() {
        let processes: DummyProcessManager = DummyProcessManager::new().blocking();
        let co: Coordination = coordination(&processes);
        let (tx, mut rx): (mpsc::Sender<InstructionRequest>, mpsc::Receiver<InstructionRequest>) = mpsc::channel(4);
        let token: CancellationToken = CancellationToken::new();
        let mut process: Option<Box<dyn ProcessProxy>> = None;

        let (res, ()) = tokio::join!(dispatch(&co, &mut rx, &mut process, &token), async {
            let start: Instructions = Instructions::start_execution(Properties::new().with("Protocol", "tcp"));
            assert!(matches!(send(&tx, start.clone()).await, InstructionVerdict::OutOfOrder{ .. }));
            assert!(processes.launched().is_empty());

            // A reset arms it, and a second start is refused again
            assert_eq!(send(&tx, Instructions::reset()).await, InstructionVerdict::Accepted);
            assert_eq!(send(&tx, Instructions::reset()).await, InstructionVerdict::Accepted);
            assert_eq!(send(&tx, start.clone()).await, InstructionVerdict::Accepted);
            assert!(matches!(send(&tx, start).await, InstructionVerdict::OutOfOrder{ .. }));
            assert_eq!(processes.launched(), vec![ "sockperf server --port=11111 --tcp".to_string() ]);
            token.cancel();
        });
        assert!(matches!(res, Err(Stop::Cancelled)));
        // Killing what's left is up to the caller
        assert_eq!(processes.killed(), 0);
        co.kill(&mut process).await;
        assert_eq!(processes.killed(), 1);
    }

    #[tokio::test]
    async fn dispatch_reset_kills_running_workload() {
        let processes: DummyProcessManager = DummyProcessManager::new().blocking();
        let co: Coordination = coordination(&processes);
        let (tx, mut rx): (mpsc::Sender<InstructionRequest>, mpsc::Receiver<InstructionRequest>) = mpsc::channel(4);
        let token: CancellationToken = CancellationToken::new();
        let mut process: Option<Box<dyn ProcessProxy>> = None;

        let (res, ()) = tokio::join!(dispatch(&co, &mut rx, &mut process, &token), async {
            let start: Instructions = Instructions::start_execution(Properties::new().with("Protocol", "udp"));
            assert_eq!(send(&tx, Instructions::reset()).await, InstructionVerdict::Accepted);
            assert_eq!(send(&tx, start.clone()).await, InstructionVerdict::Accepted);
            assert_eq!(send(&tx, Instructions::reset()).await, InstructionVerdict::Accepted);
            assert_eq!(processes.killed(), 1);
            assert_eq!(send(&tx, start).await, InstructionVerdict::Accepted);
            assert_eq!(processes.launched().len(), 2);
            token.cancel();
        });
        assert!(matches!(res, Err(Stop::Cancelled)));
    }

    #[tokio::test]
    async fn dispatch_invalid_and_finished() {
        let processes: DummyProcessManager = DummyProcessManager::new();
        let co: Coordination = coordination(&processes);
        let (tx, mut rx): (mpsc::Sender<InstructionRequest>, mpsc::Receiver<InstructionRequest>) = mpsc::channel(4);
        let token: CancellationToken = CancellationToken::new();
        let mut process: Option<Box<dyn ProcessProxy>> = None;

        let (res, ()) = tokio::join!(dispatch(&co, &mut rx, &mut process, &token), async {
            assert_eq!(send(&tx, Instructions::reset()).await, InstructionVerdict::Accepted);
            // Missing the protocol
            assert!(matches!(send(&tx, Instructions::start_execution(Properties::new())).await, InstructionVerdict::Invalid{ .. }));
            assert_eq!(send(&tx, Instructions::start_execution(Properties::new().with("Protocol", "tcp"))).await, InstructionVerdict::Accepted);
        });
        // The dummy workload exits immediately, which ends the dispatch
        let result: RoleResult = match res { Ok(result) => result, Err(_) => panic!("Dispatch did not complete") };
        assert_eq!(result.role, Role::Server);
        assert_eq!(result.command_line, "sockperf server --port=11111 --tcp");
    }
}





/***** HELPER FUNCTIONS *****/
/// Waits for the given process if there is one, or forever if there isn't.
async fn wait_running(process: &mut Option<Box<dyn ProcessProxy>>, token: &CancellationToken) -> Result<Option<ProcessOutput>, ProcessError> {
    match process {
        Some(process) => process.wait(token).await,
        None          => std::future::pending().await,
    }
}





/***** LIBRARY *****/
/// The phases of the dispatcher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchState {
    /// Waiting for a reset.
    Idle,
    /// Reset; waiting for a start.
    Armed,
    /// The workload runs.
    Running,
}

impl EnumDebug for DispatchState {
    #[inline]
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}", self) }
}

impl Display for DispatchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use DispatchState::*;
        match self {
            Idle    => write!(f, "Idle"),
            Armed   => write!(f, "Armed"),
            Running => write!(f, "Running"),
        }
    }
}



/// Reacts to a single instruction.
///
/// # Arguments
/// - `co`: The coordination of the server role.
/// - `state`: The phase of the dispatcher, updated in place.
/// - `instructions`: The instruction to react to.
/// - `process`: The workload of this session, if it was started.
///
/// # Returns
/// The verdict to send back to the client.
///
/// # Errors
/// This function errors if the workload failed to start, which ends the session.
async fn handle(co: &Coordination, state: &mut DispatchState, instructions: &Instructions, process: &mut Option<Box<dyn ProcessProxy>>) -> Result<InstructionVerdict, ExecutorError> {
    debug!("Handling {} instruction in state {}", instructions.kind, state);
    match instructions.kind {
        InstructionsType::ClientServerReset => {
            if process.is_some() {
                info!("Resetting running session; killing workload");
                co.kill(process).await;
            }
            *state = DispatchState::Armed;
            Ok(InstructionVerdict::Accepted)
        },

        InstructionsType::ClientServerStartExecution => {
            match state {
                DispatchState::Armed   => {},
                DispatchState::Idle    => { return Ok(InstructionVerdict::OutOfOrder{ reason: "received StartExecution without a preceding Reset".into() }); },
                DispatchState::Running => { return Ok(InstructionVerdict::OutOfOrder{ reason: "workload already started; send Reset first".into() }); },
            }

            // Build the command from the parameters in the instruction
            let spec: CommandSpec = match co.command(&Role::Server, co.topology.server_ip, &instructions.properties) {
                Ok(spec) => spec,
                Err(err) => { return Ok(InstructionVerdict::Invalid{ reason: err.to_string() }); },
            };
            *process = Some(co.start(&Role::Server, &spec).await?);
            *state = DispatchState::Running;
            Ok(InstructionVerdict::Accepted)
        },
    }
}

/// Runs the dispatch loop of a server-role executor until its workload exits.
///
/// Every instruction is answered, in the order they arrive. A start is only accepted after a reset, and only once per reset.
///
/// # Arguments
/// - `co`: The coordination of the server role.
/// - `inbox`: The channel on which instructions arrive.
/// - `process`: Where the workload is kept, so that the caller can kill it if we stop early.
/// - `token`: Stops the loop (and the workload).
///
/// # Returns
/// The result of the workload.
///
/// # Errors
/// This function errors if the workload failed to start, failed or produced unparseable output, or returns [`Stop::Cancelled`] when cancelled.
pub(crate) async fn dispatch(co: &Coordination, inbox: &mut mpsc::Receiver<InstructionRequest>, process: &mut Option<Box<dyn ProcessProxy>>, token: &CancellationToken) -> Step<RoleResult> {
    /// The things that wake the loop up.
    enum Event {
        Request(Option<InstructionRequest>),
        Exited(Result<Option<ProcessOutput>, ProcessError>),
    }

    let mut state: DispatchState = DispatchState::Idle;
    loop {
        let event: Event = tokio::select! {
            biased;
            _   = token.cancelled()                 => { return Err(Stop::Cancelled); },
            req = inbox.recv()                      => Event::Request(req),
            res = wait_running(process, token)      => Event::Exited(res),
        };

        match event {
            Event::Request(Some(InstructionRequest{ instructions, reply })) => {
                let res: Result<InstructionVerdict, ExecutorError> = handle(co, &mut state, &instructions, process).await;
                let verdict: InstructionVerdict = match &res {
                    Ok(verdict) => verdict.clone(),
                    Err(err)    => InstructionVerdict::Failed{ reason: err.to_string() },
                };
                info!("{} instruction: {}", instructions.kind, verdict);
                if reply.send(verdict).is_err() { warn!("Client of {} instruction left before receiving the verdict", instructions.kind); }
                res?;
            },
            // The API stopped handing us instructions
            Event::Request(None) => { return Err(Stop::Cancelled); },

            Event::Exited(Ok(Some(output))) => {
                let command_line: String = process.take().map(|p| p.command_line()).unwrap_or_default();
                return Ok(co.finish(&Role::Server, command_line, output)?);
            },
            Event::Exited(Ok(None)) => { return Err(Stop::Cancelled); },
            Event::Exited(Err(err)) => {
                let command: String = process.as_ref().map(|p| p.command_line()).unwrap_or_default();
                return Err(Stop::Failed(ExecutorError::ProcessWaitError{ command, err }));
            },
        }
    }
}
