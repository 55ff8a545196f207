//  SERVER.rs
//    by Lut99
//
//  Created:
//    21 Feb 2023, 11:40:03
//  Last edited:
//    27 Feb 2023, 15:51:47
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the sub-executor of the server role.
//

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bench_api::spec::InstructionRequest;
use bench_tsk::process::{CommandSpec, ProcessOutput, ProcessProxy};
use bench_tsk::retry::RetryPolicy;
use specifications::properties::Properties;
use specifications::role::Role;
use specifications::state::ServerState;

use crate::coordination::{api, Coordination, Step, Stop};
use crate::dispatch::dispatch;
use crate::errors::ExecutorError;
use crate::profile::CoordinationMode;
use crate::spec::{ExecutionOutcome, RoleResult};


/***** CONSTANTS *****/
/// The number of instructions that may wait for the dispatcher.
const INBOX_CAPACITY: usize = 8;





/***** LIBRARY *****/
/// Runs the server side of a workload.
///
/// The server starts its workload, advertises that it is ready (by publishing its state document, or by accepting instructions) and then waits for the workload to exit.
/// Whatever happens, it does not leave a stale ready-signal behind.
pub struct ServerExecutor {
    /// The things shared with the rest of the run.
    co        : Arc<Coordination>,
    /// The workload, once it runs.
    process   : Option<Box<dyn ProcessProxy>>,
    /// The instructions handed to us by the local API, when coordinating by instructions.
    inbox     : Option<mpsc::Receiver<InstructionRequest>>,
    /// Whether we published our state document.
    published : bool,
}

impl ServerExecutor {
    /// Constructor for the ServerExecutor.
    #[inline]
    pub fn new(co: Arc<Coordination>) -> Self { Self { co, process: None, inbox: None, published: false } }



    /// Brings the server to the point where clients may use it.
    ///
    /// # Returns
    /// `true` if the server is online, or `false` if it was cancelled (and cleaned up) before that.
    ///
    /// # Errors
    /// This function errors if the workload could not be started or the local API refused our state. Cleanup has happened by then.
    pub async fn setup(&mut self, token: &CancellationToken) -> Result<bool, ExecutorError> {
        match self.setup_steps(token).await {
            Ok(())                  => Ok(true),
            Err(Stop::Cancelled)    => { self.cleanup().await; Ok(false) },
            Err(Stop::Failed(err))  => { self.cleanup().await; Err(err) },
        }
    }

    /// Waits until the workload of an online server exits, then cleans up.
    ///
    /// # Errors
    /// This function errors if the workload failed or its output could not be parsed. Cleanup has happened by then.
    pub async fn wait(&mut self, token: &CancellationToken) -> Result<ExecutionOutcome, ExecutorError> {
        let res: Step<RoleResult> = self.wait_steps(token).await;
        self.cleanup().await;
        match res {
            Ok(result)             => Ok(ExecutionOutcome::Completed(vec![ result ])),
            Err(Stop::Cancelled)   => Ok(ExecutionOutcome::Cancelled),
            Err(Stop::Failed(err)) => Err(err),
        }
    }

    /// Runs the server role from start to finish.
    ///
    /// # Errors
    /// This function errors if any of the steps fails. Cleanup has happened by then.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<ExecutionOutcome, ExecutorError> {
        if !self.setup(token).await? { return Ok(ExecutionOutcome::Cancelled); }
        self.wait(token).await
    }



    /// The steps up to being online.
    async fn setup_steps(&mut self, token: &CancellationToken) -> Step<()> {
        let co: Arc<Coordination> = self.co.clone();
        api("mark the server offline", co.local.set_server_online(false, None, token).await)?;

        match co.profile.coordination {
            CoordinationMode::State => {
                // Start the workload
                let spec: CommandSpec = co.command(&Role::Server, co.topology.server_ip, &co.profile.instructions)?;
                self.process = Some(co.start(&Role::Server, &spec).await?);

                // Advertise it, overwriting whatever an earlier run left
                let state: ServerState = ServerState::ready(Some(co.topology.server_ip), [ co.profile.server_port ]);
                match co.local.create_state(&co.profile.state_key, &state, None, token).await {
                    Ok(_)                          => {},
                    Err(err) if err.is_conflict() => {
                        warn!("Found stale state document '{}'; replacing it", co.profile.state_key);
                        api("replace the server state", co.local.update_state(&co.profile.state_key, &state, None, token).await)?;
                    },
                    Err(err) => { return api("publish the server state", Err(err)); },
                }
                self.published = true;
                debug!("Published state document '{}'", co.profile.state_key);
            },

            CoordinationMode::Instructions => {
                self.inbox = Some(co.context.register_dispatcher(INBOX_CAPACITY));
            },
        }

        api("mark the server online", co.local.set_server_online(true, None, token).await)?;
        co.telemetry.log_message("ServerOnline", &Properties::new().with("Workload", co.profile.name.clone()));
        info!("Server of workload '{}' is online", co.profile.name);
        Ok(())
    }

    /// The steps after being online.
    async fn wait_steps(&mut self, token: &CancellationToken) -> Step<RoleResult> {
        let co: Arc<Coordination> = self.co.clone();
        match co.profile.coordination {
            CoordinationMode::State => {
                let process: &mut Box<dyn ProcessProxy> = match self.process.as_mut() {
                    Some(process) => process,
                    None          => { return Err(Stop::Failed(ExecutorError::NotInitialized)); },
                };
                let command_line: String = process.command_line();
                let output: ProcessOutput = match process.wait(token).await {
                    Ok(Some(output)) => output,
                    Ok(None)         => { return Err(Stop::Cancelled); },
                    Err(err)         => { return Err(Stop::Failed(ExecutorError::ProcessWaitError{ command: command_line, err })); },
                };
                self.process = None;
                Ok(co.finish(&Role::Server, command_line, output)?)
            },

            CoordinationMode::Instructions => {
                let mut inbox: mpsc::Receiver<InstructionRequest> = match self.inbox.take() {
                    Some(inbox) => inbox,
                    None        => { return Err(Stop::Failed(ExecutorError::NotInitialized)); },
                };
                dispatch(&co, &mut inbox, &mut self.process, token).await
            },
        }
    }

    /// Kills the workload and withdraws every ready-signal. Only logs failures.
    async fn cleanup(&mut self) {
        let co: Arc<Coordination> = self.co.clone();
        co.kill(&mut self.process).await;

        // The run's token may be cancelled by now, so use our own
        let token: CancellationToken = CancellationToken::new();
        let retry: RetryPolicy = RetryPolicy::none();
        if let Err(err) = co.local.set_server_online(false, Some(&retry), &token).await { warn!("Failed to mark the server offline: {}", err); }
        if co.profile.coordination == CoordinationMode::Instructions {
            co.context.unregister_dispatcher();
            self.inbox = None;
        }
        if self.published {
            if let Err(err) = co.local.delete_state(&co.profile.state_key, Some(&retry), &token).await { warn!("Failed to delete state document '{}': {}", co.profile.state_key, err); }
            self.published = false;
        }
        debug!("Server of workload '{}' cleaned up", co.profile.name);
    }
}
