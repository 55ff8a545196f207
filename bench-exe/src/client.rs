//  CLIENT.rs
//    by Lut99
//
//  Created:
//    22 Feb 2023, 14:02:36
//  Last edited:
//    27 Feb 2023, 15:58:20
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the sub-executor of the client role.
//

use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use bench_tsk::polling::{poll_for_heartbeat, poll_for_server_online, poll_for_state};
use bench_tsk::process::{CommandSpec, ProcessOutput, ProcessProxy};
use specifications::instructions::Instructions;
use specifications::role::Role;
use specifications::state::ServerState;

use crate::coordination::{polled, Coordination, Step, Stop};
use crate::errors::ExecutorError;
use crate::profile::CoordinationMode;
use crate::spec::{ExecutionOutcome, RoleResult};


/***** HELPER FUNCTIONS *****/
/// Sends an instruction to the server, telling refusals apart from failures.
async fn instruct(co: &Coordination, instructions: &Instructions, token: &CancellationToken) -> Step<()> {
    debug!("Sending {} instruction to '{}'", instructions.kind, co.server.address());
    match co.server.send_instructions(instructions, None, token).await {
        Ok(())                          => Ok(()),
        Err(err) if err.is_cancelled() => Err(Stop::Cancelled),
        Err(err) if err.is_rejection() => Err(Stop::Failed(ExecutorError::InstructionRejected{ kind: instructions.kind, err })),
        Err(err)                        => Err(Stop::Failed(ExecutorError::ApiCallError{ what: "send instructions to the server", err })),
    }
}

/// Waits for the server to become ready, then tells us where it is.
async fn await_server(co: &Coordination, token: &CancellationToken) -> Step<IpAddr> {
    polled(poll_for_heartbeat(&co.server, &co.polling, token).await)?;
    polled(poll_for_server_online(&co.server, &co.polling, token).await)?;

    match co.profile.coordination {
        CoordinationMode::State => {
            let port: u16 = co.profile.server_port;
            let state: ServerState = polled(poll_for_state::<ServerState, _>(&co.server, &co.profile.state_key, |state| state.server_setup_completed && state.ports.contains(&port), &co.polling, token).await)?;
            Ok(state.server_ip.unwrap_or(co.topology.server_ip))
        },

        CoordinationMode::Instructions => {
            instruct(co, &Instructions::reset(), token).await?;
            instruct(co, &Instructions::start_execution(co.profile.instructions.clone()), token).await?;
            Ok(co.topology.server_ip)
        },
    }
}





/***** LIBRARY *****/
/// Runs the client side of a workload.
///
/// The client waits until the server is ready, then runs its workload against it.
pub struct ClientExecutor {
    /// The things shared with the rest of the run.
    co      : Arc<Coordination>,
    /// The workload, once it runs.
    process : Option<Box<dyn ProcessProxy>>,
}

impl ClientExecutor {
    /// Constructor for the ClientExecutor.
    #[inline]
    pub fn new(co: Arc<Coordination>) -> Self { Self { co, process: None } }



    /// Runs the client role from start to finish.
    ///
    /// # Returns
    /// The results of the workload, or [`ExecutionOutcome::Cancelled`].
    ///
    /// # Errors
    /// This function errors if the server never became ready, refused our instructions or the workload failed. The workload is never left running.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<ExecutionOutcome, ExecutorError> {
        let res: Step<RoleResult> = self.steps(token).await;
        self.co.kill(&mut self.process).await;
        match res {
            Ok(result)             => Ok(ExecutionOutcome::Completed(vec![ result ])),
            Err(Stop::Cancelled)   => { info!("Client of workload '{}' was cancelled", self.co.profile.name); Ok(ExecutionOutcome::Cancelled) },
            Err(Stop::Failed(err)) => Err(err),
        }
    }



    /// The steps of the client role.
    async fn steps(&mut self, token: &CancellationToken) -> Step<RoleResult> {
        let co: Arc<Coordination> = self.co.clone();
        let server_ip: IpAddr = await_server(&co, token).await?;
        info!("Server of workload '{}' is ready at {}", co.profile.name, server_ip);

        let spec: CommandSpec = co.command(&Role::Client, server_ip, &co.profile.instructions)?;
        let process: &mut Box<dyn ProcessProxy> = self.process.insert(co.start(&Role::Client, &spec).await?);
        let command_line: String = process.command_line();
        let output: ProcessOutput = match process.wait(token).await {
            Ok(Some(output)) => output,
            Ok(None)         => { return Err(Stop::Cancelled); },
            Err(err)         => { return Err(Stop::Failed(ExecutorError::ProcessWaitError{ command: command_line, err })); },
        };
        self.process = None;
        Ok(co.finish(&Role::Client, command_line, output)?)
    }
}

