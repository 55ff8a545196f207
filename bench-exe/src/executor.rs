//  EXECUTOR.rs
//    by Lut99
//
//  Created:
//    23 Feb 2023, 09:31:44
//  Last edited:
//    28 Feb 2023, 10:17:05
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the [`RoleExecutor`], which figures out which role(s) the
//!   local agent plays and runs them.
//

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use bench_api::spec::Context;
use bench_cfg::agent::AgentConfig;
use bench_cfg::layout::{ClientInstance, EnvironmentLayout};
use bench_cfg::spec::Address;
use bench_tsk::client::{ApiClient, ApiClientManager};
use bench_tsk::process::ProcessManager;
use specifications::role::Role;

use crate::client::ClientExecutor;
use crate::coordination::{Coordination, Topology};
use crate::errors::ExecutorError;
use crate::profile::WorkloadProfile;
use crate::server::ServerExecutor;
use crate::spec::{Executable, ExecutionOutcome, ExecutorState, Initializable, RoleAware, TelemetrySink};


/***** TESTS *****/





/***** AUXILLARY *****/
/// The things an executor works with but does not own.
#[derive(Clone)]
pub struct Collaborators {
    /// The in-process side of the local API.
    pub context   : Arc<Context>,
    /// The clients of the APIs of this and other instances.
    pub clients   : Arc<ApiClientManager>,
    /// Runs workloads.
    pub processes : Arc<dyn ProcessManager>,
    /// Receives what happens.
    pub telemetry : Arc<dyn TelemetrySink>,
}

/// Runs a single role.
enum SubExecutor {
    /// Runs the client role.
    Client(ClientExecutor),
    /// Runs the server role.
    Server(ServerExecutor),
}

/// What an initialized executor will run.
enum Plan {
    /// One role, as resolved from the layout.
    Single(SubExecutor),
    /// Both roles on this machine, with the server set up first.
    Both{ server: ServerExecutor, client: ClientExecutor },
}





/***** LIBRARY *****/
/// Runs the role(s) of a workload that fall to the local agent.
///
/// With a layout, the agent plays exactly the role the layout assigns to it. Without one, it plays both, on loopback.
pub struct RoleExecutor {
    /// The workload to run.
    profile       : Arc<WorkloadProfile>,
    /// Who we are.
    agent         : AgentConfig,
    /// Who everybody is, if this is a multi-machine run.
    layout        : Option<EnvironmentLayout>,
    /// What we work with.
    collaborators : Collaborators,

    /// The phase we're in.
    state : ExecutorState,
    /// The role resolved from the layout.
    role  : Option<Role>,
    /// What to run, once initialized.
    plan  : Option<Plan>,
}

impl RoleExecutor {
    /// Constructor for the RoleExecutor.
    ///
    /// # Arguments
    /// - `profile`: The workload to run.
    /// - `agent`: The configuration of the local agent.
    /// - `layout`: The layout of a multi-machine run, or `None` to play all roles locally.
    /// - `collaborators`: The things the executor works with.
    ///
    /// # Returns
    /// A new RoleExecutor in the [`ExecutorState::Created`] state. Call [`Initializable::initialize`] before executing it.
    #[inline]
    pub fn new(profile: Arc<WorkloadProfile>, agent: AgentConfig, layout: Option<EnvironmentLayout>, collaborators: Collaborators) -> Self {
        Self { profile, agent, layout, collaborators, state: ExecutorState::Created, role: None, plan: None }
    }

    /// Returns the phase this executor is in.
    #[inline]
    pub fn state(&self) -> ExecutorState { self.state }



    /// Returns the client of our own API.
    fn local_client(&self) -> Result<Arc<ApiClient>, ExecutorError> {
        let address: Address = self.agent.local_api_address();
        match self.collaborators.clients.get_or_create("localhost", address.clone()) {
            Ok(client) => Ok(client),
            Err(err)   => Err(ExecutorError::ClientCreateError{ address: address.to_string(), err }),
        }
    }

    /// Builds the coordination of a run with the given topology and server API.
    fn coordination(&self, topology: Topology, local: Arc<ApiClient>, server: Arc<ApiClient>) -> Arc<Coordination> {
        Arc::new(Coordination {
            profile   : self.profile.clone(),
            topology,
            polling   : self.profile.polling.options(),
            local,
            server,
            context   : self.collaborators.context.clone(),
            processes : self.collaborators.processes.clone(),
            telemetry : self.collaborators.telemetry.clone(),
        })
    }

    /// Resolves our role from the layout and plans it.
    fn plan_layout(&self, layout: &EnvironmentLayout) -> Result<(Role, Plan), ExecutorError> {
        let me: &ClientInstance = match layout.resolve(&self.agent.agent_id) {
            Ok(me)   => me,
            Err(err) => { return Err(ExecutorError::UnresolvedRole{ agent_id: self.agent.agent_id.clone(), err }); },
        };
        if !self.profile.supports(&me.role) || self.profile.command(&me.role).is_none() {
            return Err(ExecutorError::RoleNotSupported{ role: me.role.clone(), supported: self.profile.supported_roles.clone() });
        }
        debug!("Agent '{}' is instance '{}' ({}) with role {}", self.agent.agent_id, me.name, me.ip_address, me.role);

        let local: Arc<ApiClient> = self.local_client()?;
        match &me.role {
            Role::Client => {
                let server: &ClientInstance = match layout.single_with_role(&Role::Server) {
                    Ok(server) => server,
                    Err(err)   => { return Err(ExecutorError::PeerResolveError{ role: Role::Server, err }); },
                };
                let address: Address = Address::ip(server.ip_address, self.agent.peer_port);
                let server_api: Arc<ApiClient> = match self.collaborators.clients.get_or_create(&server.name, address.clone()) {
                    Ok(client) => client,
                    Err(err)   => { return Err(ExecutorError::ClientCreateError{ address: address.to_string(), err }); },
                };
                let topology: Topology = Topology { server_ip: server.ip_address, client_ip: me.ip_address };
                Ok((Role::Client, Plan::Single(SubExecutor::Client(ClientExecutor::new(self.coordination(topology, local, server_api))))))
            },

            Role::Server => {
                let client_ip: IpAddr = layout.instances_with_role(&Role::Client).next().map(|c| c.ip_address).unwrap_or(Topology::loopback().client_ip);
                let topology: Topology = Topology { server_ip: me.ip_address, client_ip };
                Ok((Role::Server, Plan::Single(SubExecutor::Server(ServerExecutor::new(self.coordination(topology, local.clone(), local))))))
            },

            // Already refused above, since no profile has a command for them
            Role::Other(_) => Err(ExecutorError::RoleNotSupported{ role: me.role.clone(), supported: self.profile.supported_roles.clone() }),
        }
    }

    /// Plans a single-machine run of both roles.
    fn plan_local(&self) -> Result<Plan, ExecutorError> {
        for role in [ Role::Client, Role::Server ] {
            if !self.profile.supports(&role) {
                return Err(ExecutorError::RoleNotSupported{ role, supported: self.profile.supported_roles.clone() });
            }
        }
        let local: Arc<ApiClient> = self.local_client()?;
        let co: Arc<Coordination> = self.coordination(Topology::loopback(), local.clone(), local);
        Ok(Plan::Both{ server: ServerExecutor::new(co.clone()), client: ClientExecutor::new(co) })
    }
}

#[async_trait]
impl Initializable for RoleExecutor {
    async fn initialize(&mut self, _token: &CancellationToken) -> Result<(), ExecutorError> {
        self.state = ExecutorState::Initializing;
        let res: Result<(Option<Role>, Plan), ExecutorError> = match &self.layout {
            Some(layout) => self.plan_layout(layout).map(|(role, plan)| (Some(role), plan)),
            None         => self.plan_local().map(|plan| (None, plan)),
        };
        match res {
            Ok((role, plan)) => {
                match &role {
                    Some(role) => info!("Agent '{}' plays role {} in workload '{}'", self.agent.agent_id, role, self.profile.name),
                    None       => info!("Agent '{}' plays all roles of workload '{}' locally", self.agent.agent_id, self.profile.name),
                }
                self.role  = role;
                self.plan  = Some(plan);
                self.state = ExecutorState::Initialized;
                Ok(())
            },
            Err(err) => {
                error!("Failed to initialize executor: {}", err);
                self.state = ExecutorState::Faulted;
                Err(err)
            },
        }
    }
}

#[async_trait]
impl Executable for RoleExecutor {
    async fn execute(&mut self, token: &CancellationToken) -> Result<ExecutionOutcome, ExecutorError> {
        let plan: &mut Plan = match (self.state, self.plan.as_mut()) {
            (ExecutorState::Initialized, Some(plan)) => plan,
            _                                        => { return Err(ExecutorError::NotInitialized); },
        };

        let res: Result<ExecutionOutcome, ExecutorError> = match plan {
            Plan::Single(SubExecutor::Client(client)) => {
                self.state = ExecutorState::ClientRunning;
                client.run(token).await
            },
            Plan::Single(SubExecutor::Server(server)) => {
                self.state = ExecutorState::ServerRunning;
                server.run(token).await
            },

            Plan::Both{ server, client } => {
                self.state = ExecutorState::BothSequential;
                match server.setup(token).await {
                    Ok(true) => {
                        // The server lives as long as the client needs it; a failing server takes the client down with it
                        let server_token: CancellationToken = token.child_token();
                        let client_token: CancellationToken = token.child_token();
                        let (sres, cres) = tokio::join!(
                            async {
                                let res: Result<ExecutionOutcome, ExecutorError> = server.wait(&server_token).await;
                                if res.is_err() { client_token.cancel(); }
                                res
                            },
                            async {
                                let res: Result<ExecutionOutcome, ExecutorError> = client.run(&client_token).await;
                                server_token.cancel();
                                res
                            },
                        );
                        match (sres, cres) {
                            (Err(err), _) | (_, Err(err))                      => Err(err),
                            (_, Ok(ExecutionOutcome::Cancelled))               => Ok(ExecutionOutcome::Cancelled),
                            (Ok(server), Ok(ExecutionOutcome::Completed(client))) => {
                                let mut results = server.results().to_vec();
                                results.extend(client);
                                Ok(ExecutionOutcome::Completed(results))
                            },
                        }
                    },
                    Ok(false) => Ok(ExecutionOutcome::Cancelled),
                    Err(err)  => Err(err),
                }
            },
        };

        match &res {
            Ok(ExecutionOutcome::Completed(results)) => { info!("Workload '{}' completed with {} result{}", self.profile.name, results.len(), if results.len() == 1 { "" } else { "s" }); },
            Ok(ExecutionOutcome::Cancelled)          => { info!("Workload '{}' was cancelled", self.profile.name); },
            Err(err)                                 => { error!("Workload '{}' failed ({}): {}", self.profile.name, err.reason(), err); },
        }
        self.state = if res.is_ok() { ExecutorState::Completed } else { ExecutorState::Faulted };
        res
    }
}

impl RoleAware for RoleExecutor {
    #[inline]
    fn supported_roles(&self) -> &[Role] { &self.profile.supported_roles }

    #[inline]
    fn role(&self) -> Option<&Role> { self.role.as_ref() }
}
