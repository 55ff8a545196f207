//  LIFETIME.rs
//    by Lut99
//
//  Created:
//    24 Feb 2023, 13:40:09
//  Last edited:
//    28 Feb 2023, 11:31:52
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the subcommands that host the API and run workloads on
//!   the local agent.
//

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use bench_api::spec::Context;
use bench_cfg::agent::AgentConfig;
use bench_cfg::layout::{ClientInstance, EnvironmentLayout};
use bench_cfg::spec::Address;
use bench_exe::executor::{Collaborators, RoleExecutor};
use bench_exe::profile::WorkloadProfile;
use bench_exe::spec::{Executable as _, ExecutionOutcome, Initializable as _, LogTelemetry};
use bench_tsk::client::ApiClientManager;
use bench_tsk::process::TokioProcessManager;
use bench_tsk::retry::RetryPolicy;

pub use crate::errors::LifetimeError as Error;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::fs;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    use specifications::role::Role;

    use super::*;

    #[test]
    fn layout_resolves_relative_to_agent_config() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let agent_path: PathBuf = dir.path().join("agent.yml");
        fs::write(&agent_path, "agent_id: 1.2.3.5\nlayout: layout.yml\n").unwrap();
        fs::write(dir.path().join("layout.yml"), "clients:\n  - name: client-1\n    ip_address: 1.2.3.4\n    role: Client\n  - name: server\n    ip_address: 1.2.3.5\n    role: Server\n").unwrap();

        let me: ClientInstance = layout(&agent_path).unwrap();
        assert_eq!(me, ClientInstance::new("server", Ipv4Addr::new(1, 2, 3, 5), Role::Server));
    }

    #[test]
    fn layout_errors() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let agent_path: PathBuf = dir.path().join("agent.yml");

        fs::write(&agent_path, "agent_id: local\n").unwrap();
        assert!(matches!(layout(&agent_path), Err(Error::NoLayout{ .. })));

        fs::write(&agent_path, "agent_id: stranger\nlayout: layout.yml\n").unwrap();
        fs::write(dir.path().join("layout.yml"), "clients:\n  - name: server\n    ip_address: 1.2.3.5\n    role: Server\n").unwrap();
        assert!(matches!(layout(&agent_path), Err(Error::RoleResolveError{ .. })));

        assert!(matches!(layout(dir.path().join("missing.yml")), Err(Error::AgentConfigLoadError{ .. })));
    }

    #[tokio::test]
    async fn bind_address_resolves_ips() {
        let address: SocketAddr = bind_address(&Address::ip(Ipv4Addr::LOCALHOST, 4500)).await.unwrap();
        assert_eq!(address, SocketAddr::from(([ 127, 0, 0, 1 ], 4500)));
    }
}





/***** HELPER FUNCTIONS *****/
/// Loads the agent config at the given path.
fn load_agent(path: &Path) -> Result<AgentConfig, Error> {
    debug!("Loading agent config '{}'...", path.display());
    AgentConfig::from_path(path).map_err(|err| Error::AgentConfigLoadError{ err })
}

/// Resolves the address to serve the API on.
async fn bind_address(address: &Address) -> Result<SocketAddr, Error> {
    if let Address::Ip(ip, port) = address { return Ok(SocketAddr::new(*ip, *port)); }
    let mut addrs = match tokio::net::lookup_host(address.to_string()).await {
        Ok(addrs) => addrs,
        Err(err)  => { return Err(Error::AddressResolveError{ address: address.clone(), err }); },
    };
    addrs.next().ok_or_else(|| Error::AddressUnresolved{ address: address.clone() })
}

/// Cancels the given token once the user hits Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C; shutting down...");
                token.cancel();
            },
            Err(err) => { error!("{}", Error::SignalError{ err }); },
        }
    });
}

/// Starts serving the API of the given agent in the background.
///
/// # Returns
/// The address that was actually bound.
async fn spawn_api(agent: &AgentConfig, context: Arc<Context>, token: CancellationToken) -> Result<SocketAddr, Error> {
    let address: SocketAddr = bind_address(&agent.api.address).await?;
    let (bound, server) = match bench_api::server::serve(context, address, token) {
        Ok(res)  => res,
        Err(err) => { return Err(Error::ServeError{ err }); },
    };
    tokio::spawn(server);
    Ok(bound)
}





/***** LIBRARY *****/
/// Serves the API of the local agent until Ctrl+C.
///
/// # Arguments
/// - `agent_path`: The path to the `agent.yml` file of the local agent.
///
/// # Errors
/// This function errors if the agent config could not be loaded or the API could not be served.
pub async fn serve(agent_path: impl AsRef<Path>) -> Result<(), Error> {
    let agent: AgentConfig = load_agent(agent_path.as_ref())?;

    let token: CancellationToken = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());
    let address: SocketAddr = bind_address(&agent.api.address).await?;
    let (_, server) = match bench_api::server::serve(Arc::new(Context::new()), address, token) {
        Ok(res)  => res,
        Err(err) => { return Err(Error::ServeError{ err }); },
    };
    server.await;
    info!("API of agent '{}' stopped", agent.agent_id);
    Ok(())
}



/// Runs the given workload as the local agent, serving its API for the duration.
///
/// # Arguments
/// - `agent_path`: The path to the `agent.yml` file of the local agent.
/// - `profile_path`: The path to the profile of the workload to run.
///
/// # Returns
/// How the run ended. Hitting Ctrl+C cancels it, which is not an error.
///
/// # Errors
/// This function errors if any of the configs failed to load, the API could not be served or the executor failed.
pub async fn run(agent_path: impl AsRef<Path>, profile_path: impl AsRef<Path>) -> Result<ExecutionOutcome, Error> {
    let agent_path: &Path = agent_path.as_ref();
    let agent: AgentConfig = load_agent(agent_path)?;
    let layout: Option<EnvironmentLayout> = agent.load_layout(agent_path).map_err(|err| Error::LayoutLoadError{ err })?;
    let profile: WorkloadProfile = WorkloadProfile::from_path(profile_path).map_err(|err| Error::ProfileLoadError{ err })?;

    // Serve our API, which outlives the executor
    let context: Arc<Context> = Arc::new(Context::new());
    let api_token: CancellationToken = CancellationToken::new();
    let bound: SocketAddr = spawn_api(&agent, context.clone(), api_token.clone()).await?;
    debug!("API of agent '{}' listens on '{}'", agent.agent_id, bound);

    // Run the executor
    let collaborators: Collaborators = Collaborators {
        context,
        clients   : Arc::new(ApiClientManager::new(RetryPolicy::from(&agent.retry))),
        processes : Arc::new(TokioProcessManager),
        telemetry : Arc::new(LogTelemetry),
    };
    let mut executor: RoleExecutor = RoleExecutor::new(Arc::new(profile), agent, layout, collaborators);
    let token: CancellationToken = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());
    let res: Result<ExecutionOutcome, Error> = match executor.initialize(&token).await {
        Ok(())   => executor.execute(&token).await.map_err(|err| Error::ExecutorError{ err }),
        Err(err) => Err(Error::ExecutorError{ err }),
    };

    api_token.cancel();
    res
}



/// Resolves which instance of its layout the local agent is.
///
/// # Arguments
/// - `agent_path`: The path to the `agent.yml` file of the local agent.
///
/// # Errors
/// This function errors if the agent has no layout, or is not (unambiguously) in it.
pub fn layout(agent_path: impl AsRef<Path>) -> Result<ClientInstance, Error> {
    let agent_path: &Path = agent_path.as_ref();
    let agent: AgentConfig = load_agent(agent_path)?;
    let layout: EnvironmentLayout = match agent.load_layout(agent_path) {
        Ok(Some(layout)) => layout,
        Ok(None)         => { return Err(Error::NoLayout{ path: agent_path.into() }); },
        Err(err)         => { return Err(Error::LayoutLoadError{ err }); },
    };
    match layout.resolve(&agent.agent_id) {
        Ok(me)   => Ok(me.clone()),
        Err(err) => Err(Error::RoleResolveError{ agent_id: agent.agent_id, err }),
    }
}
