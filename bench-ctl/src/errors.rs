//  ERRORS.rs
//    by Lut99
//
//  Created:
//    24 Feb 2023, 13:22:57
//  Last edited:
//    28 Feb 2023, 11:05:18
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors that may occur in the `benchctl` executable.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use bench_cfg::spec::Address;
use bench_exe::errors::{ErrorReason, ExecutorError, ProfileError};


/***** LIBRARY *****/
/// Errors that relate to the lifetime of a local agent.
#[derive(Debug)]
pub enum LifetimeError {
    /// Failed to load the agent config.
    AgentConfigLoadError{ err: bench_cfg::agent::Error },
    /// Failed to load the layout the agent config refers to.
    LayoutLoadError{ err: bench_cfg::agent::Error },
    /// The agent config does not refer to a layout.
    NoLayout{ path: PathBuf },
    /// The local agent is not (unambiguously) in the layout.
    RoleResolveError{ agent_id: String, err: bench_cfg::layout::Error },
    /// Failed to load the workload profile.
    ProfileLoadError{ err: ProfileError },

    /// Failed to resolve the address to serve the API on.
    AddressResolveError{ address: Address, err: std::io::Error },
    /// The address to serve the API on resolved to nothing.
    AddressUnresolved{ address: Address },
    /// Failed to start the API server.
    ServeError{ err: bench_api::server::Error },
    /// Failed to listen for Ctrl+C.
    SignalError{ err: std::io::Error },

    /// The executor failed.
    ExecutorError{ err: ExecutorError },
}

impl LifetimeError {
    /// Returns the reason of the executor failure, if that's what this is.
    #[inline]
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            Self::ExecutorError{ err } => Some(err.reason()),
            _                          => None,
        }
    }
}

impl Display for LifetimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use LifetimeError::*;
        match self {
            AgentConfigLoadError{ err }       => write!(f, "Failed to load agent config: {}", err),
            LayoutLoadError{ err }            => write!(f, "Failed to load layout: {}", err),
            NoLayout{ path }                  => write!(f, "Agent config '{}' does not refer to a layout (this agent runs in single-machine mode)", path.display()),
            RoleResolveError{ agent_id, err } => write!(f, "Failed to resolve the role of agent '{}': {}", agent_id, err),
            ProfileLoadError{ err }           => write!(f, "Failed to load workload profile: {}", err),

            AddressResolveError{ address, err } => write!(f, "Failed to resolve API address '{}': {}", address, err),
            AddressUnresolved{ address }        => write!(f, "API address '{}' does not resolve to any address", address),
            ServeError{ err }                   => write!(f, "Failed to serve the API: {}", err),
            SignalError{ err }                  => write!(f, "Failed to listen for Ctrl+C: {}", err),

            ExecutorError{ err } => write!(f, "Executor failed ({}): {}", err.reason(), err),
        }
    }
}

impl Error for LifetimeError {}
