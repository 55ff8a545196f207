//  ERRORS.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 16:18:55
//  Last edited:
//    24 Feb 2023, 13:10:44
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `bench-cfg` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::path::PathBuf;

use bench_shr::debug::PrettyListFormatter;
use specifications::role::Role;


/***** LIBRARY *****/
/// Errors that relate to parsing Addresses.
#[derive(Debug)]
pub enum AddressParseError {
    /// Missing the colon separator (':') in the address.
    MissingColon{ raw: String },
    /// Invalid port number.
    IllegalPortNumber{ raw: String, err: std::num::ParseIntError },
}

impl Display for AddressParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use AddressParseError::*;
        match self {
            MissingColon{ raw }           => write!(f, "Missing address/port separator ':' in '{}' (did you forget to define a port?)", raw),
            IllegalPortNumber{ raw, err } => write!(f, "Illegal port number '{}': {}", raw, err),
        }
    }
}

impl Error for AddressParseError {}



/// Errors that relate to the EnvironmentLayout.
#[derive(Debug)]
pub enum LayoutError {
    /// Failed to open the given file.
    FileOpenError{ path: PathBuf, err: std::io::Error },
    /// Failed to read/parse the given file as YAML.
    FileParseError{ path: PathBuf, err: serde_yaml::Error },
    /// Failed to parse the given reader as YAML.
    ReaderParseError{ err: serde_yaml::Error },

    /// The layout has no instances in it.
    Empty,
    /// Two instances have the same name.
    DuplicateName{ name: String },

    /// No instance in the layout is the local agent.
    UnknownAgent{ agent_id: String },
    /// More than one instance in the layout may be the local agent.
    AmbiguousAgent{ agent_id: String, names: Vec<String> },
    /// No instance in the layout has the given role.
    MissingRole{ role: Role },
    /// More than one instance has a role that should only be played once.
    AmbiguousRole{ role: Role, names: Vec<String> },
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use LayoutError::*;
        match self {
            FileOpenError{ path, err }  => write!(f, "Failed to open layout file '{}': {}", path.display(), err),
            FileParseError{ path, err } => write!(f, "Failed to parse layout file '{}' as YAML: {}", path.display(), err),
            ReaderParseError{ err }     => write!(f, "Failed to parse layout as YAML: {}", err),

            Empty                 => write!(f, "Layout does not list any instances"),
            DuplicateName{ name } => write!(f, "Layout lists instance '{}' more than once", name),

            UnknownAgent{ agent_id }          => write!(f, "No instance in the layout matches agent '{}'", agent_id),
            AmbiguousAgent{ agent_id, names } => write!(f, "Agent '{}' matches multiple instances in the layout: {}", agent_id, PrettyListFormatter::new(names.iter().map(|n| format!("'{}'", n)), "and")),
            MissingRole{ role }               => write!(f, "No instance in the layout has role '{}'", role),
            AmbiguousRole{ role, names }      => write!(f, "Expected one instance with role '{}', found {}", role, PrettyListFormatter::new(names.iter().map(|n| format!("'{}'", n)), "and")),
        }
    }
}

impl Error for LayoutError {}



/// Errors that relate to an AgentConfig.
#[derive(Debug)]
pub enum AgentConfigError {
    /// Failed to open the given config path.
    FileOpenError{ path: PathBuf, err: std::io::Error },
    /// Failed to read from the given config path.
    FileReadError{ path: PathBuf, err: std::io::Error },
    /// Failed to parse the given file.
    FileParseError{ path: PathBuf, err: serde_yaml::Error },

    /// Failed to open the given config path.
    FileCreateError{ path: PathBuf, err: std::io::Error },
    /// Failed to write to the given config path.
    FileWriteError{ path: PathBuf, err: std::io::Error },
    /// Failed to serialze the AgentConfig.
    ConfigSerializeError{ err: serde_yaml::Error },

    /// Failed to load the layout the config refers to.
    LayoutLoadError{ path: PathBuf, err: LayoutError },
}

impl Display for AgentConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use AgentConfigError::*;
        match self {
            FileOpenError{ path, err }  => write!(f, "Failed to open the agent config file '{}': {}", path.display(), err),
            FileReadError{ path, err }  => write!(f, "Failed to read the agent config file '{}': {}", path.display(), err),
            FileParseError{ path, err } => write!(f, "Failed to parse agent config file '{}' as YAML: {}", path.display(), err),

            FileCreateError{ path, err } => write!(f, "Failed to create the agent config file '{}': {}", path.display(), err),
            FileWriteError{ path, err }  => write!(f, "Failed to write to the agent config file '{}': {}", path.display(), err),
            ConfigSerializeError{ err }  => write!(f, "Failed to serialize agent config to YAML: {}", err),

            LayoutLoadError{ path, err } => write!(f, "Failed to load layout '{}': {}", path.display(), err),
        }
    }
}

impl Error for AgentConfigError {}
