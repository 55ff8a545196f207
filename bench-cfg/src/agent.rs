//  AGENT.rs
//    by Lut99
//
//  Created:
//    09 Feb 2023, 11:47:30
//  Last edited:
//    24 Feb 2023, 13:15:09
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the `agent.yml` file that describes the local agent: who it
//!   is, where its API listens, how it retries remote calls and where
//!   to find the environment layout (if any).
//

use std::fs::File;
use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::errors::AgentConfigError as Error;
use crate::layout::EnvironmentLayout;
use crate::spec::Address;


/***** CONSTANTS *****/
/// The port on which the API of every instance listens by default.
pub const DEFAULT_API_PORT: u16 = 4500;

/// The number of times a transient failure of a single remote call is retried by default.
pub const DEFAULT_MAX_RETRIES: u32 = 10;





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_config_defaults() {
        let config: AgentConfig = serde_yaml::from_str("agent_id: bench-client\n").unwrap();
        assert_eq!(config.agent_id, "bench-client");
        assert_eq!(config.api.address.port(), DEFAULT_API_PORT);
        assert_eq!(config.peer_port, DEFAULT_API_PORT);
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(500));
        assert!(config.layout.is_none());
    }

    #[test]
    fn agent_config_path_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("agent.yml");

        let mut config: AgentConfig = AgentConfig::new("bench-server");
        config.retry.max_retries = 3;
        config.layout = Some("layout.yml".into());
        config.to_path(&path).unwrap();

        let back: AgentConfig = AgentConfig::from_path(&path).unwrap();
        assert_eq!(back.agent_id, "bench-server");
        assert_eq!(back.retry.max_retries, 3);
        // Relative layout paths are resolved next to the agent file
        assert_eq!(back.layout_path(&path), Some(dir.path().join("layout.yml")));
    }
}





/***** LIBRARY *****/
/// Defines where the local API listens.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ApiConfig {
    /// The address to bind the API server to.
    pub address : Address,
}
impl Default for ApiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            address : Address::ip(Ipv4Addr::UNSPECIFIED, DEFAULT_API_PORT),
        }
    }
}



/// Defines how single remote calls are retried when they fail transiently.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RetryConfig {
    /// The maximum number of retries after the first attempt.
    pub max_retries   : u32,
    /// The delay before the first retry, in milliseconds. Doubles every retry.
    pub base_delay_ms : u64,
    /// The maximum delay between two retries, in milliseconds.
    pub max_delay_ms  : u64,
}
impl RetryConfig {
    /// Returns the base delay as a Duration.
    #[inline]
    pub fn base_delay(&self) -> Duration { Duration::from_millis(self.base_delay_ms) }

    /// Returns the maximum delay as a Duration.
    #[inline]
    pub fn max_delay(&self) -> Duration { Duration::from_millis(self.max_delay_ms) }
}
impl Default for RetryConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_retries   : DEFAULT_MAX_RETRIES,
            base_delay_ms : 500,
            max_delay_ms  : 10_000,
        }
    }
}



/// Defines an `agent.yml` file that describes the local agent.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgentConfig {
    /// The identity of this agent, matched against the names (or IPs) in the layout.
    #[serde(alias = "id")]
    pub agent_id  : String,

    /// Where our own API listens.
    #[serde(default)]
    pub api       : ApiConfig,
    /// The port on which the APIs of our peers listen.
    #[serde(default = "default_api_port")]
    pub peer_port : u16,
    /// How to retry remote calls.
    #[serde(default)]
    pub retry     : RetryConfig,

    /// The path to the layout file. If omitted, we run in single-machine mode.
    #[serde(default)]
    pub layout    : Option<PathBuf>,
}

/// Serde needs a function for non-`Default` defaults.
#[inline]
fn default_api_port() -> u16 { DEFAULT_API_PORT }

impl AgentConfig {
    /// Constructor for an AgentConfig with the given identity and default settings otherwise.
    #[inline]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id  : agent_id.into(),
            api       : ApiConfig::default(),
            peer_port : DEFAULT_API_PORT,
            retry     : RetryConfig::default(),
            layout    : None,
        }
    }

    /// Constructor for the AgentConfig that reads it from the given path.
    ///
    /// # Arguments
    /// - `path`: The path to read the AgentConfig from.
    ///
    /// # Returns
    /// A new AgentConfig instance with the contents defined in the file.
    ///
    /// # Errors
    /// This function errors if the given file cannot be read or has an invalid format.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path: &Path = path.as_ref();

        // Get the raw file to parse
        let mut raw: String = String::new();
        {
            let mut handle: File = match File::open(path) {
                Ok(handle) => handle,
                Err(err)   => { return Err(Error::FileOpenError{ path: path.into(), err }); },
            };
            if let Err(err) = handle.read_to_string(&mut raw) { return Err(Error::FileReadError{ path: path.into(), err }); }
        }

        // Parse with serde
        match serde_yaml::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(err)   => Err(Error::FileParseError{ path: path.into(), err }),
        }
    }

    /// Writes the AgentConfig to the given path.
    ///
    /// # Errors
    /// This function errors if the given file cannot be written or we failed to serialize ourselves.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path: &Path = path.as_ref();

        let config: String = match serde_yaml::to_string(self) {
            Ok(config) => config,
            Err(err)   => { return Err(Error::ConfigSerializeError{ err }); },
        };

        let mut handle: File = match File::create(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(Error::FileCreateError{ path: path.into(), err }); },
        };
        if let Err(err) = handle.write_all(config.as_bytes()) { return Err(Error::FileWriteError{ path: path.into(), err }); }

        Ok(())
    }



    /// Returns the path of the layout file, resolved relative to the directory of the given agent file.
    ///
    /// # Arguments
    /// - `agent_path`: The path from which this AgentConfig was loaded.
    pub fn layout_path(&self, agent_path: impl AsRef<Path>) -> Option<PathBuf> {
        let layout: &PathBuf = self.layout.as_ref()?;
        if layout.is_absolute() { return Some(layout.clone()); }
        Some(agent_path.as_ref().parent().map(|dir| dir.join(layout)).unwrap_or_else(|| layout.clone()))
    }

    /// Loads the environment layout this config refers to.
    ///
    /// # Arguments
    /// - `agent_path`: The path from which this AgentConfig was loaded (to resolve relative layout paths).
    ///
    /// # Returns
    /// The layout, or `None` if there is none (i.e., single-machine mode).
    ///
    /// # Errors
    /// This function errors if the layout file could not be loaded or was invalid.
    pub fn load_layout(&self, agent_path: impl AsRef<Path>) -> Result<Option<EnvironmentLayout>, Error> {
        match self.layout_path(agent_path) {
            Some(path) => match EnvironmentLayout::from_path(&path) {
                Ok(layout) => Ok(Some(layout)),
                Err(err)   => Err(Error::LayoutLoadError{ path, err }),
            },
            None => Ok(None),
        }
    }

    /// Returns the address on which our own API is reachable from this machine.
    #[inline]
    pub fn local_api_address(&self) -> Address { Address::localhost(self.api.address.port()) }
}
