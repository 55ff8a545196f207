//  LAYOUT.rs
//    by Lut99
//
//  Created:
//    09 Feb 2023, 09:14:52
//  Last edited:
//    24 Feb 2023, 13:02:27
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the `layout.yml` file, which lists the instances that take
//!   part in a multi-machine benchmark run and the role each of them
//!   plays.
//

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use specifications::role::Role;

pub use crate::errors::LayoutError as Error;


/***** TESTS *****/





/***** LIBRARY *****/
/// Describes a single instance taking part in the run.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClientInstance {
    /// The name of the instance. Unique within a layout.
    pub name       : String,
    /// The address on which the instance (and its API) may be reached.
    #[serde(alias = "ipAddress", alias = "IPAddress")]
    pub ip_address : IpAddr,
    /// The role that this instance plays.
    pub role       : Role,
}

impl ClientInstance {
    /// Constructor for the ClientInstance.
    #[inline]
    pub fn new(name: impl Into<String>, ip_address: impl Into<IpAddr>, role: Role) -> Self {
        Self { name: name.into(), ip_address: ip_address.into(), role }
    }

    /// Returns whether this instance is the one identified by the given agent ID (i.e., by name or by IP address).
    #[inline]
    pub fn is_agent(&self, agent_id: &str) -> bool {
        self.name.eq_ignore_ascii_case(agent_id) || self.ip_address.to_string() == agent_id
    }
}



/// Defines the `layout.yml` file that lists all instances in a multi-machine run.
///
/// Once loaded (and validated), it is never changed.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnvironmentLayout {
    /// The instances that take part, in order.
    pub clients : Vec<ClientInstance>,
}

impl EnvironmentLayout {
    /// Constructor for the EnvironmentLayout that validates the given instances.
    ///
    /// # Errors
    /// This function errors if there are no instances or their names are not unique.
    pub fn new(clients: Vec<ClientInstance>) -> Result<Self, Error> {
        let layout: Self = Self { clients };
        layout.validate()?;
        Ok(layout)
    }

    /// Constructor for the EnvironmentLayout that reads it from the given path.
    ///
    /// # Errors
    /// This function errors if the given file cannot be read, has an invalid format or describes an invalid layout.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path: &Path = path.as_ref();
        debug!("Loading environment layout '{}'...", path.display());

        let handle: File = match File::open(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(Error::FileOpenError{ path: path.into(), err }); },
        };
        match Self::from_reader(handle) {
            Ok(layout)                           => Ok(layout),
            Err(Error::ReaderParseError{ err }) => Err(Error::FileParseError{ path: path.into(), err }),
            Err(err)                             => Err(err),
        }
    }

    /// Constructor for the EnvironmentLayout that reads it from the given reader. Since JSON is valid YAML, either works.
    ///
    /// # Errors
    /// This function errors if we failed to parse the contents or they describe an invalid layout.
    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        let layout: Self = match serde_yaml::from_reader(reader) {
            Ok(layout) => layout,
            Err(err)   => { return Err(Error::ReaderParseError{ err }); },
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Checks that there is at least one instance and that all names are unique (case-insensitively).
    pub fn validate(&self) -> Result<(), Error> {
        if self.clients.is_empty() { return Err(Error::Empty); }
        let mut names: HashSet<String> = HashSet::with_capacity(self.clients.len());
        for c in &self.clients {
            if !names.insert(c.name.to_lowercase()) { return Err(Error::DuplicateName{ name: c.name.clone() }); }
        }
        Ok(())
    }



    /// Resolves the instance that is the given agent.
    ///
    /// # Arguments
    /// - `agent_id`: The identity of the local agent. Matched case-insensitively against instance names, or exactly against their IP addresses.
    ///
    /// # Returns
    /// The only instance that matches.
    ///
    /// # Errors
    /// This function errors if no instance matches, or if more than one does. It never picks one at random.
    pub fn resolve(&self, agent_id: impl AsRef<str>) -> Result<&ClientInstance, Error> {
        let agent_id: &str = agent_id.as_ref();
        let matches: Vec<&ClientInstance> = self.clients.iter().filter(|c| c.is_agent(agent_id)).collect();
        match matches.len() {
            0 => Err(Error::UnknownAgent{ agent_id: agent_id.into() }),
            1 => Ok(matches[0]),
            _ => Err(Error::AmbiguousAgent{ agent_id: agent_id.into(), names: matches.into_iter().map(|c| c.name.clone()).collect() }),
        }
    }

    /// Returns all instances with the given role, in layout order.
    #[inline]
    pub fn instances_with_role<'s: 'r, 'r>(&'s self, role: &'r Role) -> impl 'r + Iterator<Item = &'s ClientInstance> {
        self.clients.iter().filter(move |c| &c.role == role)
    }

    /// Returns the only instance with the given role.
    ///
    /// # Errors
    /// This function errors if there is no such instance, or more than one.
    pub fn single_with_role(&self, role: &Role) -> Result<&ClientInstance, Error> {
        let mut iter = self.clients.iter().filter(|c| &c.role == role);
        let first: &ClientInstance = match iter.next() {
            Some(first) => first,
            None        => { return Err(Error::MissingRole{ role: role.clone() }); },
        };
        let rest: Vec<String> = iter.map(|c| c.name.clone()).collect();
        if !rest.is_empty() {
            let mut names: Vec<String> = vec![ first.name.clone() ];
            names.extend(rest);
            return Err(Error::AmbiguousRole{ role: role.clone(), names });
        }
        Ok(first)
    }
}
