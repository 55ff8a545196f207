//  ROLE.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 11:40:55
//  Last edited:
//    20 Feb 2023, 16:12:08
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the roles that an instance may play during a benchmark run.
//

use std::convert::Infallible;
use std::fmt::{Display, Formatter, Result as FResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use bench_shr::debug::EnumDebug;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_case_insensitive() {
        assert_eq!(Role::from_str("client").unwrap(), Role::Client);
        assert_eq!(Role::from_str("SERVER").unwrap(), Role::Server);
        assert_eq!(Role::from_str("Reverse").unwrap(), Role::Other("reverse".into()));
        assert_eq!(Role::Other("ReVeRsE".into()), Role::Other("reverse".into()));
    }

    #[test]
    fn role_serializes_as_string() {
        assert_eq!(serde_json::to_string(&Role::Server).unwrap(), "\"Server\"");
        let role: Role = serde_json::from_str("\"cLiEnT\"").unwrap();
        assert!(role.is_client());
    }
}





/***** LIBRARY *****/
/// Defines the role that an instance plays in a benchmark run.
///
/// Roles are an open set, compared case-insensitively; `Client` and `Server` are the well-known ones.
#[derive(Clone, Debug)]
pub enum Role {
    /// The instance drives the workload against a server.
    Client,
    /// The instance hosts the workload that clients connect to.
    Server,
    /// Some tool-specific role.
    Other(String),
}

impl Role {
    /// Returns whether this is the `Client` role.
    #[inline]
    pub fn is_client(&self) -> bool { matches!(self, Self::Client) }

    /// Returns whether this is the `Server` role.
    #[inline]
    pub fn is_server(&self) -> bool { matches!(self, Self::Server) }

    /// Returns the canonical, lowercase name of this role.
    fn canonical(&self) -> String {
        match self {
            Self::Client    => "client".into(),
            Self::Server    => "server".into(),
            Self::Other(id) => id.to_lowercase(),
        }
    }
}

impl EnumDebug for Role {
    #[inline]
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Client   => write!(f, "Client"),
            Self::Server   => write!(f, "Server"),
            Self::Other(_) => write!(f, "Other"),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Client    => write!(f, "Client"),
            Self::Server    => write!(f, "Server"),
            Self::Other(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower: String = s.trim().to_lowercase();
        match lower.as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            _        => Ok(Self::Other(s.trim().into())),
        }
    }
}

impl PartialEq for Role {
    #[inline]
    fn eq(&self, other: &Self) -> bool { self.canonical() == other.canonical() }
}
impl Eq for Role {}
impl Hash for Role {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) { self.canonical().hash(state) }
}

impl Serialize for Role {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
impl<'de> Deserialize<'de> for Role {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: String = String::deserialize(deserializer)?;
        match Role::from_str(&raw) {
            Ok(role) => Ok(role),
            Err(err) => match err {},
        }
    }
}
