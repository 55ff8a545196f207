//  SPEC.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 16:20:41
//  Last edited:
//    22 Feb 2023, 11:34:18
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines (public) interfaces and structs for the `bench-cfg` crate.
//

use std::borrow::Cow;
use std::fmt::{Display, Formatter, Result as FResult};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use serde::ser::Serializer;
use serde::de::{self, Deserializer, Visitor};

use bench_shr::debug::EnumDebug;

use crate::errors::AddressParseError;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse() {
        assert_eq!(Address::from_str("1.2.3.5:4500").unwrap(), Address::ip(IpAddr::from([ 1, 2, 3, 5 ]), 4500));
        assert_eq!(Address::from_str("[::1]:4500").unwrap(), Address::ip("::1".parse::<IpAddr>().unwrap(), 4500));
        assert_eq!(Address::from_str("bench-server:80").unwrap(), Address::hostname("bench-server", 80));
        assert!(matches!(Address::from_str("bench-server"), Err(AddressParseError::MissingColon{ .. })));
        assert!(matches!(Address::from_str("bench-server:http"), Err(AddressParseError::IllegalPortNumber{ .. })));
    }

    #[test]
    fn address_display_brackets_ipv6() {
        assert_eq!(Address::ip("::1".parse::<IpAddr>().unwrap(), 4500).to_string(), "[::1]:4500");
        assert_eq!(Address::localhost(4500).url("/heartbeat"), "http://127.0.0.1:4500/heartbeat");
    }
}





/***** LIBRARY *****/
/// Defines a more lenient alternative to a SocketAddr that also accepts hostnames.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Address {
    /// It's an IP address (v4 or v6).
    Ip(IpAddr, u16),
    /// It's a hostname.
    Hostname(String, u16),
}

impl Address {
    /// Constructor for the Address that initializes it for the given IP address.
    #[inline]
    pub fn ip(ip: impl Into<IpAddr>, port: u16) -> Self { Self::Ip(ip.into(), port) }

    /// Constructor for the Address that initializes it for the given hostname.
    #[inline]
    pub fn hostname(hostname: impl Into<String>, port: u16) -> Self { Self::Hostname(hostname.into(), port) }

    /// Constructor for the Address that points to the loopback interface.
    #[inline]
    pub fn localhost(port: u16) -> Self { Self::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST), port) }



    /// Returns the domain-part, as a (serialized) string version.
    ///
    /// # Returns
    /// A `Cow<str>` that either contains a reference to the already String hostname, or else a newly created string that is the serialized version of an IP (in brackets for IPv6).
    #[inline]
    pub fn domain(&self) -> Cow<'_, str> {
        match self {
            Self::Ip(IpAddr::V4(addr), _) => format!("{}", addr).into(),
            Self::Ip(IpAddr::V6(addr), _) => format!("[{}]", addr).into(),
            Self::Hostname(addr, _)       => addr.into(),
        }
    }

    /// Returns the port-part, as a number.
    #[inline]
    pub fn port(&self) -> u16 {
        match self {
            Self::Ip(_, port)       => *port,
            Self::Hostname(_, port) => *port,
        }
    }

    /// Returns the same address but with a different port.
    #[inline]
    pub fn with_port(&self, port: u16) -> Self {
        match self {
            Self::Ip(addr, _)       => Self::Ip(*addr, port),
            Self::Hostname(addr, _) => Self::Hostname(addr.clone(), port),
        }
    }

    /// Returns the plain-HTTP URL of the given path on this address.
    ///
    /// # Arguments
    /// - `path`: The path to append. Should start with a slash.
    #[inline]
    pub fn url(&self, path: impl AsRef<str>) -> String { format!("http://{}{}", self, path.as_ref()) }
}

impl EnumDebug for Address {
    #[inline]
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult {
        match self {
            Self::Ip(_, _)       => write!(f, "Ip"),
            Self::Hostname(_, _) => write!(f, "Hostname"),
        }
    }
}

impl Display for Address {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}:{}", self.domain(), self.port())
    }
}

impl Serialize for Address {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
impl<'de> Deserialize<'de> for Address {
    #[inline]
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        /// Defines the visitor for the Address
        struct AddressVisitor;
        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = Address;

            #[inline]
            fn expecting(&self, f: &mut Formatter<'_>) -> FResult {
                write!(f, "an address:port pair")
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Address::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}
impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Attempt to find the colon first
        let colon_pos: usize = match s.rfind(':') {
            Some(pos) => pos,
            None      => { return Err(AddressParseError::MissingColon{ raw: s.into() }); },
        };
        let (address, port): (&str, &str) = (&s[..colon_pos], &s[colon_pos + 1..]);

        // Parse the port
        let port: u16 = match u16::from_str(port) {
            Ok(port) => port,
            Err(err) => { return Err(AddressParseError::IllegalPortNumber{ raw: port.into(), err }); },
        };

        // IPv6 addresses come in brackets
        let address: &str = address.strip_prefix('[').and_then(|a| a.strip_suffix(']')).unwrap_or(address);
        match IpAddr::from_str(address) {
            Ok(ip)   => Ok(Self::Ip(ip, port)),
            Err(err) => {
                debug!("Parsing '{}' as a hostname, but might be an invalid IP address (parser feedback: {})", address, err);
                Ok(Self::Hostname(address.into(), port))
            },
        }
    }
}
