//  INSTRUCTIONS.rs
//    by Lut99
//
//  Created:
//    07 Feb 2023, 10:02:44
//  Last edited:
//    23 Feb 2023, 15:17:31
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the instructions that a client-role instance may push to a
//!   server-role instance to drive its workload.
//

use std::fmt::{Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bench_shr::debug::EnumDebug;

pub use crate::errors::InstructionsError as Error;
use crate::properties::Properties;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_wire_format() {
        let instr: Instructions = Instructions::start_execution(Properties::new().with("Scenario", "ping-pong").with("Duration", 30));
        let raw: String = serde_json::to_string(&instr).unwrap();
        assert!(raw.contains("\"Type\":\"ClientServerStartExecution\""));

        let back: Instructions = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, instr);
        assert_eq!(back.require_str("scenario").unwrap(), "ping-pong");
        assert_eq!(back.require_u64("DURATION").unwrap(), 30);
    }

    #[test]
    fn instructions_unknown_type_rejected() {
        assert!(serde_json::from_str::<Instructions>(r#"{ "Type": "ClientServerSelfDestruct", "Properties": {} }"#).is_err());
    }

    #[test]
    fn instructions_properties_optional() {
        let instr: Instructions = serde_json::from_str(r#"{ "Type": "ClientServerReset" }"#).unwrap();
        assert_eq!(instr.kind, InstructionsType::ClientServerReset);
        assert!(instr.properties.is_empty());
        assert!(matches!(instr.require_str("Scenario"), Err(Error::MissingProperty{ .. })));
    }
}





/***** LIBRARY *****/
/// Defines the kinds of instructions that exist. Anything else is rejected when parsing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum InstructionsType {
    /// Discards any run in progress on the receiving side and arms it for a new one.
    ClientServerReset,
    /// Starts the workload on the receiving side with the parameters in the instruction.
    ClientServerStartExecution,
}

impl EnumDebug for InstructionsType {
    #[inline]
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult { write!(f, "{}", self) }
}

impl Display for InstructionsType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use InstructionsType::*;
        match self {
            ClientServerReset          => write!(f, "ClientServerReset"),
            ClientServerStartExecution => write!(f, "ClientServerStartExecution"),
        }
    }
}



/// The envelope that is POSTed to the `/instructions` path.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instructions {
    /// The kind of instruction.
    #[serde(rename = "Type")]
    pub kind       : InstructionsType,
    /// Any parameters that come with it.
    #[serde(default)]
    pub properties : Properties,
}

impl Instructions {
    /// Constructor for a `ClientServerReset` instruction.
    #[inline]
    pub fn reset() -> Self { Self { kind: InstructionsType::ClientServerReset, properties: Properties::new() } }

    /// Constructor for a `ClientServerStartExecution` instruction.
    ///
    /// # Arguments
    /// - `properties`: The execution parameters (scenario, protocol, duration, ...) for the receiving side.
    #[inline]
    pub fn start_execution(properties: Properties) -> Self { Self { kind: InstructionsType::ClientServerStartExecution, properties } }



    /// Returns the given property as a string, failing if it's missing or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str, Error> {
        match self.properties.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(value)                => Err(Error::IllegalProperty{ kind: self.kind, name: name.into(), expected: "a string", raw: value.to_string() }),
            None                       => Err(Error::MissingProperty{ kind: self.kind, name: name.into() }),
        }
    }

    /// Returns the given property as an unsigned integer, failing if it's missing or not an unsigned integer.
    pub fn require_u64(&self, name: &str) -> Result<u64, Error> {
        match self.properties.get(name) {
            Some(value) => value.as_u64().ok_or_else(|| Error::IllegalProperty{ kind: self.kind, name: name.into(), expected: "an unsigned integer", raw: value.to_string() }),
            None        => Err(Error::MissingProperty{ kind: self.kind, name: name.into() }),
        }
    }
}
