//  ERRORS.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 13:22:40
//  Last edited:
//    23 Feb 2023, 15:16:02
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors that occur in the `specifications` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use crate::instructions::InstructionsType;


/***** LIBRARY *****/
/// Errors that relate to (typed) state documents.
#[derive(Debug)]
pub enum StateError {
    /// The typed state did not serialize to a JSON object.
    NotAnObject{ id: String },
    /// Failed to serialize a typed state.
    SerializeError{ id: String, err: serde_json::Error },
    /// Failed to interpret a state document as a typed state.
    DeserializeError{ id: String, err: serde_json::Error },
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use StateError::*;
        match self {
            NotAnObject{ id }           => write!(f, "State '{}' does not serialize to a JSON object", id),
            SerializeError{ id, err }   => write!(f, "Failed to serialize state '{}': {}", id, err),
            DeserializeError{ id, err } => write!(f, "Failed to interpret state document '{}': {}", id, err),
        }
    }
}

impl Error for StateError {}



/// Errors that relate to reading parameters from instructions.
#[derive(Debug)]
pub enum InstructionsError {
    /// A required property was not given.
    MissingProperty{ kind: InstructionsType, name: String },
    /// A property was given but had the wrong type.
    IllegalProperty{ kind: InstructionsType, name: String, expected: &'static str, raw: String },
}

impl Display for InstructionsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use InstructionsError::*;
        match self {
            MissingProperty{ kind, name }                 => write!(f, "Instruction {} is missing property '{}'", kind, name),
            IllegalProperty{ kind, name, expected, raw }  => write!(f, "Property '{}' of instruction {} should be {}, got '{}'", name, kind, expected, raw),
        }
    }
}

impl Error for InstructionsError {}
