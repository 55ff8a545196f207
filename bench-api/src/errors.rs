//  ERRORS.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:05:19
//  Last edited:
//    21 Feb 2023, 09:41:02
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the errors that may occur in the `bench-api` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};
use std::net::SocketAddr;


/***** LIBRARY *****/
/// Defines errors that relate to the in-memory state store.
#[derive(Debug, Eq, PartialEq)]
pub enum StoreError {
    /// Attempted to create a document that already exists.
    AlreadyExists{ key: String },
    /// Attempted to replace a document that does not exist.
    NotFound{ key: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use StoreError::*;
        match self {
            AlreadyExists{ key } => write!(f, "State document '{}' already exists", key),
            NotFound{ key }      => write!(f, "State document '{}' does not exist", key),
        }
    }
}

impl Error for StoreError {}



/// Errors that relate to the `/state` and `/status` paths.
#[derive(Debug)]
pub enum StateError {
    /// Failed to serialize a state document.
    ItemSerializeError{ key: String, err: serde_json::Error },
    /// Failed to serialize the online status.
    StatusSerializeError{ err: serde_json::Error },
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use StateError::*;
        match self {
            ItemSerializeError{ key, err } => write!(f, "Failed to serialize state document '{}': {}", key, err),
            StatusSerializeError{ err }    => write!(f, "Failed to serialize online status: {}", err),
        }
    }
}

impl Error for StateError {}

impl warp::reject::Reject for StateError {}



/// Errors that relate to the `/instructions` path.
#[derive(Debug)]
pub enum InstructionsError {
    /// The dispatcher dropped the request without answering it.
    DispatcherVanished{ kind: specifications::instructions::InstructionsType },
}

impl Display for InstructionsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use InstructionsError::*;
        match self {
            DispatcherVanished{ kind } => write!(f, "Instruction dispatcher stopped before answering {} instruction", kind),
        }
    }
}

impl Error for InstructionsError {}

impl warp::reject::Reject for InstructionsError {}



/// Errors that relate to serving the API.
#[derive(Debug)]
pub enum ServerError {
    /// Failed to bind the server to the given address.
    ServerBindError{ address: SocketAddr, err: warp::Error },
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ServerError::*;
        match self {
            ServerBindError{ address, err } => write!(f, "Failed to bind API server to '{}': {}", address, err),
        }
    }
}

impl Error for ServerError {}
