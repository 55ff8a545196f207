//  LIB.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:02:41
//  Last edited:
//    21 Feb 2023, 09:55:13
//  Auto updated?
//    Yes
//
//  Description:
//!   The `bench-api` crate implements the small HTTP API that every
//!   instance exposes to its peers: a heartbeat, an online flag, a store
//!   of named state documents and an inbox for instructions.
//

// Declare modules
pub mod errors;
pub mod spec;
pub mod store;
pub mod status;
pub mod state;
pub mod instructions;
pub mod server;
