//  LIB.rs
//    by Lut99
//
//  Created:
//    15 Feb 2023, 09:12:40
//  Last edited:
//    22 Feb 2023, 11:30:02
//  Auto updated?
//    Yes
//
//  Description:
//!   The `bench-tsk` crate implements the calling side of coordination:
//!   a client for the API of a (remote) instance, the retry policy for
//!   its calls, a polling engine on top of it and the runner for the
//!   external workload processes.
//

// Declare modules
pub mod errors;
pub mod retry;
pub mod client;
pub mod polling;
pub mod process;
pub mod dummy;
