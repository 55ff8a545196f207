//  LIB.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 09:44:18
//  Last edited:
//    28 Feb 2023, 10:20:31
//  Auto updated?
//    Yes
//
//  Description:
//!   The `bench-exe` crate implements the role executors: given a
//!   workload profile and the layout of a run, it resolves which role the
//!   local agent plays, coordinates with its peer and runs the workload.
//

// Declare modules
pub mod errors;
pub mod spec;
pub mod profile;
pub mod parser;
pub mod coordination;
pub mod dispatch;
pub mod server;
pub mod client;
pub mod executor;


// Bring some stuff into the crate namespace
pub use errors::{ErrorReason, ExecutorError};
pub use executor::{Collaborators, RoleExecutor};
pub use spec::{Executable, ExecutionOutcome, Initializable, RoleAware};
