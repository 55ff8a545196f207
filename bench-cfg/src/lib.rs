//  LIB.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 16:17:12
//  Last edited:
//    09 Feb 2023, 11:47:30
//  Auto updated?
//    Yes
//
//  Description:
//!   The `bench-cfg` crate defines the configuration files that an agent
//!   reads at startup.
//

// Declare modules
pub mod errors;
pub mod spec;
pub mod layout;
pub mod agent;
