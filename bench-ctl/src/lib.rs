//  LIB.rs
//    by Lut99
//
//  Created:
//    24 Feb 2023, 13:20:11
//  Last edited:
//    28 Feb 2023, 11:02:40
//  Auto updated?
//    Yes
//
//  Description:
//!   The `benchctl` executable hosts the coordination API of an instance
//!   and runs the role executors of a workload on it.
//

// Declare modules
pub mod errors;
pub mod lifetime;
