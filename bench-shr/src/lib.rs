//  LIB.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 10:11:02
//  Last edited:
//    21 Feb 2023, 14:38:47
//  Auto updated?
//    Yes
//
//  Description:
//!   The `bench-shr` crate defines common tools used throughout the
//!   harness. It differs from the `specifications` crate in that it does
//!   not standardize anything that goes over the wire.
//

// Declare some modules
pub mod debug;
