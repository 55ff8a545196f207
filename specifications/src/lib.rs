//  LIB.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 10:58:13
//  Last edited:
//    23 Feb 2023, 15:20:11
//  Auto updated?
//    Yes
//
//  Description:
//!   The `specifications` crate defines everything that goes over the
//!   wire between instances: roles, state documents, instructions and
//!   the metrics reported at the end of a run.
//

pub mod errors;
pub mod properties;
pub mod role;
pub mod state;
pub mod status;
pub mod instructions;
pub mod metrics;
