//  STATUS.rs
//    by Lut99
//
//  Created:
//    07 Feb 2023, 09:30:12
//  Last edited:
//    07 Feb 2023, 09:41:50
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the body of the online-status path.
//

use serde::{Deserialize, Serialize};


/***** LIBRARY *****/
/// The body sent to (and returned from) the `/status/server-online` path.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OnlineStatus {
    /// Whether the executor on the instance has declared itself ready to serve.
    pub online : bool,
}
