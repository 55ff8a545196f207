//  STATUS.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:20:05
//  Last edited:
//    20 Feb 2023, 14:12:48
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements function(s) that handle the liveness and readiness paths:
//!   `/heartbeat` and `/status/server-online`.
//

use std::sync::Arc;

use log::{debug, error};
use warp::{Rejection, Reply};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

use specifications::status::OnlineStatus;

pub use crate::errors::StateError as Error;
use crate::spec::{empty_response, json_response, response, Context};


/***** LIBRARY *****/
/// Handles a GET on the main `/heartbeat` path, returning that this instance is alive.
///
/// # Returns
/// The response that can be send back to the client. Simply contains the string "OK!\n".
///
/// # Errors
/// This function doesn't usually error.
pub async fn heartbeat() -> Result<impl Reply, Rejection> {
    debug!("Handling GET on `/heartbeat` (i.e., confirming instance is alive)...");
    Ok(response(StatusCode::OK, "OK!\n"))
}



/// Handles a GET on the `/status/server-online` path, returning whether the local executor marked itself ready.
///
/// # Arguments
/// - `context`: The context that carries the online flag.
///
/// # Returns
/// A response with the following codes:
/// - `200 OK` if the executor is online;
/// - `503 SERVICE UNAVAILABLE` if it is not (yet).
///
/// Both carry a JSON-encoded [`OnlineStatus`] as body.
///
/// # Errors
/// This function errors if we failed to serialize the status.
pub async fn get(context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling GET on `/status/server-online` (i.e., get readiness)...");

    let status: OnlineStatus = OnlineStatus{ online: context.is_online() };
    let body: String = match serde_json::to_string(&status) {
        Ok(body) => body,
        Err(err) => { return Err(warp::reject::custom(Error::StatusSerializeError{ err })); },
    };

    Ok(json_response(if status.online { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE }, body))
}

/// Handles a PUT on the `/status/server-online` path, setting whether the local executor is ready.
///
/// # Arguments
/// - `body`: The raw body of the request, which should be a JSON-encoded [`OnlineStatus`].
/// - `context`: The context that carries the online flag.
///
/// # Returns
/// A response with the following codes:
/// - `200 OK` if the flag was set;
/// - `400 BAD REQUEST` if the body was not a valid status.
///
/// # Errors
/// This function doesn't usually error.
pub async fn put(body: Bytes, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling PUT on `/status/server-online` (i.e., set readiness)...");

    let status: OnlineStatus = match serde_json::from_slice(&body) {
        Ok(status) => status,
        Err(err)   => {
            error!("Failed to parse incoming request body as online status: {}", err);
            return Ok(response(StatusCode::BAD_REQUEST, err.to_string()));
        },
    };
    context.set_online(status.online);

    Ok(empty_response(StatusCode::OK))
}
