//  STATE.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 11:02:17
//  Last edited:
//    20 Feb 2023, 16:31:09
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines functions that handle the various REST-functions on the
//!   `/state/{key}` path.
//

use std::sync::Arc;

use log::{debug, error, info};
use warp::{Rejection, Reply};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;

use specifications::properties::Properties;
use specifications::state::StateItem;

pub use crate::errors::StateError as Error;
use crate::errors::StoreError;
use crate::spec::{empty_response, json_response, response, Context};


/***** HELPER FUNCTIONS *****/
/// Parses the body of a create- or update-request as the definition of a state document.
///
/// # Returns
/// The parsed definition, or a `400 BAD REQUEST` response describing why it could not be parsed.
fn parse_definition(key: &str, body: &Bytes) -> Result<Properties, Response> {
    match serde_json::from_slice(body) {
        Ok(definition) => Ok(definition),
        Err(err)       => {
            error!("Failed to parse incoming body for state document '{}' as a JSON object: {}", key, err);
            Err(response(StatusCode::BAD_REQUEST, err.to_string()))
        },
    }
}

/// Serializes the given document to a response with the given code.
fn item_response(status: StatusCode, item: &StateItem) -> Result<Response, Rejection> {
    match serde_json::to_string(item) {
        Ok(body) => Ok(json_response(status, body)),
        Err(err) => Err(warp::reject::custom(Error::ItemSerializeError{ key: item.id.clone(), err })),
    }
}





/***** LIBRARY *****/
/// Handles a GET on a `/state/{key}` path, returning the document with that key.
///
/// # Arguments
/// - `key`: The key of the document to return.
/// - `context`: The context that carries the store.
///
/// # Returns
/// A response with the following codes:
/// - `200 OK` with the JSON-encoded [`StateItem`] as body;
/// - `404 NOT FOUND` if there is no such document.
///
/// # Errors
/// This function errors if we failed to serialize the document.
pub async fn get(key: String, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling GET on `/state/{}` (i.e., get state document)...", key);

    match context.store.get(&key) {
        Some(item) => item_response(StatusCode::OK, &item),
        None       => Ok(empty_response(StatusCode::NOT_FOUND)),
    }
}

/// Handles a POST on a `/state/{key}` path, creating a new document with that key.
///
/// # Arguments
/// - `key`: The key of the document to create.
/// - `body`: The raw body of the request, which should be the JSON object to store.
/// - `context`: The context that carries the store.
///
/// # Returns
/// A response with the following codes:
/// - `201 CREATED` with the stored [`StateItem`] as body;
/// - `400 BAD REQUEST` if the body was not a JSON object;
/// - `409 CONFLICT` if a document with the same key already exists.
///
/// # Errors
/// This function errors if we failed to serialize the stored document.
pub async fn create(key: String, body: Bytes, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling POST on `/state/{}` (i.e., create state document)...", key);

    let definition: Properties = match parse_definition(&key, &body) {
        Ok(definition) => definition,
        Err(res)       => { return Ok(res); },
    };
    match context.store.create(&key, definition) {
        Ok(item)                                   => { info!("Created state document '{}'", key); item_response(StatusCode::CREATED, &item) },
        Err(err @ StoreError::AlreadyExists{ .. }) => Ok(response(StatusCode::CONFLICT, err.to_string())),
        Err(err)                                   => Ok(response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

/// Handles a PUT on a `/state/{key}` path, replacing the document with that key.
///
/// # Arguments
/// - `key`: The key of the document to replace.
/// - `body`: The raw body of the request, which should be the JSON object to store.
/// - `context`: The context that carries the store.
///
/// # Returns
/// A response with the following codes:
/// - `200 OK` with the stored [`StateItem`] as body;
/// - `400 BAD REQUEST` if the body was not a JSON object;
/// - `404 NOT FOUND` if there is no such document to replace.
///
/// # Errors
/// This function errors if we failed to serialize the stored document.
pub async fn update(key: String, body: Bytes, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling PUT on `/state/{}` (i.e., update state document)...", key);

    let definition: Properties = match parse_definition(&key, &body) {
        Ok(definition) => definition,
        Err(res)       => { return Ok(res); },
    };
    match context.store.update(&key, definition) {
        Ok(item)                              => item_response(StatusCode::OK, &item),
        Err(err @ StoreError::NotFound{ .. }) => Ok(response(StatusCode::NOT_FOUND, err.to_string())),
        Err(err)                              => Ok(response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

/// Handles a DELETE on a `/state/{key}` path, removing the document with that key.
///
/// # Arguments
/// - `key`: The key of the document to remove.
/// - `context`: The context that carries the store.
///
/// # Returns
/// A `200 OK` response, regardless of whether the document existed.
///
/// # Errors
/// This function doesn't usually error.
pub async fn delete(key: String, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling DELETE on `/state/{}` (i.e., delete state document)...", key);

    if context.store.delete(&key).is_some() { info!("Deleted state document '{}'", key); }
    Ok(empty_response(StatusCode::OK))
}
