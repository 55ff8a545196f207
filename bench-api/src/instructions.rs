//  INSTRUCTIONS.rs
//    by Lut99
//
//  Created:
//    14 Feb 2023, 13:40:55
//  Last edited:
//    21 Feb 2023, 09:50:26
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the function that handles a POST on the `/instructions`
//!   path, handing the instruction to the dispatcher of the local
//!   executor and returning its verdict.
//

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use warp::{Rejection, Reply};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

use specifications::instructions::{Instructions, InstructionsType};

pub use crate::errors::InstructionsError as Error;
use crate::spec::{empty_response, response, Context, InstructionRequest, InstructionVerdict};


/***** LIBRARY *****/
/// Handles a POST on the `/instructions` path.
///
/// # Arguments
/// - `body`: The raw body of the request, which should be a JSON-encoded [`Instructions`] envelope.
/// - `context`: The context that carries the dispatcher channel.
///
/// # Returns
/// A response with the following codes:
/// - `200 OK` if the dispatcher accepted the instruction;
/// - `400 BAD REQUEST` if the body was not a known instruction, or the dispatcher found its parameters invalid;
/// - `409 CONFLICT` if the dispatcher refused it because of ordering (e.g., a start without a reset);
/// - `500 INTERNAL SERVER ERROR` if the dispatcher failed to act on it;
/// - `501 NOT IMPLEMENTED` if nothing on this instance accepts instructions.
///
/// # Errors
/// This function errors if the dispatcher disappeared while handling the instruction.
pub async fn post(body: Bytes, context: Arc<Context>) -> Result<impl Reply, Rejection> {
    debug!("Handling POST on `/instructions` (i.e., dispatch instruction)...");

    // Parse the body; unknown instruction types fail here
    let instructions: Instructions = match serde_json::from_slice(&body) {
        Ok(instructions) => instructions,
        Err(err)         => {
            error!("Failed to parse incoming request body as instructions: {}", err);
            return Ok(response(StatusCode::BAD_REQUEST, err.to_string()));
        },
    };
    info!("Received {} instruction", instructions.kind);

    // Find someone to hand it to
    let dispatcher: mpsc::Sender<InstructionRequest> = match context.dispatcher() {
        Some(dispatcher) => dispatcher,
        None             => {
            warn!("Received {} instruction, but no dispatcher is registered", instructions.kind);
            return Ok(empty_response(StatusCode::NOT_IMPLEMENTED));
        },
    };

    // Send it and wait for the verdict
    let kind: InstructionsType = instructions.kind;
    let (tx, rx): (oneshot::Sender<InstructionVerdict>, oneshot::Receiver<InstructionVerdict>) = oneshot::channel();
    if dispatcher.send(InstructionRequest{ instructions, reply: tx }).await.is_err() {
        warn!("Dispatcher stopped listening before {} instruction could be delivered", kind);
        return Ok(empty_response(StatusCode::NOT_IMPLEMENTED));
    }
    let verdict: InstructionVerdict = match rx.await {
        Ok(verdict) => verdict,
        Err(_)      => { return Err(warp::reject::custom(Error::DispatcherVanished{ kind })); },
    };
    debug!("Dispatcher verdict on {} instruction: {}", kind, verdict);

    // Translate the verdict
    Ok(match verdict {
        InstructionVerdict::Accepted             => empty_response(StatusCode::OK),
        InstructionVerdict::OutOfOrder{ reason } => response(StatusCode::CONFLICT, reason),
        InstructionVerdict::Invalid{ reason }    => response(StatusCode::BAD_REQUEST, reason),
        InstructionVerdict::Failed{ reason }     => response(StatusCode::INTERNAL_SERVER_ERROR, reason),
    })
}
