//  SERVER.rs
//    by Lut99
//
//  Created:
//    14 Feb 2023, 15:22:10
//  Last edited:
//    21 Feb 2023, 10:03:58
//  Auto updated?
//    Yes
//
//  Description:
//!   Composes the warp paths of the API into one filter and serves it
//!   until told to stop.
//

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use percent_encoding::percent_decode_str;
use tokio_util::sync::CancellationToken;
use warp::{Filter, Rejection, Reply};

pub use crate::errors::ServerError as Error;
use crate::spec::Context;
use crate::{instructions, state, status};


/***** CONSTANTS *****/
/// The maximum size of any request body we accept.
pub const MAX_BODY_SIZE: u64 = 1024 * 1024;





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use warp::http::StatusCode;
    use warp::hyper::body::Bytes;

    use specifications::instructions::{Instructions, InstructionsType};
    use specifications::state::StateItem;
    use specifications::status::OnlineStatus;

    use super::*;
    use crate::spec::{InstructionRequest, InstructionVerdict};

    #[tokio::test]
    async fn heartbeat_is_ok() {
        let filter = filter(Arc::new(Context::new()));
        let res = warp::test::request().method("GET").path("/heartbeat").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), &Bytes::from("OK!\n"));
    }

    #[tokio::test]
    async fn online_status_follows_flag() {
        let context: Arc<Context> = Arc::new(Context::new());
        let filter = filter(context.clone());

        let res = warp::test::request().method("GET").path("/status/server-online").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let res = warp::test::request().method("PUT").path("/status/server-online").body(r#"{"Online":true}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(context.is_online());

        let res = warp::test::request().method("GET").path("/status/server-online").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        let status: OnlineStatus = serde_json::from_slice(res.body()).unwrap();
        assert!(status.online);

        let res = warp::test::request().method("PUT").path("/status/server-online").body("online please").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(context.is_online());
    }

    #[tokio::test]
    async fn state_crud_codes() {
        let filter = filter(Arc::new(Context::new()));

        let res = warp::test::request().method("GET").path("/state/ServerState").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request().method("POST").path("/state/ServerState").body(r#"{"ServerSetupCompleted":true,"Ports":[6379]}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = warp::test::request().method("POST").path("/state/ServerState").body(r#"{"Ports":[1]}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = warp::test::request().method("POST").path("/state/Other").body("[1, 2, 3]").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request().method("PUT").path("/state/serverstate").body(r#"{"Ports":[1234]}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        let item: StateItem = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(item.revision, 1);
        assert_eq!(item.id, "ServerState");
        let res = warp::test::request().method("PUT").path("/state/Other").body(r#"{"Ports":[1234]}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = warp::test::request().method("GET").path("/state/SERVERSTATE").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        let item: StateItem = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(item.get("Ports"), Some(&serde_json::json!([ 1234 ])));

        for _ in 0..2 {
            let res = warp::test::request().method("DELETE").path("/state/ServerState").reply(&filter).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = warp::test::request().method("GET").path("/state/ServerState").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn state_keys_are_percent_decoded() {
        let context: Arc<Context> = Arc::new(Context::new());
        let filter = filter(context.clone());

        let res = warp::test::request().method("POST").path("/state/Runs%2F42%3F").body(r#"{"Done":false}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let item: StateItem = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(item.id, "Runs/42?");

        let res = warp::test::request().method("GET").path("/state/runs%2f42%3f").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = warp::test::request().method("GET").path("/state/Runs").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn instructions_without_dispatcher() {
        let filter = filter(Arc::new(Context::new()));

        let body: String = serde_json::to_string(&Instructions::reset()).unwrap();
        let res = warp::test::request().method("POST").path("/instructions").body(body).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_IMPLEMENTED);

        let res = warp::test::request().method("POST").path("/instructions").body(r#"{"Type":"ClientServerStop","Properties":{}}"#).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn instructions_reach_dispatcher() {
        let context: Arc<Context> = Arc::new(Context::new());
        let filter = filter(context.clone());

        // Accept resets, refuse everything else
        let mut rx = context.register_dispatcher(4);
        tokio::spawn(async move {
            while let Some(InstructionRequest{ instructions, reply }) = rx.recv().await {
                let verdict: InstructionVerdict = match instructions.kind {
                    InstructionsType::ClientServerReset => InstructionVerdict::Accepted,
                    _                                   => InstructionVerdict::OutOfOrder{ reason: "no reset".into() },
                };
                reply.send(verdict).unwrap();
            }
        });

        let body: String = serde_json::to_string(&Instructions::reset()).unwrap();
        let res = warp::test::request().method("POST").path("/instructions").body(body).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: String = serde_json::to_string(&Instructions::start_execution(Default::default())).unwrap();
        let res = warp::test::request().method("POST").path("/instructions").body(body).reply(&filter).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(res.body(), &Bytes::from("no reset"));
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let token: CancellationToken = CancellationToken::new();
        let (address, server) = serve(Arc::new(Context::new()), ([ 127, 0, 0, 1 ], 0).into(), token.clone()).unwrap();
        assert_ne!(address.port(), 0);

        let handle = tokio::spawn(server);
        token.cancel();
        handle.await.unwrap();
    }
}





/***** HELPER FUNCTIONS *****/
/// Extracts the next path segment as a state key, undoing its percent-encoding.
fn state_key() -> impl Filter<Extract = (String,), Error = Rejection> + Copy {
    warp::path::param::<String>().map(|raw: String| percent_decode_str(&raw).decode_utf8_lossy().into_owned())
}





/***** LIBRARY *****/
/// Builds the filter that implements the full API of an instance.
///
/// # Arguments
/// - `context`: The Context that is shared by all paths.
///
/// # Returns
/// A warp filter with the following paths:
/// - `GET /heartbeat`
/// - `GET /status/server-online`, `PUT /status/server-online`
/// - `GET /state/{key}`, `POST /state/{key}`, `PUT /state/{key}`, `DELETE /state/{key}`
/// - `POST /instructions`
pub fn filter(context: Arc<Context>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
    let context = warp::any().map(move || context.clone());

    let heartbeat = warp::get()
        .and(warp::path("heartbeat"))
        .and(warp::path::end())
        .and_then(status::heartbeat);
    let get_online = warp::get()
        .and(warp::path("status"))
        .and(warp::path("server-online"))
        .and(warp::path::end())
        .and(context.clone())
        .and_then(status::get);
    let put_online = warp::put()
        .and(warp::path("status"))
        .and(warp::path("server-online"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::bytes())
        .and(context.clone())
        .and_then(status::put);

    let get_state = warp::get()
        .and(warp::path("state"))
        .and(state_key())
        .and(warp::path::end())
        .and(context.clone())
        .and_then(state::get);
    let create_state = warp::post()
        .and(warp::path("state"))
        .and(state_key())
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::bytes())
        .and(context.clone())
        .and_then(state::create);
    let update_state = warp::put()
        .and(warp::path("state"))
        .and(state_key())
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::bytes())
        .and(context.clone())
        .and_then(state::update);
    let delete_state = warp::delete()
        .and(warp::path("state"))
        .and(state_key())
        .and(warp::path::end())
        .and(context.clone())
        .and_then(state::delete);

    let post_instructions = warp::post()
        .and(warp::path("instructions"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::bytes())
        .and(context)
        .and_then(instructions::post);

    heartbeat
        .or(get_online)
        .or(put_online)
        .or(get_state)
        .or(create_state)
        .or(update_state)
        .or(delete_state)
        .or(post_instructions)
}



/// Binds the API to the given address.
///
/// # Arguments
/// - `context`: The Context that is shared by all paths.
/// - `address`: The address to bind to. Port `0` binds a random free port.
/// - `token`: The server shuts down gracefully once this token is cancelled.
///
/// # Returns
/// The address that was actually bound and the future that runs the server. Nothing is served until the future is polled.
///
/// # Errors
/// This function errors if we failed to bind to the given address.
pub fn serve(context: Arc<Context>, address: SocketAddr, token: CancellationToken) -> Result<(SocketAddr, impl Future<Output = ()>), Error> {
    let filter = filter(context);
    match warp::serve(filter).try_bind_with_graceful_shutdown(address, async move { token.cancelled().await; }) {
        Ok((bound, server)) => {
            info!("Serving API on '{}'", bound);
            Ok((bound, server))
        },
        Err(err) => Err(Error::ServerBindError{ address, err }),
    }
}
