//  CLIENT.rs
//    by Lut99
//
//  Created:
//    15 Feb 2023, 10:18:44
//  Last edited:
//    22 Feb 2023, 11:24:19
//  Auto updated?
//    Yes
//
//  Description:
//!   Provides the client side of the API that every instance exposes,
//!   plus a manager that keeps one client per remote instance.
//

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info};
use reqwest::{Client, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use bench_cfg::spec::Address;
use specifications::instructions::Instructions;
use specifications::state::StateItem;
use specifications::status::OnlineStatus;

pub use crate::errors::ApiError as Error;
use crate::retry::RetryPolicy;


/***** CONSTANTS *****/
/// The time a single request may take before it is considered failed (transiently).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);





/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use bench_api::spec::Context;
    use specifications::properties::Properties;
    use specifications::state::ServerState;

    use super::*;

    /// Spins up a real API on a random loopback port, returning a client bound to it.
    async fn api() -> (Arc<Context>, ApiClient, CancellationToken) {
        let context: Arc<Context> = Arc::new(Context::new());
        let token: CancellationToken = CancellationToken::new();
        let (address, server): (SocketAddr, _) = bench_api::server::serve(context.clone(), ([ 127, 0, 0, 1 ], 0).into(), token.clone()).unwrap();
        tokio::spawn(server);
        (context, ApiClient::new(Address::ip(address.ip(), address.port())).unwrap(), token)
    }

    #[tokio::test]
    async fn client_heartbeat_and_online() {
        let (context, client, token) = api().await;

        client.get_heartbeat(None, &token).await.unwrap();
        assert!(!client.get_server_online_status(None, &token).await.unwrap());
        assert!(!client.is_online());

        client.set_server_online(true, None, &token).await.unwrap();
        assert!(context.is_online());
        assert!(client.get_server_online_status(None, &token).await.unwrap());
        assert!(client.is_online());
        token.cancel();
    }

    #[tokio::test]
    async fn client_state_crud() {
        let (_context, client, token) = api().await;

        // Absence is a value, not an error
        assert!(client.get_state(ServerState::KEY, None, &token).await.unwrap().is_none());

        let item: StateItem = client.create_state(ServerState::KEY, &ServerState::ready(None, [ 6379 ]), None, &token).await.unwrap();
        assert_eq!(item.revision, 0);
        let err: Error = client.create_state(ServerState::KEY, &ServerState::ready(None, [ 1 ]), None, &token).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));

        let state: ServerState = client.get_state_as(ServerState::KEY, None, &token).await.unwrap().unwrap();
        assert_eq!(state.ports, vec![ 6379 ]);

        let item: StateItem = client.update_state(ServerState::KEY, &Properties::new().with("ServerSetupCompleted", false), None, &token).await.unwrap();
        assert_eq!(item.revision, 1);
        let err: Error = client.update_state("Missing", &Properties::new(), None, &token).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_transient());

        client.delete_state(ServerState::KEY, None, &token).await.unwrap();
        client.delete_state(ServerState::KEY, None, &token).await.unwrap();
        assert!(client.get_state(ServerState::KEY, None, &token).await.unwrap().is_none());
        token.cancel();
    }

    #[tokio::test]
    async fn client_state_keys_are_escaped() {
        let (context, client, token) = api().await;

        for key in [ "Runs/42", "What?", "Section#3", "100%", "With space" ] {
            client.create_state(key, &Properties::new().with("Key", key), None, &token).await.unwrap();
            let item: StateItem = client.get_state(key, None, &token).await.unwrap().unwrap();
            assert_eq!(item.id, key);
            client.update_state(key, &Properties::new().with("Key", "updated"), None, &token).await.unwrap();
        }
        assert_eq!(context.store.len(), 5);
        // A key with a slash does not leak into the key before it
        assert!(client.get_state("Runs", None, &token).await.unwrap().is_none());

        for key in [ "Runs/42", "What?", "Section#3", "100%", "With space" ] { client.delete_state(key, None, &token).await.unwrap(); }
        assert_eq!(context.store.len(), 0);
        token.cancel();
    }

    #[tokio::test]
    async fn client_get_or_create() {
        let (context, client, token) = api().await;

        let item: StateItem = client.get_or_create_state("Counter", || Properties::new().with("Value", 1u64), None, &token).await.unwrap();
        assert_eq!(item.definition.get_u64("value"), Some(1));
        // The factory is not used when the document exists
        let item: StateItem = client.get_or_create_state("Counter", || Properties::new().with("Value", 2u64), None, &token).await.unwrap();
        assert_eq!(item.definition.get_u64("value"), Some(1));
        assert_eq!(context.store.len(), 1);
        token.cancel();
    }

    #[tokio::test]
    async fn client_instructions_without_dispatcher() {
        let (_context, client, token) = api().await;
        let err: Error = client.send_instructions(&Instructions::reset(), None, &token).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_IMPLEMENTED));
        token.cancel();
    }

    #[tokio::test]
    async fn client_unreachable_is_transient() {
        // Nothing listens on port 9 of loopback, typically
        let client: ApiClient = ApiClient::new(Address::localhost(9)).unwrap();
        let err: Error = client.get_heartbeat(Some(&RetryPolicy::none()), &CancellationToken::new()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn manager_caches_clients() {
        let manager: ApiClientManager = ApiClientManager::new(RetryPolicy::default());
        let a: Arc<ApiClient> = manager.get_or_create("Server", Address::ip([ 1, 2, 3, 5 ], 4500)).unwrap();
        let b: Arc<ApiClient> = manager.get_or_create("server", Address::ip([ 9, 9, 9, 9 ], 4500)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.address(), &Address::ip([ 1, 2, 3, 5 ], 4500));
        assert!(manager.get("SERVER").is_some());
        assert!(manager.get("client").is_none());
    }
}





/***** LIBRARY *****/
/// A client for the API of one (remote or local) instance.
///
/// Every call takes an optional [`RetryPolicy`] (the client's default is used if omitted) and a token that cancels it.
#[derive(Debug)]
pub struct ApiClient {
    /// The address of the instance's API.
    address : Address,
    /// The HTTP client with which we send requests.
    client  : Client,
    /// The policy used when callers don't specify one.
    retry   : RetryPolicy,
    /// The last online status we observed.
    online  : AtomicBool,
}

impl ApiClient {
    /// Constructor for the ApiClient with the default retry policy.
    ///
    /// # Arguments
    /// - `address`: The address of the API to connect to.
    ///
    /// # Errors
    /// This function errors if we failed to create the HTTP client.
    #[inline]
    pub fn new(address: Address) -> Result<Self, Error> { Self::with_retry(address, RetryPolicy::default()) }

    /// Constructor for the ApiClient with a custom default retry policy.
    ///
    /// # Errors
    /// This function errors if we failed to create the HTTP client.
    pub fn with_retry(address: Address, retry: RetryPolicy) -> Result<Self, Error> {
        let client: Client = match Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(err)   => { return Err(Error::ClientCreateError{ err }); },
        };
        Ok(Self {
            address,
            client,
            retry,
            online : AtomicBool::new(false),
        })
    }



    /// Sends a single request.
    ///
    /// # Arguments
    /// - `method`: The HTTP method to use.
    /// - `url`: The full URL to send the request to.
    /// - `body`: If given, the JSON body to send.
    /// - `accept`: Non-success status codes that are expected answers rather than failures.
    ///
    /// # Returns
    /// The status code and the body of the response.
    async fn attempt(&self, method: Method, url: &str, body: Option<&Value>, accept: &[StatusCode]) -> Result<(StatusCode, String), Error> {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body { builder = builder.json(body); }
        let req: Request = match builder.build() {
            Ok(req)  => req,
            Err(err) => { return Err(Error::RequestBuildError{ address: url.into(), err }); },
        };
        let res: Response = match self.client.execute(req).await {
            Ok(res)  => res,
            Err(err) => { return Err(Error::RequestError{ address: url.into(), err }); },
        };

        let code: StatusCode = res.status();
        if !code.is_success() && !accept.contains(&code) { return Err(Error::RequestFailure{ address: url.into(), code, err: res.text().await.ok() }); }
        match res.text().await {
            Ok(text) => Ok((code, text)),
            Err(err) => Err(Error::ResponseBodyError{ address: url.into(), err }),
        }
    }

    /// Sends a request, retrying it according to the given policy.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>, accept: &[StatusCode], retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<(StatusCode, String), Error> {
        let url: String = self.address.url(path);
        let what: String = format!("{} {}", method, url);
        debug!("Sending {}...", what);

        let policy: &RetryPolicy = retry.unwrap_or(&self.retry);
        let url: &str = &url;
        policy.run(&what, token, || self.attempt(method.clone(), url, body, accept)).await
    }

    /// Serializes the given body.
    fn to_body<T: Serialize>(&self, path: &str, value: &T) -> Result<Value, Error> {
        match serde_json::to_value(value) {
            Ok(value) => Ok(value),
            Err(err)  => Err(Error::RequestSerializeError{ address: self.address.url(path), err }),
        }
    }

    /// Returns the path of the state document with the given key, which is escaped as a single path segment.
    fn state_path(&self, key: &str) -> Result<String, Error> {
        let base: String = self.address.url("/state");
        let mut url: Url = match Url::parse(&base) {
            Ok(url)  => url,
            Err(err) => { return Err(Error::UrlParseError{ url: base, err }); },
        };
        match url.path_segments_mut() {
            Ok(mut segments) => { segments.push(key); },
            Err(_)           => { return Err(Error::UrlNotABase{ url: base }); },
        }
        Ok(url.path().into())
    }

    /// Parses the given response body as a state document.
    fn parse_item(&self, path: &str, raw: String) -> Result<StateItem, Error> {
        match serde_json::from_str(&raw) {
            Ok(item) => Ok(item),
            Err(err) => Err(Error::ResponseJsonParseError{ address: self.address.url(path), raw, err }),
        }
    }



    /// Checks whether the remote process is alive.
    ///
    /// # Errors
    /// This function errors if the remote did not answer (after retrying) or answered with a failure.
    pub async fn get_heartbeat(&self, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<(), Error> {
        self.send(Method::GET, "/heartbeat", None, &[], retry, token).await?;
        Ok(())
    }

    /// Asks whether the remote executor marked itself as online.
    ///
    /// Also updates the cached online flag (see [`ApiClient::is_online()`]).
    ///
    /// # Returns
    /// Whether the remote is online. An offline remote is not an error.
    ///
    /// # Errors
    /// This function errors if the remote did not answer (after retrying) or answered with an unexpected failure.
    pub async fn get_server_online_status(&self, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<bool, Error> {
        let (code, _): (StatusCode, String) = self.send(Method::GET, "/status/server-online", None, &[ StatusCode::SERVICE_UNAVAILABLE ], retry, token).await?;
        let online: bool = code.is_success();
        self.online.store(online, Ordering::SeqCst);
        Ok(online)
    }

    /// Marks the executor of the remote as on- or offline. Typically used on the local instance.
    ///
    /// # Errors
    /// This function errors if the remote did not answer (after retrying) or answered with a failure.
    pub async fn set_server_online(&self, online: bool, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<(), Error> {
        let path: &str = "/status/server-online";
        let body: Value = self.to_body(path, &OnlineStatus{ online })?;
        self.send(Method::PUT, path, Some(&body), &[], retry, token).await?;
        self.online.store(online, Ordering::SeqCst);
        debug!("Marked '{}' as {}", self.address, if online { "online" } else { "offline" });
        Ok(())
    }

    /// Returns the online status last observed through this client.
    #[inline]
    pub fn is_online(&self) -> bool { self.online.load(Ordering::SeqCst) }



    /// Retrieves the state document with the given key.
    ///
    /// # Returns
    /// The document, or `None` if the remote has none under that key.
    ///
    /// # Errors
    /// This function errors if the remote did not answer (after retrying), answered with a failure or sent something that is not a state document.
    pub async fn get_state(&self, key: &str, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<Option<StateItem>, Error> {
        let path: String = self.state_path(key)?;
        let (code, raw): (StatusCode, String) = self.send(Method::GET, &path, None, &[ StatusCode::NOT_FOUND ], retry, token).await?;
        if code == StatusCode::NOT_FOUND { return Ok(None); }
        self.parse_item(&path, raw).map(Some)
    }

    /// Retrieves the state document with the given key, interpreted as the given type.
    ///
    /// # Returns
    /// The typed state, or `None` if the remote has none under that key.
    ///
    /// # Errors
    /// This function errors for the same reasons as [`ApiClient::get_state()`], or if the document does not have the fields of `T`.
    pub async fn get_state_as<T: DeserializeOwned>(&self, key: &str, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<Option<T>, Error> {
        match self.get_state(key, retry, token).await? {
            Some(item) => match item.to_typed() {
                Ok(state) => Ok(Some(state)),
                Err(err)  => Err(Error::StateParseError{ address: self.address.url(self.state_path(key)?), err }),
            },
            None => Ok(None),
        }
    }

    /// Creates a new state document.
    ///
    /// # Arguments
    /// - `key`: The key of the document.
    /// - `value`: The contents of the document. Must serialize to a JSON object.
    ///
    /// # Returns
    /// The document as stored by the remote.
    ///
    /// # Errors
    /// This function errors if the document already exists (`409 CONFLICT`), or for any of the usual reasons.
    pub async fn create_state<T: Serialize>(&self, key: &str, value: &T, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<StateItem, Error> {
        let path: String = self.state_path(key)?;
        let body: Value = self.to_body(&path, value)?;
        let (_, raw): (StatusCode, String) = self.send(Method::POST, &path, Some(&body), &[], retry, token).await?;
        self.parse_item(&path, raw)
    }

    /// Retrieves the state document with the given key, creating it if it does not exist yet.
    ///
    /// If another writer creates the document between our read and our create, the document of the other writer is returned.
    ///
    /// # Arguments
    /// - `key`: The key of the document.
    /// - `factory`: Produces the contents of the document if we have to create it.
    ///
    /// # Errors
    /// This function errors for any of the usual reasons.
    pub async fn get_or_create_state<T: Serialize>(&self, key: &str, factory: impl FnOnce() -> T, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<StateItem, Error> {
        if let Some(item) = self.get_state(key, retry, token).await? { return Ok(item); }

        match self.create_state(key, &factory(), retry, token).await {
            Ok(item) => Ok(item),
            Err(err) if err.status() == Some(StatusCode::CONFLICT) => {
                debug!("State document '{}' was created concurrently; reading it instead", key);
                match self.get_state(key, retry, token).await? {
                    Some(item) => Ok(item),
                    None       => Err(Error::StateVanished{ address: self.address.to_string(), key: key.into() }),
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Replaces the contents of an existing state document.
    ///
    /// # Errors
    /// This function errors if the document does not exist (`404 NOT FOUND`), or for any of the usual reasons.
    pub async fn update_state<T: Serialize>(&self, key: &str, value: &T, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<StateItem, Error> {
        let path: String = self.state_path(key)?;
        let body: Value = self.to_body(&path, value)?;
        let (_, raw): (StatusCode, String) = self.send(Method::PUT, &path, Some(&body), &[], retry, token).await?;
        self.parse_item(&path, raw)
    }

    /// Removes a state document. Removing a document that does not exist succeeds.
    ///
    /// # Errors
    /// This function errors for any of the usual reasons.
    pub async fn delete_state(&self, key: &str, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<(), Error> {
        self.send(Method::DELETE, &self.state_path(key)?, None, &[], retry, token).await?;
        Ok(())
    }



    /// Sends instructions to the remote dispatcher.
    ///
    /// Transient failures are retried, so the remote may see the same instruction more than once.
    ///
    /// # Errors
    /// This function errors if the remote refused the instruction (e.g., `409 CONFLICT` for a start without a reset), or for any of the usual reasons.
    pub async fn send_instructions(&self, instructions: &Instructions, retry: Option<&RetryPolicy>, token: &CancellationToken) -> Result<(), Error> {
        let path: &str = "/instructions";
        let body: Value = self.to_body(path, instructions)?;
        self.send(Method::POST, path, Some(&body), &[], retry, token).await?;
        info!("Sent {} instruction to '{}'", instructions.kind, self.address);
        Ok(())
    }



    /// Returns the address of the API this client talks to.
    #[inline]
    pub fn address(&self) -> &Address { &self.address }
}



/// Keeps one [`ApiClient`] per remote identity so repeated calls to the same peer reuse it.
#[derive(Debug)]
pub struct ApiClientManager {
    /// The clients, keyed by their lowercase identifier.
    clients : DashMap<String, Arc<ApiClient>>,
    /// The default retry policy of new clients.
    retry   : RetryPolicy,
}

impl ApiClientManager {
    /// Constructor for an empty ApiClientManager.
    #[inline]
    pub fn new(retry: RetryPolicy) -> Self { Self { clients: DashMap::new(), retry } }

    /// Returns the client for the given identity, creating it if we don't have one yet.
    ///
    /// # Arguments
    /// - `id`: The identity of the remote (case-insensitive).
    /// - `address`: The address of its API. Ignored if we already know the identity.
    ///
    /// # Errors
    /// This function errors if we had to create a client and failed to.
    pub fn get_or_create(&self, id: &str, address: Address) -> Result<Arc<ApiClient>, Error> {
        let key: String = id.to_lowercase();
        if let Some(client) = self.clients.get(&key) { return Ok(client.value().clone()); }

        debug!("Creating API client for '{}' at '{}'", id, address);
        let client: Arc<ApiClient> = Arc::new(ApiClient::with_retry(address, self.retry)?);
        Ok(self.clients.entry(key).or_insert(client).value().clone())
    }

    /// Returns the client for the given identity, if we have one.
    #[inline]
    pub fn get(&self, id: &str) -> Option<Arc<ApiClient>> { self.clients.get(&id.to_lowercase()).map(|c| c.value().clone()) }
}
