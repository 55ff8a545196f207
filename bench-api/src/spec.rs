//  SPEC.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:08:50
//  Last edited:
//    21 Feb 2023, 09:48:37
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines (public) interfaces and structs used in the `bench-api`
//!   crate.
//

use std::fmt::{Display, Formatter, Result as FResult};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use tokio::sync::{mpsc, oneshot};
use warp::http::{HeaderValue, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;

use bench_shr::debug::EnumDebug;
use specifications::instructions::Instructions;

use crate::store::StateStore;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_dispatcher_registration() {
        let context: Context = Context::new();
        assert!(context.dispatcher().is_none());
        assert!(!context.is_online());

        let rx: mpsc::Receiver<InstructionRequest> = context.register_dispatcher(4);
        assert!(context.dispatcher().is_some());
        drop(rx);
        context.unregister_dispatcher();
        assert!(context.dispatcher().is_none());
    }
}





/***** HELPER FUNCTIONS *****/
/// Constructs a response with the given status code and body, setting the content-length header.
pub(crate) fn response(status: StatusCode, body: impl Into<String>) -> Response {
    let body: String = body.into();
    let body_len: usize = body.len();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        "Content-Length",
        HeaderValue::from(body_len),
    );
    response
}

/// Constructs a JSON response with the given status code and (already serialized) body.
pub(crate) fn json_response(status: StatusCode, body: impl Into<String>) -> Response {
    let mut response: Response = response(status, body);
    response.headers_mut().insert(
        "Content-Type",
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Constructs a response with the given status code and no body.
#[inline]
pub(crate) fn empty_response(status: StatusCode) -> Response { response(status, String::new()) }





/***** LIBRARY *****/
/// The answer of a dispatcher to a single instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstructionVerdict {
    /// The instruction was accepted (and, for starts, the workload is running).
    Accepted,
    /// The instruction arrived in an order the dispatcher does not allow (e.g., a start without a reset).
    OutOfOrder{ reason: String },
    /// The instruction carried parameters the dispatcher could not use.
    Invalid{ reason: String },
    /// The dispatcher accepted the instruction but failed to act on it.
    Failed{ reason: String },
}

impl EnumDebug for InstructionVerdict {
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult {
        use InstructionVerdict::*;
        match self {
            Accepted       => write!(f, "Accepted"),
            OutOfOrder{..} => write!(f, "OutOfOrder"),
            Invalid{..}    => write!(f, "Invalid"),
            Failed{..}     => write!(f, "Failed"),
        }
    }
}

impl Display for InstructionVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use InstructionVerdict::*;
        match self {
            Accepted             => write!(f, "accepted"),
            OutOfOrder{ reason } => write!(f, "out of order: {}", reason),
            Invalid{ reason }    => write!(f, "invalid: {}", reason),
            Failed{ reason }     => write!(f, "failed: {}", reason),
        }
    }
}



/// An instruction as it is handed from the API to the in-process dispatcher.
#[derive(Debug)]
pub struct InstructionRequest {
    /// The instruction that was received.
    pub instructions : Instructions,
    /// The channel on which the dispatcher returns its verdict.
    pub reply        : oneshot::Sender<InstructionVerdict>,
}



/// Defines the context for all of the warp paths.
#[derive(Debug, Default)]
pub struct Context {
    /// The state documents hosted by this instance.
    pub store  : StateStore,
    /// Whether the local executor marked itself online.
    online     : AtomicBool,
    /// If an executor listens for instructions, the channel to reach it.
    dispatcher : RwLock<Option<mpsc::Sender<InstructionRequest>>>,
}

impl Context {
    /// Constructor for a Context with an empty store that is offline and has no dispatcher.
    #[inline]
    pub fn new() -> Self { Self::default() }



    /// Returns whether the local executor is online.
    #[inline]
    pub fn is_online(&self) -> bool { self.online.load(Ordering::SeqCst) }

    /// Marks the local executor as on- or offline.
    #[inline]
    pub fn set_online(&self, online: bool) {
        let old: bool = self.online.swap(online, Ordering::SeqCst);
        if old != online { debug!("Marked instance {}", if online { "online" } else { "offline" }); }
    }



    /// Registers a new dispatcher for incoming instructions, replacing any previous one.
    ///
    /// # Arguments
    /// - `capacity`: The number of instructions that may be queued before the API waits for the dispatcher.
    ///
    /// # Returns
    /// The receiving end on which the dispatcher finds incoming instructions.
    pub fn register_dispatcher(&self, capacity: usize) -> mpsc::Receiver<InstructionRequest> {
        let (tx, rx): (mpsc::Sender<InstructionRequest>, mpsc::Receiver<InstructionRequest>) = mpsc::channel(capacity);
        *self.dispatcher.write().unwrap() = Some(tx);
        rx
    }

    /// Removes the current dispatcher, if any. Afterwards, instructions are refused.
    #[inline]
    pub fn unregister_dispatcher(&self) { *self.dispatcher.write().unwrap() = None; }

    /// Returns a handle to the current dispatcher, if any.
    #[inline]
    pub fn dispatcher(&self) -> Option<mpsc::Sender<InstructionRequest>> { self.dispatcher.read().unwrap().clone() }
}
