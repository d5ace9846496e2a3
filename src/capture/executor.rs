//! Invocation normalizer.
//!
//! Runs a member in its own calling style and reduces whatever it does
//! (return, fail, call its continuation, settle its future) to exactly one
//! completion event, while the caller gets back exactly what the member
//! produced.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::capture::error::CallError;
use crate::capture::unit::{
    style_mismatch, Callable, Callback, CallbackFn, CallStyle, Deferred, DeferredFn, SyncFn,
};
use crate::value::{Object, Value};

/// Settled result as seen by a completion handler
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// Success payload: the return value, or the continuation's values
    Success(&'a [Value]),
    Error(&'a CallError),
}

pub type CompletionHandler = Box<dyn for<'a> FnOnce(Outcome<'a>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Pending,
    Succeeded,
    Failed,
}

struct CompletionInner {
    state: CompletionState,
    handler: Option<CompletionHandler>,
}

/// One-shot completion signal for a single invocation.
///
/// The first settlement wins and runs the handler; later ones are ignored.
pub struct Completion {
    inner: Mutex<CompletionInner>,
}

impl Completion {
    pub fn new(handler: CompletionHandler) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(CompletionInner {
                state: CompletionState::Pending,
                handler: Some(handler),
            }),
        })
    }

    pub fn state(&self) -> CompletionState {
        self.inner.lock().state
    }

    pub fn is_settled(&self) -> bool {
        self.state() != CompletionState::Pending
    }

    pub fn succeed(&self, payload: &[Value]) -> bool {
        self.settle(Outcome::Success(payload))
    }

    pub fn fail(&self, error: &CallError) -> bool {
        self.settle(Outcome::Error(error))
    }

    fn settle(&self, outcome: Outcome<'_>) -> bool {
        let handler = {
            let mut inner = self.inner.lock();
            if inner.state != CompletionState::Pending {
                tracing::debug!(state = ?inner.state, "ignoring repeated settlement");
                return false;
            }
            inner.state = match outcome {
                Outcome::Success(_) => CompletionState::Succeeded,
                Outcome::Error(_) => CompletionState::Failed,
            };
            inner.handler.take()
        };
        // Handler runs outside the lock so it may inspect `state()`.
        if let Some(handler) = handler {
            handler(outcome);
        }
        true
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("state", &self.state())
            .finish()
    }
}

/// What the caller of [`execute`] gets back
pub enum Returned {
    /// Sync result or constructed instance
    Value(Value),
    /// Callback style: the result travels through the continuation
    Continued,
    /// Deferred style: settles to the member's own result
    Deferred(Deferred),
}

impl Returned {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Returned::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_deferred(self) -> Option<Deferred> {
        match self {
            Returned::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returned::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Returned::Continued => f.write_str("Continued"),
            Returned::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Invoke `callable` and report its completion to `handler` exactly once.
///
/// Construction takes priority over the member's style; otherwise the style
/// decides. `continuation` must be present for callback-style members and
/// absent for the others; a mismatch fails the call with a `TypeError`, which
/// is also reported to the handler.
pub fn execute(
    callable: &Callable,
    receiver: &Object,
    args: Vec<Value>,
    continuation: Option<Callback>,
    is_constructor: bool,
    handler: CompletionHandler,
) -> Result<Returned, CallError> {
    let completion = Completion::new(handler);

    if is_constructor {
        return match (callable, continuation) {
            (Callable::Sync(f), None) => {
                run_sync(f, receiver, args, true, &completion).map(Returned::Value)
            }
            _ => reject(
                &completion,
                CallError::type_error("constructors must be synchronous"),
            ),
        };
    }

    match (callable, continuation) {
        (Callable::Callback(f), Some(callback)) => {
            run_callback(f, receiver, args, callback, completion).map(|()| Returned::Continued)
        }
        (Callable::Callback(_), None) => reject(
            &completion,
            CallError::type_error("callback-style member called without a callback"),
        ),
        (Callable::Deferred(f), None) => Ok(Returned::Deferred(run_deferred(
            f, receiver, args, completion,
        ))),
        (Callable::Sync(f), None) => {
            run_sync(f, receiver, args, false, &completion).map(Returned::Value)
        }
        (other, Some(_)) => reject(
            &completion,
            style_mismatch(CallStyle::Callback, other.style()),
        ),
    }
}

fn reject(completion: &Completion, error: CallError) -> Result<Returned, CallError> {
    completion.fail(&error);
    Err(error)
}

/// Run a sync member (or a constructor); the result settles the completion
/// and is handed back untouched.
pub fn run_sync(
    f: &SyncFn,
    receiver: &Object,
    args: Vec<Value>,
    is_constructor: bool,
    completion: &Completion,
) -> Result<Value, CallError> {
    if is_constructor {
        tracing::trace!(args = args.len(), "constructing instance");
    }
    match f(receiver, args) {
        Ok(value) => {
            completion.succeed(std::slice::from_ref(&value));
            Ok(value)
        }
        Err(err) => {
            completion.fail(&err);
            Err(err)
        }
    }
}

/// Run a callback-style member with its continuation wrapped.
///
/// The wrapper settles the completion from the result and then forwards the
/// unchanged result to `callback`. A synchronous failure settles the
/// completion too, unless the continuation already did.
pub fn run_callback(
    f: &CallbackFn,
    receiver: &Object,
    args: Vec<Value>,
    callback: Callback,
    completion: Arc<Completion>,
) -> Result<(), CallError> {
    let settle = Arc::clone(&completion);
    let wrapped: Callback = Box::new(move |result| {
        match &result {
            Ok(values) => settle.succeed(values),
            Err(err) => settle.fail(err),
        };
        callback(result);
    });

    match f(receiver, args, wrapped) {
        Ok(()) => Ok(()),
        Err(err) => {
            completion.fail(&err);
            Err(err)
        }
    }
}

/// Run a deferred member. The returned future resolves to the member's own
/// result and settles the completion when it does.
///
/// Futures are lazy: a result that is dropped before it settles never
/// completes, and nothing is reported.
pub fn run_deferred(
    f: &DeferredFn,
    receiver: &Object,
    args: Vec<Value>,
    completion: Arc<Completion>,
) -> Deferred {
    let pending = f(receiver, args);
    async move {
        let result = pending.await;
        match &result {
            Ok(value) => completion.succeed(std::slice::from_ref(value)),
            Err(err) => completion.fail(err),
        };
        result
    }
    .boxed()
}
