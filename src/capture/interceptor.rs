use std::sync::Arc;

use crate::capture::executor::{self, Completion, CompletionHandler, Outcome};
use crate::capture::unit::{Callable, Callback, Deferred};
use crate::fixture::record::FixtureOutput;
use crate::fixture::recorder::FixtureRecorder;
use crate::value::{snapshot_or_null, Object, Value};

/// Wraps members so every call is also written to a fixture recorder.
///
/// The wrapper keeps the member's calling style and hands the caller exactly
/// what the member produced.
#[derive(Clone)]
pub struct Interceptor {
    recorder: Arc<FixtureRecorder>,
    member: Arc<str>,
    is_constructor: bool,
}

impl Interceptor {
    pub fn new(recorder: Arc<FixtureRecorder>, member: &str, is_constructor: bool) -> Self {
        Self {
            recorder,
            member: Arc::from(member),
            is_constructor,
        }
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn wrap(&self, original: Callable) -> Callable {
        let tap = self.clone();
        match original {
            Callable::Sync(f) => Callable::Sync(Arc::new(
                move |receiver: &Object, args: Vec<Value>| {
                    let completion = Completion::new(tap.begin(receiver, &args).into_handler());
                    executor::run_sync(&f, receiver, args, tap.is_constructor, &completion)
                },
            )),
            Callable::Callback(f) => Callable::Callback(Arc::new(
                move |receiver: &Object, args: Vec<Value>, callback: Callback| {
                    let completion = Completion::new(tap.begin(receiver, &args).into_handler());
                    executor::run_callback(&f, receiver, args, callback, completion)
                },
            )),
            Callable::Deferred(f) => Callable::Deferred(Arc::new(
                move |receiver: &Object, args: Vec<Value>| -> Deferred {
                    let completion = Completion::new(tap.begin(receiver, &args).into_handler());
                    executor::run_deferred(&f, receiver, args, completion)
                },
            )),
        }
    }

    /// Freeze the inputs before the member gets a chance to mutate them
    fn begin(&self, receiver: &Object, args: &[Value]) -> PendingInvocation {
        PendingInvocation {
            recorder: Arc::clone(&self.recorder),
            member: Arc::clone(&self.member),
            is_constructor: self.is_constructor,
            receiver: snapshot_or_null(receiver),
            payload: args.iter().map(snapshot_or_null).collect(),
        }
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("member", &self.member)
            .field("is_constructor", &self.is_constructor)
            .finish()
    }
}

/// Inputs of an in-flight call, waiting for its outcome
pub struct PendingInvocation {
    recorder: Arc<FixtureRecorder>,
    member: Arc<str>,
    is_constructor: bool,
    receiver: serde_json::Value,
    payload: Vec<serde_json::Value>,
}

impl PendingInvocation {
    pub fn finish(self, outcome: Outcome<'_>) {
        let output = match outcome {
            Outcome::Success(values) => FixtureOutput::Output(success_snapshot(values)),
            Outcome::Error(err) => FixtureOutput::Error(snapshot_or_null(err)),
        };
        self.recorder.log(
            &self.member,
            self.is_constructor,
            self.receiver,
            self.payload,
            output,
        );
    }

    fn into_handler(self) -> CompletionHandler {
        Box::new(move |outcome: Outcome<'_>| self.finish(outcome))
    }
}

/// One value is recorded bare, none as null, several as an array
fn success_snapshot(values: &[Value]) -> serde_json::Value {
    match values {
        [] => serde_json::Value::Null,
        [single] => snapshot_or_null(single),
        many => serde_json::Value::Array(many.iter().map(snapshot_or_null).collect()),
    }
}
