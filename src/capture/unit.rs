//! Callable units: the registration manifest instrumentation works on.
//!
//! A [`Unit`] lists its static members and instance members by name. Each
//! member is a [`Callable`] tagged with its calling style, so nothing has to
//! be guessed from argument or return shapes at call time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::capture::error::CallError;
use crate::value::{Object, Value};

/// Name of the instance member that constructs new instances
pub const CONSTRUCTOR: &str = "constructor";

/// Continuation handed to callback-style members
pub type Callback = Box<dyn FnOnce(Result<Vec<Value>, CallError>) + Send>;

/// Eventual result of a deferred-style member
pub type Deferred = BoxFuture<'static, Result<Value, CallError>>;

pub type SyncFn = Arc<dyn Fn(&Object, Vec<Value>) -> Result<Value, CallError> + Send + Sync>;
pub type CallbackFn =
    Arc<dyn Fn(&Object, Vec<Value>, Callback) -> Result<(), CallError> + Send + Sync>;
pub type DeferredFn = Arc<dyn Fn(&Object, Vec<Value>) -> Deferred + Send + Sync>;

/// Calling convention of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStyle {
    /// Returns (or fails) before the call returns
    Sync,
    /// Reports through a trailing continuation
    Callback,
    /// Returns a future that settles later
    Deferred,
}

impl CallStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStyle::Sync => "sync",
            CallStyle::Callback => "callback",
            CallStyle::Deferred => "deferred",
        }
    }
}

impl fmt::Display for CallStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member implementation together with its calling style
#[derive(Clone)]
pub enum Callable {
    Sync(SyncFn),
    Callback(CallbackFn),
    Deferred(DeferredFn),
}

impl Callable {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Object, Vec<Value>) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Callable::Sync(Arc::new(f))
    }

    /// Wrap a continuation-style member.
    ///
    /// Do not invoke the continuation from inside [`Object::update`] with
    /// that same object among the results: recording snapshots the results,
    /// which locks the object again and deadlocks.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Object, Vec<Value>, Callback) -> Result<(), CallError> + Send + Sync + 'static,
    {
        Callable::Callback(Arc::new(f))
    }

    /// Wrap an async member. The future must own what it needs from the
    /// receiver (clone the `Object` handle into it).
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(&Object, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        Callable::Deferred(Arc::new(
            move |receiver: &Object, args: Vec<Value>| -> Deferred { f(receiver, args).boxed() },
        ))
    }

    pub fn style(&self) -> CallStyle {
        match self {
            Callable::Sync(_) => CallStyle::Sync,
            Callable::Callback(_) => CallStyle::Callback,
            Callable::Deferred(_) => CallStyle::Deferred,
        }
    }

    /// Call a sync member
    pub fn call(&self, receiver: &Object, args: Vec<Value>) -> Result<Value, CallError> {
        match self {
            Callable::Sync(f) => f(receiver, args),
            other => Err(style_mismatch(CallStyle::Sync, other.style())),
        }
    }

    /// Call a callback-style member; `callback` receives the result
    pub fn call_with_callback(
        &self,
        receiver: &Object,
        args: Vec<Value>,
        callback: Callback,
    ) -> Result<(), CallError> {
        match self {
            Callable::Callback(f) => f(receiver, args, callback),
            other => Err(style_mismatch(CallStyle::Callback, other.style())),
        }
    }

    /// Call a deferred member, returning its pending result
    pub fn call_deferred(&self, receiver: &Object, args: Vec<Value>) -> Result<Deferred, CallError> {
        match self {
            Callable::Deferred(f) => Ok(f(receiver, args)),
            other => Err(style_mismatch(CallStyle::Deferred, other.style())),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable::{:?}", self.style())
    }
}

pub(crate) fn style_mismatch(expected: CallStyle, actual: CallStyle) -> CallError {
    CallError::type_error(format!(
        "member is {actual}-style but was called as {expected}-style"
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Static,
    Instance,
}

/// Capability interface over anything whose members can be intercepted
pub trait CallableUnit {
    fn unit_name(&self) -> &str;

    /// Receiver for static members and construction
    fn static_receiver(&self) -> &Object;

    fn list_static_members(&self) -> Vec<String>;

    fn list_instance_members(&self) -> Vec<String>;

    fn member(&self, kind: MemberKind, name: &str) -> Option<Callable>;

    /// Swap a member's implementation. Returns false when no member of that
    /// name exists.
    fn replace_member(&mut self, kind: MemberKind, name: &str, callable: Callable) -> bool;
}

/// Manifest of a class-like unit: statics, instance methods, constructor.
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    statics: Object,
    static_members: Vec<(String, Callable)>,
    instance_members: Vec<(String, Callable)>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let statics = Object::new();
        statics.set("name", Value::data(name.clone()));
        Self {
            name,
            statics,
            static_members: Vec::new(),
            instance_members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static state shared by all static members
    pub fn statics(&self) -> &Object {
        &self.statics
    }

    pub fn with_static(mut self, name: impl Into<String>, callable: Callable) -> Self {
        upsert(&mut self.static_members, name.into(), callable);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, callable: Callable) -> Self {
        upsert(&mut self.instance_members, name.into(), callable);
        self
    }

    /// Register the construction entry point. It receives the constructor
    /// arguments and returns the new instance.
    pub fn with_constructor<F>(self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Object, CallError> + Send + Sync + 'static,
    {
        self.with_method(
            CONSTRUCTOR,
            Callable::sync(move |_, args| f(args).map(Value::Object)),
        )
    }

    pub fn static_member(&self, name: &str) -> Result<&Callable, CallError> {
        lookup(&self.static_members, name)
            .ok_or_else(|| CallError::type_error(format!("{}.{name} is not a function", self.name)))
    }

    pub fn method(&self, name: &str) -> Result<&Callable, CallError> {
        lookup(&self.instance_members, name).ok_or_else(|| {
            CallError::type_error(format!("{}#{name} is not a function", self.name))
        })
    }

    /// Build a new instance through the constructor member
    pub fn construct(&self, args: Vec<Value>) -> Result<Object, CallError> {
        match self.method(CONSTRUCTOR)?.call(&self.statics, args)? {
            Value::Object(instance) => Ok(instance),
            _ => Err(CallError::type_error(format!(
                "constructor of {} did not return an object",
                self.name
            ))),
        }
    }

    /// Call a sync static member
    pub fn call_static(&self, name: &str, args: Vec<Value>) -> Result<Value, CallError> {
        self.static_member(name)?.call(&self.statics, args)
    }

    /// Call a sync instance member on `instance`
    pub fn call(&self, instance: &Object, name: &str, args: Vec<Value>) -> Result<Value, CallError> {
        self.method(name)?.call(instance, args)
    }
}

impl CallableUnit for Unit {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn static_receiver(&self) -> &Object {
        &self.statics
    }

    fn list_static_members(&self) -> Vec<String> {
        self.static_members.iter().map(|(n, _)| n.clone()).collect()
    }

    fn list_instance_members(&self) -> Vec<String> {
        self.instance_members.iter().map(|(n, _)| n.clone()).collect()
    }

    fn member(&self, kind: MemberKind, name: &str) -> Option<Callable> {
        let table = match kind {
            MemberKind::Static => &self.static_members,
            MemberKind::Instance => &self.instance_members,
        };
        lookup(table, name).cloned()
    }

    fn replace_member(&mut self, kind: MemberKind, name: &str, callable: Callable) -> bool {
        let table = match kind {
            MemberKind::Static => &mut self.static_members,
            MemberKind::Instance => &mut self.instance_members,
        };
        match table.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = callable;
                true
            }
            None => false,
        }
    }
}

fn lookup<'a>(table: &'a [(String, Callable)], name: &str) -> Option<&'a Callable> {
    table.iter().find(|(n, _)| n == name).map(|(_, c)| c)
}

fn upsert(table: &mut Vec<(String, Callable)>, name: String, callable: Callable) {
    match table.iter_mut().find(|(n, _)| *n == name) {
        Some((_, slot)) => *slot = callable,
        None => table.push((name, callable)),
    }
}

/// What a module loader hands back for a source path
#[derive(Debug, Clone)]
pub enum Export {
    Unit(Unit),
    Value(Value),
}

impl Export {
    pub fn as_unit(&self) -> Option<&Unit> {
        match self {
            Export::Unit(unit) => Some(unit),
            Export::Value(_) => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match self {
            Export::Unit(unit) => Some(unit),
            Export::Value(_) => None,
        }
    }

    pub fn into_unit(self) -> Option<Unit> {
        match self {
            Export::Unit(unit) => Some(unit),
            Export::Value(_) => None,
        }
    }
}

impl From<Unit> for Export {
    fn from(unit: Unit) -> Self {
        Export::Unit(unit)
    }
}
