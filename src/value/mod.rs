//! Dynamic values flowing through intercepted calls
//!
//! Intercepted members receive and return [`Value`]s. Plain data is carried as
//! `serde_json::Value`, receivers are shared [`Object`]s whose fields methods
//! may mutate, and host handles that cannot be copied travel as [`Opaque`].

pub mod snapshot;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub use snapshot::{snapshot_or_null, snapshot_serialize, Snapshot, SnapshotError};

/// Field table of an [`Object`]
pub type Fields = BTreeMap<String, Value>;

/// A dynamically typed argument, return value or field
#[derive(Debug, Clone)]
pub enum Value {
    /// Plain data
    Data(serde_json::Value),
    /// Shared mutable object (receivers, constructed instances)
    Object(Object),
    /// Host handle that cannot be structurally copied
    Opaque(Opaque),
}

impl Value {
    pub fn null() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn data(value: impl Into<serde_json::Value>) -> Self {
        Value::Data(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_data().and_then(serde_json::Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Value::Opaque(opaque)
    }
}

/// Data compares structurally, objects and handles by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Shared, interior-mutable field table.
///
/// Cloning an `Object` clones the handle, not the fields: every clone observes
/// the same state, the way a receiver is shared between a caller and the
/// methods it invokes.
#[derive(Clone, Default)]
pub struct Object {
    fields: Arc<Mutex<Fields>>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self {
            fields: Arc::new(Mutex::new(fields)),
        }
    }

    /// Build an object from plain data fields
    pub fn from_data<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        Self::from_fields(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), Value::Data(value)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.lock().get(key).cloned()
    }

    /// Set a field, returning the previous value
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.fields.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.lock().is_empty()
    }

    /// Run `f` with exclusive access to the fields.
    ///
    /// Do not touch the same object again from inside `f`: the lock is not
    /// reentrant.
    pub fn update<R>(&self, f: impl FnOnce(&mut Fields) -> R) -> R {
        f(&mut self.fields.lock())
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.fields) as *const () as usize
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // try_lock: Debug may run while the fields are held by `update`
        match self.fields.try_lock() {
            Some(fields) => f
                .debug_struct("Object")
                .field("fields", &fields.keys().collect::<Vec<_>>())
                .finish(),
            None => f.debug_struct("Object").field("fields", &"<locked>").finish(),
        }
    }
}

/// A host handle carried through calls untouched.
///
/// Snapshots of an `Opaque` always fail: the recorder stores a null in its
/// place.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Opaque").field(&self.type_name).finish()
    }
}
