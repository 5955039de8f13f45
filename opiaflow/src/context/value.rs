//! Tagged values stored in the pipeline context.

use crate::errors::ContextError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value held in the pipeline [`Context`](super::Context).
///
/// Plain data (filenames, timestamps, statistics tables, audit strings) is
/// stored as JSON. Anything else, such as image arrays or a trained
/// classifier, is stored as a shared opaque handle and read back by type.
#[derive(Clone)]
pub enum ContextValue {
    /// Structured data.
    Data(serde_json::Value),
    /// An opaque typed payload.
    Handle(Arc<dyn Any + Send + Sync>),
}

impl ContextValue {
    /// Creates a data value.
    pub fn data(value: impl Into<serde_json::Value>) -> Self {
        Self::Data(value.into())
    }

    /// Wraps a payload in a new handle.
    pub fn handle<T: Any + Send + Sync>(value: T) -> Self {
        Self::Handle(Arc::new(value))
    }

    /// Wraps an already shared payload.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Handle(value)
    }

    /// Returns the kind of value as a short label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Handle(_) => "handle",
        }
    }

    /// Returns the JSON data, if this is a data value.
    #[must_use]
    pub const fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Handle(_) => None,
        }
    }

    /// Returns the string, if this is a JSON string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    /// Borrows the payload as `T`, if this is a handle of that type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Handle(handle) => handle.downcast_ref::<T>(),
            Self::Data(_) => None,
        }
    }

    /// Returns a shared pointer to the payload, if this is a handle of type `T`.
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Handle(handle) => Arc::clone(handle).downcast::<T>().ok(),
            Self::Data(_) => None,
        }
    }

    /// Returns the JSON data or a type mismatch error naming `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] for handles.
    pub fn expect_data(&self, key: &str) -> Result<&serde_json::Value, ContextError> {
        self.as_data()
            .ok_or_else(|| ContextError::mismatch(key, "data", self.kind()))
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Data(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Data(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Data(serde_json::Value::String(value))
    }
}
