//! The ordered working context threaded through pipeline stages.

use super::ContextValue;
use crate::errors::ContextError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// An ordered, string-keyed map shared by every stage of a pipeline.
///
/// Keys keep the position of their first insertion; overwriting a key
/// replaces the value in place. The engine enforces no schema: each stage
/// documents the keys it requires and the keys it adds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: HashMap<String, ContextValue>,
    order: Vec<String>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Option<ContextValue> {
        let key = key.into();
        let previous = self.values.insert(key.clone(), value.into());
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Inserts a JSON value.
    pub fn insert_data(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Option<ContextValue> {
        self.insert(key, ContextValue::Data(value.into()))
    }

    /// Inserts an opaque payload as a handle.
    pub fn insert_handle<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> Option<ContextValue> {
        self.insert(key, ContextValue::handle(value))
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Gets a value that a stage requires.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::MissingKey`] if the key is absent.
    pub fn require(&self, key: &str) -> Result<&ContextValue, ContextError> {
        self.values.get(key).ok_or_else(|| ContextError::missing(key))
    }

    /// Gets required JSON data.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or holds a handle.
    pub fn require_data(&self, key: &str) -> Result<&serde_json::Value, ContextError> {
        self.require(key)?.expect_data(key)
    }

    /// Gets a required string.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or is not a JSON string.
    pub fn require_str(&self, key: &str) -> Result<&str, ContextError> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| {
            let found = match value {
                ContextValue::Data(_) => "non-string data",
                ContextValue::Handle(_) => "handle",
            };
            ContextError::mismatch(key, "string", found)
        })
    }

    /// Gets a required handle of type `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or holds another type.
    pub fn require_handle<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, ContextError> {
        let value = self.require(key)?;
        value
            .downcast_arc::<T>()
            .ok_or_else(|| ContextError::mismatch(key, std::any::type_name::<T>(), value.kind()))
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.order
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (key.as_str(), value)))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
