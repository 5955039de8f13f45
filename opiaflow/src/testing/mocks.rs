//! Recording stages for testing.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::context::{Context, ContextValue};
use crate::errors::StageError;
use crate::stages::{Producer, Stage};

/// A shared, ordered log of stage invocations.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, label: impl Into<String>) {
        self.calls.lock().push(label.into());
    }

    /// Returns all calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns how many times `label` was called.
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == label).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// A stage that logs each call, checks required keys, and writes fixed data.
///
/// The call is logged before required keys are checked, so a failing
/// lookup still shows up as an invocation.
pub struct RecordingStage {
    label: String,
    log: CallLog,
    requires: Vec<String>,
    writes: Vec<(String, serde_json::Value)>,
    observed: Mutex<Vec<Vec<String>>>,
}

impl RecordingStage {
    /// Creates a recording stage.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            requires: Vec::new(),
            writes: Vec::new(),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Requires a key to be present when the stage runs.
    #[must_use]
    pub fn requiring(mut self, key: impl Into<String>) -> Self {
        self.requires.push(key.into());
        self
    }

    /// Writes a key on every call.
    #[must_use]
    pub fn writing(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.writes.push((key.into(), value));
        self
    }

    /// Returns the context keys seen at each call.
    #[must_use]
    pub fn observed_keys(&self) -> Vec<Vec<String>> {
        self.observed.lock().clone()
    }
}

// Only configuration is shown, so audit strings stay stable across runs.
impl fmt::Debug for RecordingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingStage")
            .field("label", &self.label)
            .field("requires", &self.requires)
            .field("writes", &self.writes)
            .finish()
    }
}

impl Stage for RecordingStage {
    fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
        self.log.record(&self.label);
        self.observed.lock().push(ctx.keys());

        for key in &self.requires {
            ctx.require(key)?;
        }
        for (key, value) in &self.writes {
            ctx.insert_data(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// A producer that logs each call and returns a fixed value.
pub struct RecordingProducer {
    label: String,
    log: CallLog,
    value: ContextValue,
}

impl RecordingProducer {
    /// Creates a recording producer.
    #[must_use]
    pub fn new(label: impl Into<String>, log: &CallLog, value: ContextValue) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            value,
        }
    }
}

impl fmt::Debug for RecordingProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingProducer")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Producer for RecordingProducer {
    fn build(&self) -> Result<ContextValue, StageError> {
        self.log.record(&self.label);
        Ok(self.value.clone())
    }
}

/// A stage that always fails.
#[derive(Debug, Clone)]
pub struct FailingStage {
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl Stage for FailingStage {
    fn apply(&self, _ctx: &mut Context) -> Result<(), StageError> {
        Err(StageError::failed(&self.error))
    }
}
