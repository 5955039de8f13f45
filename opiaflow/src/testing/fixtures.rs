//! Test fixtures for pipeline testing.

use std::sync::Arc;

use crate::context::{Context, ContextValue};
use crate::errors::PipelineError;
use crate::events::CollectingEventSink;
use crate::pipeline::{Pipeline, PipelineConfig, StageRegistry};

/// A test context builder.
#[derive(Debug, Default)]
pub struct TestContext {
    context: Context,
}

impl TestContext {
    /// Creates a new test context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds data to the context.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert_data(key, value);
        self
    }

    /// Adds a value to the context.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: ContextValue) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> Context {
        self.context
    }
}

/// A pipeline wired to a collecting event sink.
pub struct TestPipeline {
    /// The pipeline under test.
    pub pipeline: Pipeline,
    /// Events emitted by the pipeline.
    pub events: Arc<CollectingEventSink>,
}

impl TestPipeline {
    /// Builds a pipeline with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if construction fails.
    pub fn new(registry: StageRegistry) -> Result<Self, PipelineError> {
        Self::with_config(registry, PipelineConfig::default())
    }

    /// Builds a pipeline with a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if construction fails.
    pub fn with_config(registry: StageRegistry, config: PipelineConfig) -> Result<Self, PipelineError> {
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = Pipeline::with_sink(registry, config, events.clone())?;
        Ok(Self { pipeline, events })
    }

    /// Returns the stages started so far, in order.
    #[must_use]
    pub fn started_stages(&self) -> Vec<String> {
        self.events.stages_for(crate::events::STAGE_STARTED)
    }
}
