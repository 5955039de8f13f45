//! Fluent pipeline builder.

use super::{ContextPolicy, Pipeline, PipelineConfig, StageRegistry};
use crate::errors::{PipelineError, PipelineValidationError};
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::{Producer, Stage};
use std::sync::Arc;

/// Builder that collects stages and settings, then constructs a [`Pipeline`].
///
/// Stage registration is validated immediately; configuration is validated
/// and the initial stages are run by [`build`](Self::build).
pub struct PipelineBuilder {
    registry: StageRegistry,
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: StageRegistry::new(),
            config: PipelineConfig::default(),
            sink: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Adds a context stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, taken, or reserved.
    pub fn stage(
        mut self,
        name: impl Into<String>,
        stage: Arc<dyn Stage>,
    ) -> Result<Self, PipelineValidationError> {
        self.registry = self.registry.stage(name, stage)?;
        Ok(self)
    }

    /// Adds the reserved `classifier` producer.
    ///
    /// # Errors
    ///
    /// Returns an error if a classifier is already registered.
    pub fn classifier(mut self, producer: Arc<dyn Producer>) -> Result<Self, PipelineValidationError> {
        self.registry = self.registry.classifier(producer)?;
        Ok(self)
    }

    /// Replaces the initial steps.
    #[must_use]
    pub fn initial_steps(mut self, steps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config = self.config.with_initial_steps(steps);
        self
    }

    /// Adds a step that must be registered.
    #[must_use]
    pub fn require_step(mut self, step: impl Into<String>) -> Self {
        self.config = self.config.with_required_step(step);
        self
    }

    /// Sets the context policy.
    #[must_use]
    pub fn context_policy(mut self, policy: ContextPolicy) -> Self {
        self.config = self.config.with_context_policy(policy);
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.registry.len()
    }

    /// Builds the pipeline, running its initial stages.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial stage fails.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        Pipeline::with_sink(self.registry, self.config, self.sink)
    }
}
