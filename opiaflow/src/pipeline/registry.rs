//! Ordered registry of named stages.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::{Producer, Stage, StageHandler};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the reserved zero-argument stage.
pub const CLASSIFIER_STAGE: &str = "classifier";

/// An ordered mapping from stage name to stage.
///
/// Insertion order is execution order. Names are unique, so at most one
/// `classifier` entry can exist. The registry is built up front and handed
/// to the pipeline, which only reads it.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    /// The registered handlers.
    stages: HashMap<String, StageHandler>,
    /// Insertion order for stages.
    stage_order: Vec<String>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(name, handler)` pairs, in order.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid or duplicate entry.
    pub fn from_entries<I, N>(entries: I) -> Result<Self, PipelineValidationError>
    where
        I: IntoIterator<Item = (N, StageHandler)>,
        N: Into<String>,
    {
        let mut registry = Self::new();
        for (name, handler) in entries {
            registry.register(name, handler)?;
        }
        Ok(registry)
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
        self.register(name, StageHandler::Transform(stage))?;
        Ok(self)
    }

    /// Adds the reserved `classifier` producer.
    ///
    /// # Errors
    ///
    /// Returns an error if a classifier is already registered.
    pub fn classifier(mut self, producer: Arc<dyn Producer>) -> Result<Self, PipelineValidationError> {
        self.register(CLASSIFIER_STAGE, StageHandler::Producer(producer))?;
        Ok(self)
    }

    /// Registers a handler under a name.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: StageHandler,
    ) -> Result<(), PipelineValidationError> {
        let name = name.into();

        if !is_valid_name(&name) {
            return Err(invalid(
                format!("Invalid stage name '{}'", name.escape_debug()),
                &name,
                "REGISTRY-INVALID-NAME",
            ));
        }

        if self.stages.contains_key(&name) {
            return Err(invalid(
                format!("Duplicate stage name '{name}'"),
                &name,
                "REGISTRY-DUPLICATE",
            ));
        }

        match (&handler, name == CLASSIFIER_STAGE) {
            (StageHandler::Producer(_), false) => {
                return Err(invalid(
                    format!("Stage '{name}' is a producer; only '{CLASSIFIER_STAGE}' may be one"),
                    &name,
                    "REGISTRY-PRODUCER-NAME",
                ));
            }
            (StageHandler::Transform(_), true) => {
                return Err(invalid(
                    format!("Stage '{CLASSIFIER_STAGE}' must be a producer"),
                    &name,
                    "REGISTRY-CLASSIFIER-KIND",
                ));
            }
            _ => {}
        }

        self.stage_order.push(name.clone());
        self.stages.insert(name, handler);
        Ok(())
    }

    /// Gets a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageHandler> {
        self.stages.get(name)
    }

    /// Checks if a stage is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.stage_order
    }

    /// Iterates over `(name, handler)` in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageHandler)> {
        self.stage_order
            .iter()
            .filter_map(|name| self.stages.get(name).map(|handler| (name.as_str(), handler)))
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stage_order.len()
    }

    /// Returns true if no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stage_order.is_empty()
    }
}

/// Stage and step names are non-empty and free of whitespace and control characters.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn invalid(message: String, name: &str, code: &str) -> PipelineValidationError {
    PipelineValidationError::new(message.clone())
        .with_stages(vec![name.to_string()])
        .with_error_info(
            ContractErrorInfo::new(code, message)
                .with_context_entry("stage", name)
                .with_default_hint(),
        )
}
