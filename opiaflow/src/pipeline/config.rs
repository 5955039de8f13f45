//! Pipeline configuration.

use super::registry::{is_valid_name, StageRegistry, CLASSIFIER_STAGE};
use crate::errors::{ContractErrorInfo, PipelineError, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What happens to the context between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Keys from one run stay visible in the next unless overwritten.
    #[default]
    CarryOver,
    /// Each run starts from the context as it was right after initialization.
    ResetPerRun,
}

/// Configuration for a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stage names run once at construction instead of on every run.
    #[serde(default = "default_initial_steps")]
    pub initial_steps: BTreeSet<String>,
    /// Stage names that must be present in the registry.
    #[serde(default)]
    pub required_steps: Vec<String>,
    /// Context handling between runs.
    #[serde(default)]
    pub context_policy: ContextPolicy,
}

fn default_initial_steps() -> BTreeSet<String> {
    ["initial", CLASSIFIER_STAGE]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_steps: default_initial_steps(),
            required_steps: Vec::new(),
            context_policy: ContextPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replaces the initial steps.
    #[must_use]
    pub fn with_initial_steps(mut self, steps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.initial_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a required step.
    #[must_use]
    pub fn with_required_step(mut self, step: impl Into<String>) -> Self {
        self.required_steps.push(step.into());
        self
    }

    /// Sets the context policy.
    #[must_use]
    pub const fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    /// Returns true if the named stage runs at construction.
    #[must_use]
    pub fn is_initial(&self, name: &str) -> bool {
        self.initial_steps.contains(name)
    }

    /// Checks the configuration against a registry.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed initial step names, missing required
    /// steps, or a classifier outside the initial set.
    pub fn validate(&self, registry: &StageRegistry) -> Result<(), PipelineValidationError> {
        if let Some(bad) = self.initial_steps.iter().find(|name| !is_valid_name(name)) {
            let message = format!("Invalid initial step name '{}'", bad.escape_debug());
            return Err(PipelineValidationError::new(message.clone())
                .with_stages(vec![bad.clone()])
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-INVALID-INITIAL", message).with_default_hint(),
                ));
        }

        let missing: Vec<String> = self
            .required_steps
            .iter()
            .filter(|name| !registry.contains(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let message = format!("Required stages missing from registry: {}", missing.join(", "));
            return Err(PipelineValidationError::new(message.clone())
                .with_stages(missing)
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-MISSING-STEP", message).with_default_hint(),
                ));
        }

        if registry.contains(CLASSIFIER_STAGE) && !self.is_initial(CLASSIFIER_STAGE) {
            let message = format!("Stage '{CLASSIFIER_STAGE}' is registered but not an initial step");
            return Err(PipelineValidationError::new(message.clone())
                .with_stages(vec![CLASSIFIER_STAGE.to_string()])
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-CLASSIFIER-PHASE", message).with_default_hint(),
                ));
        }

        Ok(())
    }
}
