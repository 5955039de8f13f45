//! Error types for the opiaflow pipeline engine.
//!
//! Errors fall into three groups:
//! - configuration errors, raised while a pipeline is being constructed
//! - stage failures, raised by a stage's `apply` or `build`
//! - output contract violations, raised when a run finishes without `stats`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipeline construction and execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline configuration is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage failed while the pipeline was executing it.
    #[error("Stage '{stage}' failed during {phase} phase: {source}")]
    Stage {
        /// The registry name of the failing stage.
        stage: String,
        /// The phase the stage was running in.
        phase: Phase,
        /// The error returned by the stage.
        #[source]
        source: StageError,
    },

    /// All run-phase stages completed but the output key is missing.
    #[error("{0}")]
    OutputContract(#[from] OutputContractError),

    /// A configuration document could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl PipelineError {
    /// Wraps a stage error with the stage name and phase.
    #[must_use]
    pub fn stage(stage: impl Into<String>, phase: Phase, source: StageError) -> Self {
        Self::Stage {
            stage: stage.into(),
            phase,
            source,
        }
    }

    /// Returns the name of the failing stage, if this is a stage failure.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the contract error code, if one is attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Validation(err) => err.error_info.as_ref().map(|info| info.code.as_str()),
            Self::OutputContract(err) => Some(err.error_info.code.as_str()),
            _ => None,
        }
    }
}

/// Execution phase of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// One-time initialization at construction.
    Initial,
    /// Per-invocation execution inside `run`.
    Run,
}

impl Phase {
    /// Returns the lowercase name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Run => "run",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a stage implementation.
#[derive(Debug, Error)]
pub enum StageError {
    /// A required context entry was absent or had the wrong type.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The stage failed with a message.
    #[error("{0}")]
    Failed(String),

    /// Any other error raised inside the stage.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    /// Creates a failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns the missing key if this error is a context lookup failure.
    #[must_use]
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            Self::Context(ContextError::MissingKey { key }) => Some(key),
            _ => None,
        }
    }
}

/// Error raised by typed context lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The key is not present in the context.
    #[error("Missing context key '{key}'")]
    MissingKey {
        /// The requested key.
        key: String,
    },

    /// The key is present but holds a value of another kind.
    #[error("Context key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        /// The requested key.
        key: String,
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind actually stored.
        found: &'static str,
    },
}

impl ContextError {
    /// Creates a missing key error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn mismatch(key: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected,
            found,
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "REGISTRY-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Falls back to the default suggestion for the code when no hint is set.
    #[must_use]
    pub fn with_default_hint(self) -> Self {
        if self.fix_hint.is_some() {
            return self;
        }
        match ContractSuggestions::get(&self.code) {
            Some(hint) => self.with_fix_hint(hint),
            None => self,
        }
    }
}

/// Error raised when a pipeline configuration is rejected.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a run finishes without producing its output key.
#[derive(Debug, Clone, Error)]
#[error("Output contract violated: key '{key}' missing after run; available keys: [{}]", .available.join(", "))]
pub struct OutputContractError {
    /// The expected output key.
    pub key: String,
    /// Keys present in the context when the run finished.
    pub available: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl OutputContractError {
    /// Creates a new output contract error.
    #[must_use]
    pub fn new(key: impl Into<String>, available: Vec<String>) -> Self {
        let key = key.into();
        let info = ContractErrorInfo::new(
            "OUTPUT-MISSING",
            format!("Run-phase stages did not produce '{key}'"),
        )
        .with_context_entry("key", key.clone())
        .with_default_hint();

        Self {
            key,
            available,
            error_info: info,
        }
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "REGISTRY-DUPLICATE" => Some(
                "Each stage name may appear once. Rename one of the stages.",
            ),
            "REGISTRY-INVALID-NAME" => Some(
                "Stage names must be non-empty and contain no whitespace or control characters.",
            ),
            "REGISTRY-PRODUCER-NAME" => Some(
                "Zero-argument producers are only run for the 'classifier' stage. \
                 Register this handler as 'classifier' or make it a context stage.",
            ),
            "REGISTRY-CLASSIFIER-KIND" => Some(
                "The 'classifier' stage is called without a context and must be a producer.",
            ),
            "CONFIG-CLASSIFIER-PHASE" => Some(
                "Add 'classifier' to the initial steps so it runs once at construction.",
            ),
            "CONFIG-MISSING-STEP" => Some(
                "Add the required stage to the registry or remove it from required_steps.",
            ),
            "CONFIG-INVALID-INITIAL" => Some(
                "Initial step names must be non-empty and contain no whitespace or control characters.",
            ),
            "OUTPUT-MISSING" => Some(
                "Ensure a run-phase stage (usually statistics extraction) writes 'stats' into the context.",
            ),
            _ => None,
        }
    }
}
