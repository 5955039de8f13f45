//! Pipeline building and execution.
//!
//! This module provides:
//! - The ordered stage registry
//! - Pipeline configuration
//! - The two-phase execution engine
//! - Workflow audit strings

pub mod audit;
mod builder;
mod config;
mod engine;
#[cfg(test)]
mod integration_tests;
mod registry;

pub use audit::{steps_digest, steps_report, steps_to_string};
pub use builder::PipelineBuilder;
pub use config::{ContextPolicy, PipelineConfig};
pub use engine::Pipeline;
pub use registry::{StageRegistry, CLASSIFIER_STAGE};
