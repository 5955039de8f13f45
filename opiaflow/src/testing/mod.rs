//! Testing utilities for opiaflow pipelines.
//!
//! This module provides:
//! - Recording stages and producers that log their invocations
//! - Context and pipeline fixtures wired to a collecting event sink

mod fixtures;
mod mocks;

pub use fixtures::{TestContext, TestPipeline};
pub use mocks::{CallLog, FailingStage, RecordingProducer, RecordingStage};
