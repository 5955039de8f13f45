//! Event sink system for observability.
//!
//! The pipeline engine owns one [`EventSink`] and reports its progress
//! through it: initialization, each stage as it starts and finishes, and the
//! outcome of every run. Stage start events are always emitted before the
//! stage runs, so the last `stage.started` without a matching
//! `stage.completed` identifies a failing stage.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted when construction starts.
pub const PIPELINE_INITIALIZING: &str = "pipeline.initializing";
/// Emitted when initialization has finished; carries the context keys.
pub const PIPELINE_READY: &str = "pipeline.ready";
/// Emitted when a run starts; carries the run identity.
pub const RUN_STARTED: &str = "pipeline.run.started";
/// Emitted when a run has produced its output.
pub const RUN_COMPLETED: &str = "pipeline.run.completed";
/// Emitted when a run fails.
pub const RUN_FAILED: &str = "pipeline.run.failed";
/// Emitted before a stage is invoked.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted after a stage returned successfully.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted after a stage returned an error.
pub const STAGE_FAILED: &str = "stage.failed";
/// Emitted with the workflow report by `print_steps`.
pub const STEPS_REPORT: &str = "pipeline.steps";
