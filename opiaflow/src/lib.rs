//! # Opiaflow
//!
//! A configurable sequential processing pipeline for particle-imaging
//! instrument data.
//!
//! Raw sensor frames pass through an ordered chain of named, swappable
//! stages (load, preprocess, classify, segment, extract statistics, persist)
//! that share one mutable [`Context`](context::Context):
//!
//! - **Initial stages** run once, when the pipeline is constructed. The
//!   reserved `classifier` stage is called without a context and its value
//!   is cached under `cl`.
//! - **Run stages** run on every call to [`Pipeline::run`](pipeline::Pipeline::run),
//!   in registry order, and must leave a `stats` entry behind.
//! - **Audit strings** describe the configured workflow and are recorded
//!   with every run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use opiaflow::prelude::*;
//!
//! let registry = StageRegistry::new()
//!     .classifier(Arc::new(Classify::new("keras_model.h5")))?
//!     .stage("load", Arc::new(SilCamLoad::new(reader)))?
//!     .stage("imageprep", Arc::new(ImagePrep))?
//!     .stage("segmentation", Arc::new(Segment::new(0.85)))?
//!     .stage("statextract", Arc::new(CalculateStats::default()))?;
//!
//! let mut pipeline = Pipeline::with_initial_steps(registry, ["classifier"])?;
//! for file in files {
//!     let stats = pipeline.run(file)?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod errors;
pub mod events;
#[cfg(feature = "silcam")]
pub mod instrument;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{
        Context, ContextValue, CLASSIFIER_KEY, INPUT_KEY, STATS_KEY, STEPS_KEY,
    };
    pub use crate::errors::{
        ContextError, OutputContractError, Phase, PipelineError, PipelineValidationError,
        StageError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    #[cfg(feature = "silcam")]
    pub use crate::instrument::silcam::{FrameReader, ImagePrep, SilCamLoad};
    pub use crate::pipeline::{
        ContextPolicy, Pipeline, PipelineBuilder, PipelineConfig, StageRegistry,
    };
    pub use crate::stages::{FnProducer, FnStage, NoOpStage, Producer, Stage, StageHandler};
    pub use std::sync::Arc;
}
