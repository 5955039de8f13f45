//! Instrument-specific stages.
//!
//! Each submodule supplies loaders and preprocessors for one instrument,
//! plus a function assembling that instrument's standard workflow.

pub mod silcam;
