//! Context management for pipeline execution.
//!
//! This module provides:
//! - The ordered [`Context`] map shared by all stages
//! - Tagged [`ContextValue`]s for data and opaque handles
//! - Reserved key names used by the engine and the bundled stages

mod data;
mod identity;
mod value;

pub use data::Context;
pub use identity::RunIdentity;
pub use value::ContextValue;

/// Key under which the classifier stage's value is stored.
pub const CLASSIFIER_KEY: &str = "cl";

/// Key under which `run` stores its input reference.
pub const INPUT_KEY: &str = "filename";

/// Key under which `run` stores the audit string of the registry.
pub const STEPS_KEY: &str = "steps_string";

/// Key under which `run` stores the digest of the audit string.
pub const STEPS_DIGEST_KEY: &str = "steps_digest";

/// Key that `run` extracts and returns.
pub const STATS_KEY: &str = "stats";

/// Frame timestamp added by loaders.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Raw frame added by loaders.
pub const IMAGE_KEY: &str = "img";

/// Prepared single-channel frame added by preprocessors.
pub const PREPARED_IMAGE_KEY: &str = "imc";
