//! Human-readable description of a configured workflow.
//!
//! The audit string is recorded with every run so that a persisted result
//! can be traced back to the exact stage configuration that produced it.

use super::StageRegistry;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Describes every stage of a registry in execution order.
///
/// Each stage contributes one line group:
///
/// ```text
/// 1) Step: classifier
///    Type: my_crate::Classify
///    Vars: Classify { model_path: "keras_model.h5" }
/// ```
///
/// The output starts with a newline, as the groups are meant to be appended
/// to other text.
#[must_use]
pub fn steps_to_string(registry: &StageRegistry) -> String {
    let mut out = String::from("\n");
    for (index, (name, handler)) in registry.iter().enumerate() {
        let _ = writeln!(out, "{}) Step: {name}", index + 1);
        let _ = writeln!(out, "   Type: {}", handler.type_name());
        let _ = writeln!(out, "   Vars: {}", handler.vars());
    }
    out
}

/// SHA-256 digest (hex) of [`steps_to_string`].
#[must_use]
pub fn steps_digest(registry: &StageRegistry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(steps_to_string(registry).as_bytes());
    hex::encode(hasher.finalize())
}

/// A framed report of the workflow, with the crate version.
#[must_use]
pub fn steps_report(registry: &StageRegistry) -> String {
    let mut out = String::from("\n-- Pipeline configuration --\n\n");
    let _ = writeln!(out, "{} version: {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    out.push_str(&steps_to_string(registry));
    out.push_str("\n---------------------------------\n");
    out
}
