//! Stage traits and implementations.
//!
//! Stages are the fundamental units of work in an opiaflow pipeline. There
//! are two kinds:
//!
//! - [`Stage`]: receives the shared [`Context`] and updates it.
//! - [`Producer`]: takes no context and returns a single value. Only the
//!   reserved `classifier` stage is a producer; its value is cached under
//!   [`CLASSIFIER_KEY`](crate::context::CLASSIFIER_KEY).
//!
//! [`StageHandler`] is the tagged union the registry stores.

use crate::context::{Context, ContextValue};
use crate::errors::StageError;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for context-transforming stages.
///
/// A stage may mutate the context in place or replace it entirely with
/// `*ctx = new_context`. Every key a stage documents as produced must be
/// present when `apply` returns `Ok`.
pub trait Stage: Send + Sync + Debug {
    /// Applies the stage to the shared context.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or the work fails.
    fn apply(&self, ctx: &mut Context) -> Result<(), StageError>;

    /// Returns the concrete type name, used in audit output.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Trait for zero-argument stages that build a value once.
pub trait Producer: Send + Sync + Debug {
    /// Builds the value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be built.
    fn build(&self) -> Result<ContextValue, StageError>;

    /// Returns the concrete type name, used in audit output.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A registered stage: either a context transform or a producer.
#[derive(Debug, Clone)]
pub enum StageHandler {
    /// A stage that receives the context.
    Transform(Arc<dyn Stage>),
    /// A stage called without arguments.
    Producer(Arc<dyn Producer>),
}

impl StageHandler {
    /// Wraps a context stage.
    pub fn transform(stage: impl Stage + 'static) -> Self {
        Self::Transform(Arc::new(stage))
    }

    /// Wraps a producer.
    pub fn producer(producer: impl Producer + 'static) -> Self {
        Self::Producer(Arc::new(producer))
    }

    /// Returns the concrete type name of the wrapped stage.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Transform(stage) => stage.type_name(),
            Self::Producer(producer) => producer.type_name(),
        }
    }

    /// Renders the constructed fields of the wrapped stage.
    #[must_use]
    pub fn vars(&self) -> String {
        match self {
            Self::Transform(stage) => format!("{stage:?}"),
            Self::Producer(producer) => format!("{producer:?}"),
        }
    }

    /// Returns true for producers.
    #[must_use]
    pub const fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_))
    }
}

impl From<Arc<dyn Stage>> for StageHandler {
    fn from(stage: Arc<dyn Stage>) -> Self {
        Self::Transform(stage)
    }
}

impl From<Arc<dyn Producer>> for StageHandler {
    fn from(producer: Arc<dyn Producer>) -> Self {
        Self::Producer(producer)
    }
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&mut Context) -> Result<(), StageError> + Send + Sync,
{
    label: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut Context) -> Result<(), StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut Context) -> Result<(), StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("label", &self.label)
            .finish()
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut Context) -> Result<(), StageError> + Send + Sync,
{
    fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
        (self.func)(ctx)
    }

    fn type_name(&self) -> &'static str {
        "FnStage"
    }
}

/// A simple function-based producer.
pub struct FnProducer<F>
where
    F: Fn() -> Result<ContextValue, StageError> + Send + Sync,
{
    label: String,
    func: F,
}

impl<F> FnProducer<F>
where
    F: Fn() -> Result<ContextValue, StageError> + Send + Sync,
{
    /// Creates a new function-based producer.
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Debug for FnProducer<F>
where
    F: Fn() -> Result<ContextValue, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProducer")
            .field("label", &self.label)
            .finish()
    }
}

impl<F> Producer for FnProducer<F>
where
    F: Fn() -> Result<ContextValue, StageError> + Send + Sync,
{
    fn build(&self) -> Result<ContextValue, StageError> {
        (self.func)()
    }

    fn type_name(&self) -> &'static str {
        "FnProducer"
    }
}

/// A stage that leaves the context untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStage;

impl Stage for NoOpStage {
    fn apply(&self, _ctx: &mut Context) -> Result<(), StageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Segment {
        threshold: f64,
    }

    impl Stage for Segment {
        fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
            ctx.require("imc")?;
            ctx.insert_data("threshold_used", json!(self.threshold));
            Ok(())
        }
    }

    #[test]
    fn test_fn_stage() {
        let stage = FnStage::new("stats", |ctx: &mut Context| {
            ctx.insert_data("stats", json!({"count": 0}));
            Ok(())
        });

        let mut ctx = Context::new();
        stage.apply(&mut ctx).unwrap();
        assert!(ctx.contains_key("stats"));
        assert_eq!(format!("{stage:?}"), "FnStage { label: \"stats\" }");
    }

    #[test]
    fn test_fn_stage_can_replace_context() {
        let stage = FnStage::new("reset", |ctx: &mut Context| {
            let mut fresh = Context::new();
            fresh.insert_data("only", json!(true));
            *ctx = fresh;
            Ok(())
        });

        let mut ctx = Context::new();
        ctx.insert_data("old", json!(1));
        stage.apply(&mut ctx).unwrap();
        assert_eq!(ctx.keys(), vec!["only"]);
    }

    #[test]
    fn test_fn_producer() {
        let producer = FnProducer::new("model", || Ok(ContextValue::data(json!("cnn"))));
        assert_eq!(producer.build().unwrap(), ContextValue::data(json!("cnn")));
    }

    #[test]
    fn test_missing_key_propagates() {
        let stage = Segment { threshold: 0.85 };
        let mut ctx = Context::new();

        let err = stage.apply(&mut ctx).unwrap_err();
        assert_eq!(err.missing_key(), Some("imc"));
    }

    #[test]
    fn test_handler_type_name_and_vars() {
        let handler = StageHandler::transform(Segment { threshold: 0.85 });

        assert!(handler.type_name().ends_with("Segment"));
        assert_eq!(handler.vars(), "Segment { threshold: 0.85 }");
        assert!(!handler.is_producer());
    }

    #[test]
    fn test_noop_stage() {
        let mut ctx = Context::new();
        NoOpStage.apply(&mut ctx).unwrap();
        assert!(ctx.is_empty());
    }
}
