//! The pipeline execution engine.

use super::audit::{steps_digest, steps_report, steps_to_string};
use super::config::{ContextPolicy, PipelineConfig};
use super::registry::StageRegistry;
use crate::context::{
    Context, ContextValue, RunIdentity, CLASSIFIER_KEY, INPUT_KEY, STATS_KEY, STEPS_DIGEST_KEY,
    STEPS_KEY,
};
use crate::errors::{OutputContractError, Phase, PipelineError};
use crate::events::{self, EventSink, LoggingEventSink};
use crate::stages::StageHandler;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// A sequential processing pipeline.
///
/// Construction runs every stage named in the initial set exactly once, in
/// registry order. Each call to [`run`](Self::run) then runs every other
/// stage, in registry order, against the same [`Context`].
///
/// The context is owned by the pipeline and persists across runs. With the
/// default [`ContextPolicy::CarryOver`], keys written by one run remain
/// visible to the next unless a stage overwrites them; stages that need
/// per-input isolation for a key must write it on every run.
///
/// ```rust,ignore
/// let registry = StageRegistry::new()
///     .classifier(Arc::new(Classify::new(model_path)))?
///     .stage("load", Arc::new(SilCamLoad::new(reader)))?
///     .stage("imageprep", Arc::new(ImagePrep))?
///     .stage("statextract", Arc::new(CalculateStats::default()))?;
///
/// let mut pipeline = Pipeline::new(registry)?;
/// let stats = pipeline.run("D20181101T142731.838206.silc")?;
/// ```
pub struct Pipeline {
    registry: StageRegistry,
    config: PipelineConfig,
    data: Context,
    baseline: Option<Context>,
    sink: Arc<dyn EventSink>,
    pipeline_id: Uuid,
    runs: u64,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pipeline_id", &self.pipeline_id)
            .field("stages", &self.registry.names())
            .field("initial_steps", &self.config.initial_steps)
            .field("context_policy", &self.config.context_policy)
            .field("data_keys", &self.data.keys())
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline with the default initial steps
    /// (`initial` and `classifier`).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial stage fails.
    pub fn new(registry: StageRegistry) -> Result<Self, PipelineError> {
        Self::with_config(registry, PipelineConfig::default())
    }

    /// Creates a pipeline with an explicit initial set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial stage fails.
    pub fn with_initial_steps(
        registry: StageRegistry,
        initial_steps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, PipelineError> {
        Self::with_config(
            registry,
            PipelineConfig::default().with_initial_steps(initial_steps),
        )
    }

    /// Creates a pipeline from a configuration, logging through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial stage fails.
    pub fn with_config(registry: StageRegistry, config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_sink(registry, config, Arc::new(LoggingEventSink::default()))
    }

    /// Creates a pipeline that reports progress to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an initial stage fails.
    pub fn with_sink(
        registry: StageRegistry,
        config: PipelineConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, PipelineError> {
        config.validate(&registry)?;

        let mut pipeline = Self {
            registry,
            config,
            data: Context::new(),
            baseline: None,
            sink,
            pipeline_id: Uuid::new_v4(),
            runs: 0,
        };
        pipeline.initialize()?;
        Ok(pipeline)
    }

    fn initialize(&mut self) -> Result<(), PipelineError> {
        let span = info_span!("pipeline.init", pipeline_id = %self.pipeline_id);
        let _enter = span.enter();

        info!(stages = self.registry.len(), "Initialising pipeline");
        self.sink.emit(
            events::PIPELINE_INITIALIZING,
            Some(json!({
                "pipeline_id": self.pipeline_id.to_string(),
                "stages": self.registry.names(),
                "initial_steps": self.config.initial_steps,
            })),
        );

        for name in &self.config.initial_steps {
            if !self.registry.contains(name) {
                debug!(step = %name, "Initial step not registered, skipping");
            }
        }

        for (name, handler) in self.registry.iter() {
            if !self.config.is_initial(name) {
                continue;
            }
            run_stage(&*self.sink, &mut self.data, name, handler, Phase::Initial)?;
        }

        let keys = self.data.keys();
        info!(data_keys = ?keys, "Pipeline ready");
        self.sink
            .emit(events::PIPELINE_READY, Some(json!({ "data_keys": keys })));

        if self.config.context_policy == ContextPolicy::ResetPerRun {
            self.baseline = Some(self.data.clone());
        }
        Ok(())
    }

    /// Runs every non-initial stage on one input and returns `stats`.
    ///
    /// The input is stored under `filename`, and the audit string of the
    /// registry under `steps_string` (its digest under `steps_digest`),
    /// before the first stage runs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] if a stage fails, and
    /// [`PipelineError::OutputContract`] if no stage produced `stats`.
    pub fn run(&mut self, input: impl Into<String>) -> Result<ContextValue, PipelineError> {
        self.runs += 1;
        let identity = RunIdentity::new(self.pipeline_id, self.runs, input);
        let span = info_span!(
            "pipeline.run",
            pipeline_id = %self.pipeline_id,
            run_index = identity.run_index,
            input = %identity.input,
        );
        let _enter = span.enter();
        let start = Instant::now();

        self.sink.emit(events::RUN_STARTED, Some(identity.to_event_data()));

        let result = self.execute_run(&identity);
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                info!(duration_ms, "Run completed");
                self.sink.emit(
                    events::RUN_COMPLETED,
                    Some(json!({
                        "run_id": identity.run_id.to_string(),
                        "duration_ms": duration_ms,
                    })),
                );
            }
            Err(err) => {
                self.sink.emit(
                    events::RUN_FAILED,
                    Some(json!({
                        "run_id": identity.run_id.to_string(),
                        "duration_ms": duration_ms,
                        "error": err.to_string(),
                        "stage": err.failed_stage(),
                    })),
                );
            }
        }
        result
    }

    fn execute_run(&mut self, identity: &RunIdentity) -> Result<ContextValue, PipelineError> {
        if let Some(baseline) = &self.baseline {
            self.data = baseline.clone();
        }

        self.data.insert(INPUT_KEY, identity.input.as_str());
        self.data.insert(STEPS_KEY, steps_to_string(&self.registry));
        self.data.insert(STEPS_DIGEST_KEY, steps_digest(&self.registry));

        for (name, handler) in self.registry.iter() {
            if self.config.is_initial(name) {
                continue;
            }
            run_stage(&*self.sink, &mut self.data, name, handler, Phase::Run)?;
        }

        self.data
            .get(STATS_KEY)
            .cloned()
            .ok_or_else(|| OutputContractError::new(STATS_KEY, self.data.keys()).into())
    }

    /// Returns the audit string of the registry.
    #[must_use]
    pub fn steps_string(&self) -> String {
        steps_to_string(&self.registry)
    }

    /// Reports the workflow configuration and returns the report.
    ///
    /// The report goes to the event sink and the `tracing` log.
    pub fn print_steps(&self) -> String {
        let report = steps_report(&self.registry);
        info!("{report}");
        self.sink
            .emit(events::STEPS_REPORT, Some(json!({ "report": report })));
        report
    }

    /// Returns the shared context.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.data
    }

    /// Returns the context keys in insertion order.
    #[must_use]
    pub fn data_keys(&self) -> Vec<String> {
        self.data.keys()
    }

    /// Returns the stage registry.
    #[must_use]
    pub const fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the names run once at construction.
    #[must_use]
    pub const fn initial_steps(&self) -> &BTreeSet<String> {
        &self.config.initial_steps
    }

    /// Returns how many times `run` has been called.
    #[must_use]
    pub const fn run_count(&self) -> u64 {
        self.runs
    }

    /// Returns the unique ID of this pipeline instance.
    #[must_use]
    pub const fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }
}

fn run_stage(
    sink: &dyn EventSink,
    data: &mut Context,
    name: &str,
    handler: &StageHandler,
    phase: Phase,
) -> Result<(), PipelineError> {
    info!(
        stage = %name,
        phase = %phase,
        stage_type = handler.type_name(),
        data_keys = ?data.keys(),
        "Running stage"
    );
    sink.emit(
        events::STAGE_STARTED,
        Some(json!({
            "stage": name,
            "phase": phase,
            "type": handler.type_name(),
            "data_keys": data.keys(),
        })),
    );

    let result = match handler {
        StageHandler::Producer(producer) => producer.build().map(|value| {
            data.insert(CLASSIFIER_KEY, value);
        }),
        StageHandler::Transform(stage) => stage.apply(data),
    };

    match result {
        Ok(()) => {
            sink.emit(
                events::STAGE_COMPLETED,
                Some(json!({ "stage": name, "phase": phase })),
            );
            Ok(())
        }
        Err(err) => {
            sink.emit(
                events::STAGE_FAILED,
                Some(json!({ "stage": name, "phase": phase, "error": err.to_string() })),
            );
            Err(PipelineError::stage(name, phase, err))
        }
    }
}
