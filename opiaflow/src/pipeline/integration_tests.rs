//! Integration tests for pipeline construction and execution.

#[cfg(test)]
mod tests {
    use crate::context::{
        Context, ContextValue, CLASSIFIER_KEY, INPUT_KEY, STATS_KEY, STEPS_DIGEST_KEY, STEPS_KEY,
    };
    use crate::errors::{ContextError, Phase, PipelineError, StageError};
    use crate::events::{self, CollectingEventSink};
    use crate::pipeline::{
        steps_to_string, ContextPolicy, Pipeline, PipelineConfig, StageRegistry,
    };
    use crate::stages::{FnStage, Stage};
    use crate::testing::{CallLog, FailingStage, RecordingProducer, RecordingStage, TestPipeline};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// classifier, load, prep, extract: the reference scenario.
    fn scenario_registry(log: &CallLog) -> StageRegistry {
        StageRegistry::new()
            .classifier(Arc::new(RecordingProducer::new(
                "C",
                log,
                ContextValue::data("trained-model"),
            )))
            .unwrap()
            .stage(
                "load",
                Arc::new(
                    RecordingStage::new("L", log)
                        .requiring(INPUT_KEY)
                        .writing("img", json!([[0, 1], [2, 3]])),
                ),
            )
            .unwrap()
            .stage(
                "prep",
                Arc::new(
                    RecordingStage::new("P", log)
                        .requiring("img")
                        .writing("imc", json!([[0.0, 0.5], [0.75, 1.0]])),
                ),
            )
            .unwrap()
            .stage(
                "extract",
                Arc::new(
                    RecordingStage::new("E", log)
                        .requiring("imc")
                        .requiring(CLASSIFIER_KEY)
                        .writing(STATS_KEY, json!({"particles": 4})),
                ),
            )
            .unwrap()
    }

    #[test]
    fn test_construction_runs_only_classifier() {
        let log = CallLog::new();
        let pipeline = Pipeline::new(scenario_registry(&log)).unwrap();

        assert_eq!(log.calls(), vec!["C"]);
        assert_eq!(
            pipeline.context().get(CLASSIFIER_KEY),
            Some(&ContextValue::data("trained-model"))
        );
        assert_eq!(pipeline.data_keys(), vec![CLASSIFIER_KEY]);
    }

    #[test]
    fn test_reference_scenario_two_runs() {
        let log = CallLog::new();
        let mut pipeline = Pipeline::new(scenario_registry(&log)).unwrap();

        let stats = pipeline.run("f1").unwrap();
        assert_eq!(stats, ContextValue::data(json!({"particles": 4})));
        assert_eq!(log.calls(), vec!["C", "L", "P", "E"]);

        pipeline.run("f2").unwrap();
        assert_eq!(log.calls(), vec!["C", "L", "P", "E", "L", "P", "E"]);
        assert_eq!(log.count("C"), 1);
        assert_eq!(pipeline.context().require_str(INPUT_KEY).unwrap(), "f2");
        assert_eq!(pipeline.run_count(), 2);
    }

    #[test]
    fn test_n_runs_invoke_each_run_stage_n_times() {
        let log = CallLog::new();
        let mut pipeline = Pipeline::new(scenario_registry(&log)).unwrap();

        for i in 0..5 {
            pipeline.run(format!("frame-{i}")).unwrap();
        }

        assert_eq!(log.count("C"), 1);
        for label in ["L", "P", "E"] {
            assert_eq!(log.count(label), 5);
        }
    }

    #[test]
    fn test_custom_initial_set_runs_in_registry_order() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage("a", Arc::new(RecordingStage::new("a", &log)))
            .unwrap()
            .stage("b", Arc::new(RecordingStage::new("b", &log)))
            .unwrap()
            .stage("c", Arc::new(RecordingStage::new("c", &log).writing(STATS_KEY, json!(1))))
            .unwrap()
            .stage("d", Arc::new(RecordingStage::new("d", &log)))
            .unwrap();

        // Initial set order differs from registry order on purpose.
        let mut pipeline = Pipeline::with_initial_steps(registry, ["d", "b"]).unwrap();
        assert_eq!(log.calls(), vec!["b", "d"]);

        log.clear();
        pipeline.run("x").unwrap();
        assert_eq!(log.calls(), vec!["a", "c"]);
    }

    #[test]
    fn test_initial_stage_output_visible_to_runs() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage(
                "initial",
                Arc::new(RecordingStage::new("init", &log).writing("imbg", json!("background"))),
            )
            .unwrap()
            .stage(
                "extract",
                Arc::new(
                    RecordingStage::new("E", &log)
                        .requiring("imbg")
                        .writing(STATS_KEY, json!([])),
                ),
            )
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        pipeline.run("f1").unwrap();
        pipeline.run("f2").unwrap();
        assert_eq!(log.calls(), vec!["init", "E", "E"]);
    }

    #[test]
    fn test_without_classifier() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage(
                "extract",
                Arc::new(RecordingStage::new("E", &log).writing(STATS_KEY, json!(0))),
            )
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        assert!(pipeline.context().get(CLASSIFIER_KEY).is_none());
        assert!(pipeline.data_keys().is_empty());
        assert!(log.calls().is_empty());

        pipeline.run("f1").unwrap();
        assert!(pipeline.context().get(CLASSIFIER_KEY).is_none());
    }

    #[test]
    fn test_missing_stats_fails_after_last_stage() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage("load", Arc::new(RecordingStage::new("L", &log)))
            .unwrap()
            .stage("extract", Arc::new(RecordingStage::new("E", &log)))
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        let err = pipeline.run("f1").unwrap_err();

        assert!(matches!(err, PipelineError::OutputContract(_)));
        assert_eq!(err.code(), Some("OUTPUT-MISSING"));
        assert_eq!(log.calls(), vec!["L", "E"]);
    }

    #[test]
    fn test_missing_key_fails_at_point_of_use() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage("load", Arc::new(RecordingStage::new("L", &log)))
            .unwrap()
            .stage("middle", Arc::new(RecordingStage::new("M", &log)))
            .unwrap()
            .stage("prep", Arc::new(RecordingStage::new("P", &log).requiring("img")))
            .unwrap()
            .stage("extract", Arc::new(RecordingStage::new("E", &log)))
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        let err = pipeline.run("f1").unwrap_err();

        match err {
            PipelineError::Stage {
                stage,
                phase,
                source: StageError::Context(ContextError::MissingKey { key }),
            } => {
                assert_eq!(stage, "prep");
                assert_eq!(phase, Phase::Run);
                assert_eq!(key, "img");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.calls(), vec!["L", "M", "P"]);
    }

    #[test]
    fn test_initial_failure_aborts_construction() {
        let log = CallLog::new();
        let registry = StageRegistry::new()
            .stage("initial", Arc::new(FailingStage::new("background missing")))
            .unwrap()
            .stage("load", Arc::new(RecordingStage::new("L", &log)))
            .unwrap();

        let err = Pipeline::new(registry).unwrap_err();
        assert_eq!(err.failed_stage(), Some("initial"));
        assert!(err.to_string().contains("initial phase"));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_classifier_outside_initial_set_is_rejected() {
        let log = CallLog::new();
        let err = Pipeline::with_initial_steps(scenario_registry(&log), ["initial"]).unwrap_err();

        assert_eq!(err.code(), Some("CONFIG-CLASSIFIER-PHASE"));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_context_carries_over_between_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let registry = StageRegistry::new()
            .stage(
                "accumulate",
                Arc::new(FnStage::new("accumulate", move |ctx: &mut Context| -> Result<(), StageError> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    let total = ctx
                        .get("frames")
                        .and_then(ContextValue::as_data)
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0);
                    ctx.insert_data("frames", json!(total + 1));
                    ctx.insert_data(STATS_KEY, json!(total + 1));
                    Ok(())
                })),
            )
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        assert_eq!(pipeline.run("f1").unwrap(), ContextValue::data(json!(1)));
        assert_eq!(pipeline.run("f2").unwrap(), ContextValue::data(json!(2)));
        assert_eq!(pipeline.run("f3").unwrap(), ContextValue::data(json!(3)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stale_keys_persist_between_runs() {
        #[derive(Debug)]
        struct OnlyFirst;

        impl Stage for OnlyFirst {
            fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
                if ctx.require_str(INPUT_KEY)? == "f1" {
                    ctx.insert_data(STATS_KEY, json!("from f1"));
                }
                Ok(())
            }
        }

        let registry = StageRegistry::new()
            .stage("extract", Arc::new(OnlyFirst))
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        pipeline.run("f1").unwrap();
        // The stage did not overwrite stats for f2, so the old value is returned.
        assert_eq!(pipeline.run("f2").unwrap(), ContextValue::data("from f1"));
    }

    #[test]
    fn test_reset_per_run_policy() {
        #[derive(Debug)]
        struct OnlyFirst;

        impl Stage for OnlyFirst {
            fn apply(&self, ctx: &mut Context) -> Result<(), StageError> {
                if ctx.require_str(INPUT_KEY)? == "f1" {
                    ctx.insert_data(STATS_KEY, json!("from f1"));
                }
                Ok(())
            }
        }

        let log = CallLog::new();
        let registry = StageRegistry::new()
            .classifier(Arc::new(RecordingProducer::new("C", &log, ContextValue::data("m"))))
            .unwrap()
            .stage("extract", Arc::new(OnlyFirst))
            .unwrap();
        let config = PipelineConfig::new().with_context_policy(ContextPolicy::ResetPerRun);

        let mut pipeline = Pipeline::with_config(registry, config).unwrap();
        pipeline.run("f1").unwrap();
        let err = pipeline.run("f2").unwrap_err();

        assert!(matches!(err, PipelineError::OutputContract(_)));
        // Initial-phase keys survive the reset.
        assert!(pipeline.context().contains_key(CLASSIFIER_KEY));
        assert_eq!(log.count("C"), 1);
    }

    #[test]
    fn test_run_records_audit_string() {
        let log = CallLog::new();
        let mut pipeline = Pipeline::new(scenario_registry(&log)).unwrap();
        let before = pipeline.steps_string();

        pipeline.run("f1").unwrap();
        let recorded = pipeline.context().require_str(STEPS_KEY).unwrap().to_string();

        assert_eq!(recorded, before);
        assert_eq!(pipeline.steps_string(), before);
        assert_eq!(recorded, steps_to_string(pipeline.registry()));
        assert_eq!(
            pipeline.context().require_str(STEPS_DIGEST_KEY).unwrap().len(),
            64
        );
        for (index, name) in ["classifier", "load", "prep", "extract"].iter().enumerate() {
            assert!(recorded.contains(&format!("{}) Step: {name}\n", index + 1)));
        }
    }

    #[test]
    fn test_input_and_metadata_set_before_first_stage() {
        let log = CallLog::new();
        let load = Arc::new(RecordingStage::new("L", &log));
        let registry = StageRegistry::new()
            .stage("load", load.clone())
            .unwrap()
            .stage("extract", Arc::new(RecordingStage::new("E", &log).writing(STATS_KEY, json!(0))))
            .unwrap();

        let mut pipeline = Pipeline::new(registry).unwrap();
        pipeline.run("f1").unwrap();

        assert_eq!(
            load.observed_keys(),
            vec![vec![
                INPUT_KEY.to_string(),
                STEPS_KEY.to_string(),
                STEPS_DIGEST_KEY.to_string(),
            ]]
        );
    }

    #[test]
    fn test_events_trace_progress_before_failure() {
        let registry = StageRegistry::new()
            .stage("load", Arc::new(crate::stages::NoOpStage))
            .unwrap()
            .stage("segmentation", Arc::new(FailingStage::new("threshold out of range")))
            .unwrap()
            .stage("extract", Arc::new(crate::stages::NoOpStage))
            .unwrap();

        let mut fixture = TestPipeline::new(registry).unwrap();
        let err = fixture.pipeline.run("f1").unwrap_err();

        assert_eq!(err.failed_stage(), Some("segmentation"));
        assert_eq!(fixture.started_stages(), vec!["load", "segmentation"]);
        assert_eq!(
            fixture.events.stages_for(events::STAGE_FAILED),
            vec!["segmentation"]
        );
        assert_eq!(fixture.events.events_of_type(events::RUN_FAILED).len(), 1);
        assert!(fixture.events.events_of_type(events::RUN_COMPLETED).is_empty());
    }

    #[test]
    fn test_event_sequence_for_successful_run() {
        let log = CallLog::new();
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline =
            Pipeline::with_sink(scenario_registry(&log), PipelineConfig::default(), sink.clone())
                .unwrap();
        pipeline.run("f1").unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                events::PIPELINE_INITIALIZING,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::PIPELINE_READY,
                events::RUN_STARTED,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::STAGE_STARTED,
                events::STAGE_COMPLETED,
                events::RUN_COMPLETED,
            ]
        );

        let ready = sink.events_of_type(events::PIPELINE_READY);
        assert_eq!(ready[0].1, Some(json!({ "data_keys": [CLASSIFIER_KEY] })));
    }

    #[test]
    fn test_print_steps_reports_through_sink() {
        let log = CallLog::new();
        let fixture = TestPipeline::new(scenario_registry(&log)).unwrap();

        let report = fixture.pipeline.print_steps();
        assert!(report.contains("-- Pipeline configuration --"));
        assert!(report.contains(&fixture.pipeline.steps_string()));

        let emitted = fixture.events.events_of_type(events::STEPS_REPORT);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].1, Some(json!({ "report": report })));
    }

    #[test]
    fn test_independent_pipelines_on_threads() {
        let handles: Vec<_> = (0..2)
            .map(|n| {
                std::thread::spawn(move || {
                    let log = CallLog::new();
                    let mut pipeline = Pipeline::new(scenario_registry(&log)).unwrap();
                    for i in 0..3 {
                        pipeline.run(format!("t{n}-f{i}")).unwrap();
                    }
                    log.count("E")
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
    }
}
