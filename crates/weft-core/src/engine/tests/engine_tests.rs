use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use semver::Version;
use serde_json::json;

use crate::config::service::{ConfigService, FlowPlan};
use crate::config::ConfigFormat;
use crate::engine::error::EngineSystemError;
use crate::engine::metrics::NodeStatus;
use crate::engine::snapshot::StateStore;
use crate::engine::{ExecutionEngine, RunOptions, SKIP_FILTERED, SKIP_MISSING_UPSTREAM};
use crate::error::Error;
use crate::hooks::{HookBus, HookEvent};
use crate::registry::registry::SharedMethodRegistry;
use crate::registry::{callable, sync_callable, MethodDef};

/// Registry backing the seed scenarios: `X::mem::load` maps known paths to
/// literal values; `Y::{v1,v2}::clean` double their input, `v2` wins on
/// priority.
async fn fixture_registry() -> SharedMethodRegistry {
    let registry = SharedMethodRegistry::new();
    registry
        .register(
            MethodDef::new(
                "X",
                "mem",
                "load",
                sync_callable(|args| match args.arg("path").and_then(|v| v.as_str()) {
                    Some("in.csv") => Ok(json!(42)),
                    Some("other.csv") => Ok(json!(43)),
                    other => Err(format!("unknown path {:?}", other).into()),
                }),
            )
            .version(Version::new(1, 0, 0)),
        )
        .await
        .expect("register");
    for (engine, priority) in [("v1", 1), ("v2", 5)] {
        registry
            .register(
                MethodDef::new(
                    "Y",
                    engine,
                    "clean",
                    sync_callable(|args| {
                        let df = args.require("df")?;
                        let n = df.as_i64().ok_or("df must be a number")?;
                        Ok(json!(n * 2))
                    }),
                )
                .version(Version::new(1, 0, 0))
                .priority(priority),
            )
            .await
            .expect("register");
    }
    registry
        .register(MethodDef::new(
            "Y",
            "v1",
            "merge",
            sync_callable(|_| Ok(json!("done"))),
        ))
        .await
        .expect("register");
    registry
}

fn compile(text: &str) -> FlowPlan {
    let service = ConfigService::new();
    let spec = service.load_str(text, ConfigFormat::Yaml).expect("parse");
    service.compile(spec).expect("compile")
}

const S1: &str = r#"
pipeline:
  name: s1
  steps:
    - name: A
      component: X
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: B
      component: Y
      engine: auto
      method: clean
      parameters:
        df: "steps.A.outputs.parameters.raw"
      outputs:
        parameters:
          - name: cleaned
"#;

#[tokio::test]
async fn s1_linear_chain_runs_and_caches() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks.clone());
    let flow = compile(S1);

    let layers: Vec<Vec<String>> = flow.plan.layers.iter().map(|l| l.nodes.clone()).collect();
    assert_eq!(layers, vec![vec!["A".to_string()], vec!["B".to_string()]]);

    let report = engine.run(&flow, RunOptions::default()).await.expect("run");
    assert!(report.succeeded);
    assert_eq!(engine.catalog().get("A__raw").await, Some(json!(42)));
    assert_eq!(engine.catalog().get("B__cleaned").await, Some(json!(84)));
    assert!(!report.metrics["A"].cached);
    assert!(!report.metrics["B"].cached);
    assert_eq!(hooks.invocation_count(HookEvent::BeforeFlow).await, 1);
    assert_eq!(hooks.invocation_count(HookEvent::AfterFlow).await, 1);
    assert_eq!(hooks.invocation_count(HookEvent::CacheMiss).await, 2);

    // Same configuration again: everything replays from the cache.
    let rerun = compile(S1);
    let second = engine.run(&rerun, RunOptions::default()).await.expect("rerun");
    assert!(second.metrics["A"].cached);
    assert!(second.metrics["B"].cached);
    assert_eq!(second.metrics["A"].signature, report.metrics["A"].signature);
    assert_eq!(second.metrics["B"].signature, report.metrics["B"].signature);
    assert_eq!(hooks.invocation_count(HookEvent::CacheHit).await, 2);
}

#[tokio::test]
async fn s1_picks_the_higher_priority_engine() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(S1);
    engine.run(&flow, RunOptions::default()).await.expect("run");

    let resolved = flow.nodes["B"].handles[0].resolved_engine().await;
    assert_eq!(resolved, Some("v2".to_string()));
}

const S2: &str = r#"
pipeline:
  name: s2
  orchestration:
    task_runner: concurrent
    max_workers: 2
  steps:
    - name: A
      component: X
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: B
      component: Y
      method: clean
      parameters:
        df: "steps.A.outputs.parameters.raw"
      outputs:
        parameters:
          - name: out
    - name: C
      component: Y
      method: clean
      parameters:
        df: "steps.A.outputs.parameters.raw"
      outputs:
        parameters:
          - name: out
    - name: D
      component: Y
      engine: v1
      method: merge
      depends_on: [B, C]
"#;

#[tokio::test]
async fn s2_diamond_runs_layer_parallel() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(S2);

    let layers: Vec<Vec<String>> = flow.plan.layers.iter().map(|l| l.nodes.clone()).collect();
    assert_eq!(
        layers,
        vec![
            vec!["A".to_string()],
            vec!["B".to_string(), "C".to_string()],
            vec!["D".to_string()],
        ]
    );

    let report = engine.run(&flow, RunOptions::default()).await.expect("run");
    assert!(report.succeeded);
    for step in ["A", "B", "C", "D"] {
        assert_eq!(report.metrics[step].status, NodeStatus::Succeeded);
    }
    assert_eq!(engine.catalog().get("B__out").await, Some(json!(84)));
    assert_eq!(engine.catalog().get("C__out").await, Some(json!(84)));
}

#[tokio::test]
async fn s3_parameter_change_invalidates_downstream() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);

    let first = engine
        .run(&compile(S1), RunOptions::default())
        .await
        .expect("first run");

    let changed = compile(&S1.replace("in.csv", "other.csv"));
    let second = engine.run(&changed, RunOptions::default()).await.expect("second run");

    assert!(!second.metrics["A"].cached);
    assert!(!second.metrics["B"].cached);
    assert_ne!(second.metrics["A"].signature, first.metrics["A"].signature);
    assert_ne!(second.metrics["B"].signature, first.metrics["B"].signature);
    assert_eq!(engine.catalog().get("A__raw").await, Some(json!(43)));
    assert_eq!(engine.catalog().get("B__cleaned").await, Some(json!(86)));
}

#[tokio::test]
async fn s4_new_implementation_invalidates_only_its_step() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry.clone(), hooks);

    engine
        .run(&compile(S1), RunOptions::default())
        .await
        .expect("first run");

    // A higher-priority clean arrives: df + 1.
    registry
        .register(
            MethodDef::new(
                "Y",
                "v3",
                "clean",
                sync_callable(|args| {
                    let n = args.require("df")?.as_i64().ok_or("df must be a number")?;
                    Ok(json!(n + 1))
                }),
            )
            .version(Version::new(1, 0, 0))
            .priority(9),
        )
        .await
        .expect("register");

    // Fresh compile, fresh handles: predictions see the new registration.
    let rerun = compile(S1);
    let report = engine.run(&rerun, RunOptions::default()).await.expect("rerun");
    assert!(report.metrics["A"].cached);
    assert!(!report.metrics["B"].cached);
    assert_eq!(engine.catalog().get("B__cleaned").await, Some(json!(43)));
}

#[tokio::test]
async fn s6_soft_failure_skips_descendants() {
    let registry = fixture_registry().await;
    registry
        .register(MethodDef::new(
            "Y",
            "v1",
            "explode",
            sync_callable(|_| Err("ValueError: bad data".into())),
        ))
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let state_dir = tempfile::tempdir().expect("tempdir");
    let engine = ExecutionEngine::new(registry, hooks.clone())
        .with_state_store(StateStore::new(state_dir.path()));

    let flow = compile(
        r#"
pipeline:
  name: s6
  orchestration:
    soft_fail: true
  steps:
    - name: A
      component: X
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: B
      component: Y
      engine: v1
      method: explode
      parameters:
        df: "steps.A.outputs.parameters.raw"
      outputs:
        parameters:
          - name: out
    - name: C
      component: Y
      method: clean
      parameters:
        df: "steps.B.outputs.parameters.out"
"#,
    );

    let report = engine.run(&flow, RunOptions::default()).await.expect("soft run");
    assert!(report.succeeded);
    assert_eq!(report.metrics["A"].status, NodeStatus::Succeeded);
    assert_eq!(
        report.metrics["B"].status,
        NodeStatus::Failed { soft: true }
    );
    assert_eq!(
        report.metrics["C"].status,
        NodeStatus::Skipped {
            reason: SKIP_MISSING_UPSTREAM.to_string()
        }
    );
    assert!(!engine.catalog().contains("B__out").await);

    // Snapshot written for B only; hooks fired.
    assert!(state_dir.path().join(".pipeline/failures/B.json").exists());
    assert!(!state_dir.path().join(".pipeline/failures/A.json").exists());
    assert!(!state_dir.path().join(".pipeline/failures/C.json").exists());
    assert_eq!(hooks.invocation_count(HookEvent::Failure).await, 1);
    assert_eq!(hooks.invocation_count(HookEvent::AfterFlow).await, 1);
}

#[tokio::test]
async fn hard_failure_terminates_the_flow() {
    let registry = fixture_registry().await;
    registry
        .register(MethodDef::new(
            "Y",
            "v1",
            "explode",
            sync_callable(|_| Err("boom".into())),
        ))
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(
        r#"
pipeline:
  name: hard
  steps:
    - name: A
      component: X
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: B
      component: Y
      engine: v1
      method: explode
      parameters:
        df: "steps.A.outputs.parameters.raw"
"#,
    );

    let err = engine.run(&flow, RunOptions::default()).await.expect_err("fatal");
    match &err {
        Error::Engine(EngineSystemError::NodeExecution { step, .. }) => {
            assert_eq!(step, "B");
        }
        other => panic!("expected NodeExecution, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
    // Prior successful outputs stay around for inspection.
    assert_eq!(engine.catalog().get("A__raw").await, Some(json!(42)));
}

#[tokio::test]
async fn retries_run_until_success() {
    let registry = SharedMethodRegistry::new();
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    registry
        .register(MethodDef::new(
            "X",
            "mem",
            "flaky",
            callable(move |_| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient".into())
                    } else {
                        Ok(json!("finally"))
                    }
                }
            }),
        ))
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(
        r#"
pipeline:
  name: flaky
  orchestration:
    retry_count: 2
  steps:
    - name: A
      component: X
      engine: mem
      method: flaky
      outputs:
        parameters:
          - name: out
"#,
    );

    let report = engine.run(&flow, RunOptions::default()).await.expect("run");
    assert_eq!(report.metrics["A"].status, NodeStatus::Succeeded);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(engine.catalog().get("A__out").await, Some(json!("finally")));
}

#[tokio::test(start_paused = true)]
async fn timeouts_cancel_slow_nodes() {
    let registry = SharedMethodRegistry::new();
    registry
        .register(MethodDef::new(
            "X",
            "mem",
            "stall",
            callable(|_| async {
                tokio::time::sleep(std::time::Duration::from_secs(120)).await;
                Ok(json!("too late"))
            }),
        ))
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(
        r#"
pipeline:
  name: slow
  orchestration:
    timeout: 1
  steps:
    - name: A
      component: X
      engine: mem
      method: stall
"#,
    );

    let err = engine.run(&flow, RunOptions::default()).await.expect_err("timeout");
    match err {
        Error::Engine(EngineSystemError::NodeExecution { step, source, .. }) => {
            assert_eq!(step, "A");
            assert!(source.to_string().contains("timed out"));
        }
        other => panic!("expected NodeExecution, got {:?}", other),
    }
}

#[tokio::test]
async fn cache_integrity_violation_triggers_one_reexecution() {
    let registry = SharedMethodRegistry::new();
    registry
        .register(MethodDef::new(
            "X",
            "mem",
            "split",
            sync_callable(|_| Ok(json!({"x": 1, "y": 2}))),
        ))
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks.clone());
    let flow = compile(
        r#"
pipeline:
  name: split
  steps:
    - name: A
      component: X
      engine: mem
      method: split
      outputs:
        parameters:
          - name: x
          - name: y
"#,
    );

    let first = engine.run(&flow, RunOptions::default()).await.expect("run");
    let signature = first.metrics["A"].signature.clone();

    // Corrupt the cache: one output vanishes while the signature survives.
    engine
        .catalog()
        .evict_step("A", &["A__y".to_string()])
        .await;
    engine.catalog().record_signature("A", &signature).await;

    let second = engine.run(&compile(
        r#"
pipeline:
  name: split
  steps:
    - name: A
      component: X
      engine: mem
      method: split
      outputs:
        parameters:
          - name: x
          - name: y
"#,
    ), RunOptions::default()).await.expect("recovered run");

    assert!(!second.metrics["A"].cached);
    assert_eq!(second.metrics["A"].status, NodeStatus::Succeeded);
    assert_eq!(engine.catalog().get("A__x").await, Some(json!(1)));
    assert_eq!(engine.catalog().get("A__y").await, Some(json!(2)));
    assert_eq!(hooks.invocation_count(HookEvent::Failure).await, 1);
}

#[tokio::test]
async fn force_bypasses_the_cache() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);

    engine
        .run(&compile(S1), RunOptions::default())
        .await
        .expect("first run");
    let report = engine
        .run(
            &compile(S1),
            RunOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
        .expect("forced run");
    assert!(!report.metrics["A"].cached);
    assert!(!report.metrics["B"].cached);
}

#[tokio::test]
async fn only_filter_skips_everything_else() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);
    let flow = compile(S1);

    let report = engine
        .run(
            &flow,
            RunOptions {
                only: Some(["A".to_string()].into_iter().collect()),
                ..Default::default()
            },
        )
        .await
        .expect("run");
    assert_eq!(report.metrics["A"].status, NodeStatus::Succeeded);
    assert_eq!(
        report.metrics["B"].status,
        NodeStatus::Skipped {
            reason: SKIP_FILTERED.to_string()
        }
    );
}

#[tokio::test]
async fn resume_reexecutes_failed_steps_and_descendants() {
    let registry = fixture_registry().await;
    registry
        .register(
            MethodDef::new(
                "Y",
                "vbad",
                "transform",
                sync_callable(|_| Err("not implemented yet".into())),
            )
            .priority(5),
        )
        .await
        .expect("register");

    let hooks = Arc::new(HookBus::new());
    let state_dir = tempfile::tempdir().expect("tempdir");
    let engine = ExecutionEngine::new(registry.clone(), hooks)
        .with_state_store(StateStore::new(state_dir.path()));

    let config = r#"
pipeline:
  name: resume
  orchestration:
    soft_fail: true
  steps:
    - name: A
      component: X
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: B
      component: Y
      method: transform
      parameters:
        df: "steps.A.outputs.parameters.raw"
      outputs:
        parameters:
          - name: out
    - name: C
      component: Y
      method: clean
      parameters:
        df: "steps.B.outputs.parameters.out"
"#;

    let first = engine.run(&compile(config), RunOptions::default()).await.expect("run");
    assert_eq!(first.metrics["B"].status, NodeStatus::Failed { soft: true });
    assert!(state_dir.path().join(".pipeline/failures/B.json").exists());

    // A fixed implementation lands with a higher priority.
    registry
        .register(
            MethodDef::new(
                "Y",
                "vgood",
                "transform",
                sync_callable(|args| {
                    let n = args.require("df")?.as_i64().ok_or("df must be a number")?;
                    Ok(json!(n * 10))
                }),
            )
            .priority(9),
        )
        .await
        .expect("register");

    let second = engine
        .run(
            &compile(config),
            RunOptions {
                resume: true,
                ..Default::default()
            },
        )
        .await
        .expect("resume run");

    assert!(second.metrics["A"].cached);
    assert_eq!(second.metrics["B"].status, NodeStatus::Succeeded);
    assert!(!second.metrics["B"].cached);
    assert_eq!(second.metrics["C"].status, NodeStatus::Succeeded);
    assert_eq!(engine.catalog().get("B__out").await, Some(json!(420)));
    assert_eq!(engine.catalog().get("C__clean").await, None);
    // The recovered step's snapshot is gone.
    assert!(!state_dir.path().join(".pipeline/failures/B.json").exists());
}

#[tokio::test]
async fn pre_cancelled_flows_run_nothing() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let report = engine
        .run(
            &compile(S1),
            RunOptions {
                cancel: Some(cancel),
                ..Default::default()
            },
        )
        .await
        .expect("run");
    assert_eq!(report.metrics["A"].status, NodeStatus::Cancelled);
    assert_eq!(report.metrics["B"].status, NodeStatus::Cancelled);
    assert!(!engine.catalog().contains("A__raw").await);
}

#[tokio::test]
async fn cache_plan_predicts_hits_and_misses() {
    let registry = fixture_registry().await;
    let hooks = Arc::new(HookBus::new());
    let engine = ExecutionEngine::new(registry, hooks);

    let plan = engine.cache_plan(&compile(S1)).await.expect("plan");
    assert!(plan.iter().all(|entry| !entry.hit));

    engine
        .run(&compile(S1), RunOptions::default())
        .await
        .expect("run");
    let plan = engine.cache_plan(&compile(S1)).await.expect("plan");
    assert!(plan.iter().all(|entry| entry.hit));

    engine
        .cache_clear(&compile(S1), Some(&["B".to_string()]))
        .await
        .expect("clear");
    let plan = engine.cache_plan(&compile(S1)).await.expect("plan");
    let hits: Vec<bool> = plan.iter().map(|e| e.hit).collect();
    assert_eq!(hits, vec![true, false]);
}
