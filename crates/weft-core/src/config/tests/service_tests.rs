use crate::config::service::ConfigService;
use crate::config::ConfigFormat;
use crate::error::Error;
use crate::graph::error::GraphSystemError;
use crate::registry::handle::EnginePreference;

fn compile(text: &str) -> crate::error::Result<crate::config::FlowPlan> {
    let service = ConfigService::new();
    let spec = service.load_str(text, ConfigFormat::Yaml)?;
    service.compile(spec)
}

#[test]
fn compiles_a_linear_flow() {
    let flow = compile(
        r#"
pipeline:
  name: linear
  steps:
    - name: load
      component: table
      engine: mem
      method: load
      parameters:
        path: "in.csv"
      outputs:
        parameters:
          - name: raw
    - name: clean
      component: table
      method: clean
      parameters:
        df: "steps.load.outputs.parameters.raw"
      outputs:
        parameters:
          - name: cleaned
"#,
    )
    .expect("compile");

    assert_eq!(flow.name, "linear");
    assert_eq!(flow.nodes.len(), 2);
    assert_eq!(flow.plan.depth(), 2);

    let load = &flow.nodes["load"];
    assert_eq!(load.engine, EnginePreference::Fixed("mem".to_string()));
    assert_eq!(load.handles.len(), 1);
    assert_eq!(load.dataset_names(), ["load__raw".to_string()]);

    let clean = &flow.nodes["clean"];
    assert_eq!(clean.engine, EnginePreference::Auto);
    assert_eq!(clean.input_refs.len(), 1);
    assert_eq!(clean.input_refs[0].dataset_name(), "load__raw");
}

#[test]
fn referenced_outputs_are_auto_added_upstream() {
    let flow = compile(
        r#"
pipeline:
  name: autoadd
  steps:
    - name: load
      component: table
      method: load
    - name: clean
      component: table
      method: clean
      parameters:
        df: "steps.load.outputs.parameters.raw"
"#,
    )
    .expect("compile");

    // `load` never declared `raw`, the downstream reference added it.
    assert_eq!(flow.nodes["load"].outputs, ["raw".to_string()]);
    assert_eq!(flow.specs["load"].output_names(), ["raw".to_string()]);
}

#[test]
fn cycles_fail_compilation() {
    let err = compile(
        r#"
pipeline:
  name: cyclic
  steps:
    - name: a
      component: table
      method: load
      depends_on: [b]
    - name: b
      component: table
      method: load
      depends_on: [a]
"#,
    )
    .expect_err("cycle");
    match err {
        Error::Graph(GraphSystemError::CycleDetected { cycle_path }) => {
            assert!(cycle_path.iter().any(|n| n == "a"));
            assert!(cycle_path.iter().any(|n| n == "b"));
        }
        other => panic!("expected CycleDetected, got {:?}", other),
    }
}

#[test]
fn unknown_references_fail_compilation() {
    let err = compile(
        r#"
pipeline:
  name: dangling
  steps:
    - name: clean
      component: table
      method: clean
      parameters:
        df: "steps.ghost.outputs.parameters.raw"
"#,
    )
    .expect_err("unknown reference");
    match err {
        Error::Graph(GraphSystemError::UnknownReference { step, referenced }) => {
            assert_eq!(step, "clean");
            assert_eq!(referenced, "ghost");
        }
        other => panic!("expected UnknownReference, got {:?}", other),
    }
}

#[test]
fn unknown_depends_on_fails_compilation() {
    let err = compile(
        r#"
pipeline:
  name: dangling
  steps:
    - name: clean
      component: table
      method: clean
      depends_on: [ghost]
"#,
    )
    .expect_err("unknown dependency");
    assert!(matches!(
        err,
        Error::Graph(GraphSystemError::UnknownReference { .. })
    ));
}

#[test]
fn empty_step_list_is_structural_error() {
    let err = compile(
        r#"
pipeline:
  name: hollow
  steps: []
"#,
    )
    .expect_err("empty");
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn method_chain_gets_one_handle_per_method() {
    let flow = compile(
        r#"
pipeline:
  name: chained
  steps:
    - name: crunch
      component: table
      method: [clean, stats]
"#,
    )
    .expect("compile");
    let node = &flow.nodes["crunch"];
    assert_eq!(node.handles.len(), 2);
    assert_eq!(node.handles[0].method(), "clean");
    assert_eq!(node.handles[1].method(), "stats");
    assert_eq!(node.handles[0].component(), "table");
}

#[test]
fn diamond_plan_layers() {
    let flow = compile(
        r#"
pipeline:
  name: diamond
  steps:
    - name: a
      component: table
      method: load
    - name: b
      component: table
      method: clean
      parameters:
        df: "steps.a.outputs.parameters.raw"
    - name: c
      component: table
      method: clean
      parameters:
        df: "steps.a.outputs.parameters.raw"
    - name: d
      component: table
      method: stats
      depends_on: [b, c]
"#,
    )
    .expect("compile");
    let layers: Vec<Vec<String>> = flow.plan.layers.iter().map(|l| l.nodes.clone()).collect();
    assert_eq!(
        layers,
        vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]
    );
    assert_eq!(flow.plan.max_parallelism, 2);
    assert_eq!(flow.plan.critical_path.len(), 3);
}
