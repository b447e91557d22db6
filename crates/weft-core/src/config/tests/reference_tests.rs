use serde_json::json;

use crate::config::reference::{OutputRef, ParamValue};

#[test]
fn parses_the_canonical_form() {
    let output_ref = OutputRef::parse("steps.load.outputs.parameters.raw").expect("ref");
    assert_eq!(output_ref.step, "load");
    assert_eq!(output_ref.output, "raw");
    assert_eq!(output_ref.dataset_name(), "load__raw");
}

#[test]
fn rejects_malformed_forms() {
    assert!(OutputRef::parse("steps.load.outputs.raw").is_none());
    assert!(OutputRef::parse("step.load.outputs.parameters.raw").is_none());
    assert!(OutputRef::parse("steps.load.outputs.parameters.raw.extra").is_none());
    assert!(OutputRef::parse("steps..outputs.parameters.raw").is_none());
    assert!(OutputRef::parse("just a string").is_none());
}

#[test]
fn string_values_classify_as_refs() {
    let value = ParamValue::from_value(json!("steps.load.outputs.parameters.raw"));
    assert_eq!(
        value.as_ref().map(|r| r.dataset_name()),
        Some("load__raw".to_string())
    );
}

#[test]
fn tagged_objects_classify_as_refs() {
    let value = ParamValue::from_value(json!({
        "__ref__": "steps.load.outputs.parameters.raw"
    }));
    assert!(value.as_ref().is_some());

    // Extra keys demote the object to a literal.
    let value = ParamValue::from_value(json!({
        "__ref__": "steps.load.outputs.parameters.raw",
        "note": "keep me"
    }));
    assert!(value.as_literal().is_some());
}

#[test]
fn ordinary_values_stay_literal() {
    assert!(ParamValue::from_value(json!(42)).as_literal().is_some());
    assert!(ParamValue::from_value(json!("in.csv")).as_literal().is_some());
    assert!(ParamValue::from_value(json!([1, 2])).as_literal().is_some());
}

#[test]
fn display_round_trips() {
    let text = "steps.load.outputs.parameters.raw";
    let output_ref = OutputRef::parse(text).expect("ref");
    assert_eq!(output_ref.to_string(), text);
}
