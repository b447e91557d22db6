use serde_json::json;

use crate::registry::error::RegistrySystemError;
use crate::registry::style::{InputShape, InputStylePolicy};

#[test]
fn parse_recognizes_documented_values() {
    assert_eq!(
        InputStylePolicy::parse("strict_single"),
        Some(InputStylePolicy::StrictSingle)
    );
    assert_eq!(
        InputStylePolicy::parse("allow_list"),
        Some(InputStylePolicy::AllowList)
    );
    assert_eq!(
        InputStylePolicy::parse("enforce_list"),
        Some(InputStylePolicy::EnforceList)
    );
    assert_eq!(InputStylePolicy::parse("whatever"), None);
}

#[test]
fn strict_single_rejects_disguised_lists() {
    let policy = InputStylePolicy::StrictSingle;
    match policy.check_primary("c::e::m", InputShape::Single, json!([42])) {
        Err(RegistrySystemError::InputStyle { reason, .. }) => {
            assert!(reason.contains("one-element list"));
        }
        other => panic!("expected InputStyle error, got {:?}", other),
    }
    assert_eq!(
        policy
            .check_primary("c::e::m", InputShape::Single, json!(42))
            .expect("plain value"),
        json!(42)
    );
}

#[test]
fn allow_list_unwraps_single_element() {
    let policy = InputStylePolicy::AllowList;
    assert_eq!(
        policy
            .check_primary("c::e::m", InputShape::Single, json!([42]))
            .expect("unwrap"),
        json!(42)
    );
    assert!(policy
        .check_primary("c::e::m", InputShape::Single, json!([1, 2]))
        .is_err());
    // A bare value arriving at a list-shaped method gets wrapped.
    assert_eq!(
        policy
            .check_primary("c::e::m", InputShape::List, json!(7))
            .expect("wrap"),
        json!([7])
    );
}

#[test]
fn enforce_list_requires_lists() {
    let policy = InputStylePolicy::EnforceList;
    assert!(policy
        .check_primary("c::e::m", InputShape::Single, json!(42))
        .is_err());
    assert_eq!(
        policy
            .check_primary("c::e::m", InputShape::Single, json!([42]))
            .expect("unwrap"),
        json!(42)
    );
    assert!(policy
        .check_primary("c::e::m", InputShape::List, json!(42))
        .is_err());
}

#[test]
fn any_shape_passes_through() {
    for policy in [
        InputStylePolicy::StrictSingle,
        InputStylePolicy::AllowList,
        InputStylePolicy::EnforceList,
    ] {
        assert_eq!(
            policy
                .check_primary("c::e::m", InputShape::Any, json!([1, 2, 3]))
                .expect("pass-through"),
            json!([1, 2, 3])
        );
    }
}
