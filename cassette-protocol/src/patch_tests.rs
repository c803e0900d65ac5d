use super::*;
use serde_json::json;

fn op(raw: serde_json::Value) -> PatchOperation {
    serde_json::from_value(raw).unwrap()
}

#[test]
fn test_replace_does_not_touch_input() {
    let snapshot = json!({"a": 1});
    let outcome = apply_patch(&snapshot, &[PatchOperation::replace("/a", json!(2))]).unwrap();

    assert_eq!(outcome.document, json!({"a": 2}));
    assert_eq!(snapshot, json!({"a": 1}));
    assert!(outcome.skipped.is_empty());
}

#[test]
fn test_unsupported_op_is_skipped_and_rest_applied() {
    let snapshot = json!({"a": 1});
    let ops = vec![
        PatchOperation::add("/b", json!(5)),
        op(json!({"op": "move", "from": "/a", "path": "/c"})),
        PatchOperation::replace("/a", json!(3)),
    ];

    let outcome = apply_patch(&snapshot, &ops).unwrap();

    assert_eq!(outcome.document, json!({"a": 3, "b": 5}));
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].op, PatchOpKind::Move);
}

#[test]
fn test_every_non_mutating_op_is_skipped() {
    let ops = vec![
        op(json!({"op": "copy", "from": "/a", "path": "/b"})),
        op(json!({"op": "test", "path": "/a", "value": 1})),
        op(json!({"op": "increment", "path": "/a"})),
    ];

    let outcome = apply_patch(&json!({"a": 1}), &ops).unwrap();

    assert_eq!(outcome.document, json!({"a": 1}));
    let names: Vec<&str> = outcome.skipped.iter().map(|o| o.op.as_str()).collect();
    assert_eq!(names, vec!["copy", "test", "increment"]);
}

#[test]
fn test_nested_add_and_remove() {
    let snapshot = json!({"stats": {"lines": 10, "chars": 200}});
    let ops = vec![
        PatchOperation::add("/stats/fixes", json!(3)),
        PatchOperation::remove("/stats/chars"),
    ];

    let outcome = apply_patch(&snapshot, &ops).unwrap();
    assert_eq!(outcome.document, json!({"stats": {"lines": 10, "fixes": 3}}));
}

#[test]
fn test_empty_segments_are_ignored() {
    let outcome = apply_patch(
        &json!({"a": {"b": 1}}),
        &[PatchOperation::replace("//a//b/", json!(2))],
    )
    .unwrap();
    assert_eq!(outcome.document, json!({"a": {"b": 2}}));
}

#[test]
fn test_escaped_segments() {
    let outcome = apply_patch(
        &json!({}),
        &[
            PatchOperation::add("/src~1main.py", json!("x")),
            PatchOperation::add("/a~0b", json!("y")),
        ],
    )
    .unwrap();
    assert_eq!(outcome.document, json!({"src/main.py": "x", "a~b": "y"}));
}

#[test]
fn test_missing_intermediate_fails_without_partial_result() {
    let snapshot = json!({"a": 1});
    let ops = vec![
        PatchOperation::add("/b", json!(2)),
        PatchOperation::add("/missing/leaf", json!(3)),
    ];

    let err = apply_patch(&snapshot, &ops).unwrap_err();
    assert_eq!(
        err,
        PatchError::PathNotFound {
            path: "/missing/leaf".to_string(),
            segment: "missing".to_string(),
        }
    );
    assert_eq!(snapshot, json!({"a": 1}));
}

#[test]
fn test_descending_into_scalar_fails() {
    let err = apply_patch(
        &json!({"phase": "done"}),
        &[PatchOperation::add("/phase/detail", json!(1))],
    )
    .unwrap_err();
    assert!(matches!(err, PatchError::NotAContainer { .. }));
}

#[test]
fn test_array_leaf_assignment() {
    let snapshot = json!({"steps": ["plan", "gen"]});
    let ops = vec![
        PatchOperation::replace("/steps/0", json!("planning")),
        PatchOperation::add("/steps/2", json!("validate")),
        PatchOperation::add("/steps/-", json!("secure")),
    ];

    let outcome = apply_patch(&snapshot, &ops).unwrap();
    assert_eq!(
        outcome.document,
        json!({"steps": ["planning", "gen", "validate", "secure"]})
    );
}

#[test]
fn test_array_index_past_end_fails() {
    let err = apply_patch(
        &json!({"steps": []}),
        &[PatchOperation::add("/steps/3", json!("x"))],
    )
    .unwrap_err();
    assert_eq!(
        err,
        PatchError::IndexOutOfBounds {
            path: "/steps/3".to_string(),
            index: 3,
            len: 0,
        }
    );
}

#[test]
fn test_array_remove_leaves_hole() {
    let outcome = apply_patch(
        &json!({"steps": ["a", "b", "c"]}),
        &[PatchOperation::remove("/steps/1")],
    )
    .unwrap();
    assert_eq!(outcome.document, json!({"steps": ["a", null, "c"]}));
}

#[test]
fn test_nested_path_through_array() {
    let snapshot = json!({"workflow": [{"id": "code_gen", "status": "pending"}]});
    let outcome = apply_patch(
        &snapshot,
        &[PatchOperation::replace("/workflow/0/status", json!("active"))],
    )
    .unwrap();
    assert_eq!(
        outcome.document,
        json!({"workflow": [{"id": "code_gen", "status": "active"}]})
    );
}

#[test]
fn test_root_path_targets_whole_document() {
    let replaced = apply_patch(&json!({"a": 1}), &[PatchOperation::replace("", json!({"b": 2}))])
        .unwrap();
    assert_eq!(replaced.document, json!({"b": 2}));

    let removed = apply_patch(&json!({"a": 1}), &[PatchOperation::remove("/")]).unwrap();
    assert_eq!(removed.document, json!({}));
}

#[test]
fn test_remove_missing_key_is_noop() {
    let outcome = apply_patch(&json!({"a": 1}), &[PatchOperation::remove("/zzz")]).unwrap();
    assert_eq!(outcome.document, json!({"a": 1}));
}

#[test]
fn test_missing_value_is_null() {
    let outcome = apply_patch(&json!({}), &[op(json!({"op": "add", "path": "/x"}))]).unwrap();
    assert_eq!(outcome.document, json!({"x": null}));
}

#[test]
fn test_op_kind_round_trips_unknown_names() {
    let parsed = op(json!({"op": "increment", "path": "/a"}));
    assert_eq!(parsed.op, PatchOpKind::Other("increment".to_string()));
    assert!(!parsed.op.is_supported());
    assert_eq!(serde_json::to_value(&parsed).unwrap()["op"], "increment");
}
