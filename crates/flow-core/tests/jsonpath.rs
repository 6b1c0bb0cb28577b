use flow_core::{evaluate_json_path, unwrap_single};
use serde_json::json;

#[test]
fn dotted_field_access() {
  let root = json!({"user": {"name": "ada"}});
  let v = evaluate_json_path(&root, "$.user.name").expect("evaluate");
  assert_eq!(v, json!("ada"));
}

#[test]
fn bracket_index_access() {
  let root = json!({"items": ["a", "b", "c"]});
  let v = evaluate_json_path(&root, "$.items[1]").expect("evaluate");
  assert_eq!(v, json!("b"));
}

#[test]
fn quoted_bracket_field_access() {
  let root = json!({"weird key": 42});
  let v = evaluate_json_path(&root, "$[\"weird key\"]").expect("evaluate");
  assert_eq!(v, json!(42));
}

#[test]
fn wildcard_over_array() {
  let root = json!({"items": [{"n": 1}, {"n": 2}]});
  let v = evaluate_json_path(&root, "$.items[*].n").expect("evaluate");
  assert_eq!(v, json!([1, 2]));
}

#[test]
fn filter_expression_selects_matching_items() {
  let root = json!({"items": [{"status": "ok"}, {"status": "failed"}, {"status": "ok"}]});
  let v = evaluate_json_path(&root, "$.items[?(@.status == 'ok')]").expect("evaluate");
  assert_eq!(v, json!([{"status": "ok"}, {"status": "ok"}]));
}

#[test]
fn empty_filter_result_unwraps_to_empty_array() {
  let root = json!({"items": []});
  let v = evaluate_json_path(&root, "$.items[?(@.status == 'ok')]").expect("evaluate");
  assert_eq!(v, json!([]));
}

#[test]
fn length_tail_function_on_array() {
  let root = json!({"items": [1, 2, 3]});
  let v = evaluate_json_path(&root, "$.items.length()").expect("evaluate");
  assert_eq!(v, json!(3));
}

#[test]
fn unnormalized_path_without_dollar_still_resolves() {
  let root = json!({"name": "ada"});
  let v = evaluate_json_path(&root, "name").expect("evaluate");
  assert_eq!(v, json!("ada"));
}

#[test]
fn single_element_array_unwraps_recursively() {
  let v = unwrap_single(&json!([[["only"]]]));
  assert_eq!(v, json!("only"));
}

#[test]
fn multi_element_array_is_not_unwrapped() {
  let v = unwrap_single(&json!(["a", "b"]));
  assert_eq!(v, json!(["a", "b"]));
}

#[test]
fn unknown_field_is_an_error() {
  let root = json!({"a": 1});
  let err = evaluate_json_path(&root, "$.missing").unwrap_err();
  assert!(err.to_string().contains("missing"));
}
