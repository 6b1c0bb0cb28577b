use flow_core::{coerce, VarType, VariableValue};
use serde_json::json;

#[test]
fn string_target_stringifies_non_strings() {
  let v = coerce(VarType::String, &json!(42)).expect("coerce");
  assert_eq!(v, VariableValue::String("42".into()));
}

#[test]
fn number_target_parses_numeric_strings() {
  let v = coerce(VarType::Number, &json!("3.5")).expect("coerce");
  assert_eq!(v, VariableValue::Number(3.5));
}

#[test]
fn number_target_rejects_empty_string() {
  let err = coerce(VarType::Number, &json!("   ")).unwrap_err();
  assert_eq!(err.to_string(), "empty value cannot be coerced to number");
}

#[test]
fn bool_target_accepts_one_and_zero_strings() {
  assert_eq!(coerce(VarType::Bool, &json!("1")).unwrap(), VariableValue::Bool(true));
  assert_eq!(coerce(VarType::Bool, &json!("0")).unwrap(), VariableValue::Bool(false));
}

#[test]
fn bool_target_rejects_unrecognized_string() {
  assert!(coerce(VarType::Bool, &json!("maybe")).is_err());
}

#[test]
fn array_target_requires_json_array() {
  assert!(coerce(VarType::Array, &json!("not an array")).is_err());
  let v = coerce(VarType::Array, &json!([1, 2])).expect("coerce");
  assert_eq!(v, VariableValue::Array(vec![json!(1), json!(2)]));
}

#[test]
fn proxy_target_from_plain_string_maps_to_http_key() {
  let v = coerce(VarType::Proxy, &json!("http://proxy:8080")).expect("coerce");
  match v {
    VariableValue::Proxy(map) => assert_eq!(map.get("http").map(String::as_str), Some("http://proxy:8080")),
    other => panic!("expected Proxy, got {:?}", other),
  }
}

#[test]
fn proxy_target_rejects_empty_value_for_a_key() {
  let err = coerce(VarType::Proxy, &json!({"http": ""})).unwrap_err();
  assert!(err.to_string().contains("empty value"));
}
