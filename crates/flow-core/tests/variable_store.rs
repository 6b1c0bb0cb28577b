use flow_core::{VarType, Variable, VariableStore, VariableValue};
use serde_json::json;

#[test]
fn secrets_are_masked_but_raw_value_is_retained() {
  let var = Variable::new("token", VarType::Secret, VariableValue::String("abc123".into())).expect("new");
  assert_eq!(var.masked_json(), json!("****"));
  assert_eq!(var.raw_json(), json!("abc123"));
}

#[test]
fn store_preserves_insertion_order() {
  let mut store = VariableStore::new();
  store.insert(Variable::new("b", VarType::String, VariableValue::String("2".into())).unwrap());
  store.insert(Variable::new("a", VarType::String, VariableValue::String("1".into())).unwrap());
  let names: Vec<&String> = store.iter().map(|(name, _)| name).collect();
  assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn masked_projection_hides_secret_values() {
  let mut store = VariableStore::new();
  store.insert(Variable::new("token", VarType::Secret, VariableValue::String("abc123".into())).unwrap());
  let projection = store.masked_projection();
  assert_eq!(projection["token"]["value"], json!("****"));
  assert_eq!(projection["token"]["secret"], json!(true));
}

#[test]
fn empty_name_after_trim_is_rejected() {
  let err = Variable::new("   ", VarType::String, VariableValue::String(String::new())).unwrap_err();
  assert_eq!(err.to_string(), "variable name is empty after trimming");
}
