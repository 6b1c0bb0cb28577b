use flow_core::{resolve_placeholders, ResultType, Task, TaskStatus, VarType, Variable, VariableStore, VariableValue};
use serde_json::json;

fn completed_task(id: &str, result: serde_json::Value) -> Task {
  Task {
    id: id.into(),
    description: String::new(),
    action: "HTTP".into(),
    flow_id: "root".into(),
    payload: json!({}),
    status: TaskStatus::Completed,
    success: true,
    start_timestamp: None,
    end_timestamp: None,
    duration_seconds: None,
    result_type: Some(ResultType::Json),
    result: Some(result),
    error: None,
  }
}

#[test]
fn whole_string_variable_placeholder_returns_typed_value() {
  let mut vars = VariableStore::new();
  vars.insert(Variable::new("count", VarType::Number, VariableValue::Number(7.0)).unwrap());
  let v = resolve_placeholders("${count}", &vars, &[]).expect("resolve");
  assert_eq!(v, json!(7.0));
}

#[test]
fn double_brace_style_is_equivalent_to_dollar_brace() {
  let mut vars = VariableStore::new();
  vars.insert(Variable::new("name", VarType::String, VariableValue::String("ada".into())).unwrap());
  let v = resolve_placeholders("{{name}}", &vars, &[]).expect("resolve");
  assert_eq!(v, json!("ada"));
}

#[test]
fn embedded_variable_placeholder_stringifies_into_text() {
  let mut vars = VariableStore::new();
  vars.insert(Variable::new("name", VarType::String, VariableValue::String("ada".into())).unwrap());
  let v = resolve_placeholders("hello ${name}!", &vars, &[]).expect("resolve");
  assert_eq!(v, json!("hello ada!"));
}

#[test]
fn secret_variable_masked_on_embedded_interpolation() {
  let mut vars = VariableStore::new();
  vars.insert(Variable::new("token", VarType::Secret, VariableValue::String("abc123".into())).unwrap());
  let v = resolve_placeholders("Authorization: Bearer ${token}", &vars, &[]).expect("resolve");
  assert_eq!(v, json!("Authorization: Bearer ****"));
}

#[test]
fn task_placeholder_whole_string_evaluates_json_path() {
  let tasks = vec![completed_task("fetch", json!({"user": {"name": "ada"}}))];
  let vars = VariableStore::new();
  let v = resolve_placeholders("${from.task:fetch$.user.name}", &vars, &tasks).expect("resolve");
  assert_eq!(v, json!("ada"));
}

#[test]
fn legacy_dotted_task_field_reads_result_type() {
  let tasks = vec![completed_task("fetch", json!({"ok": true}))];
  let vars = VariableStore::new();
  let v = resolve_placeholders("${from.task:fetch.resultType}", &vars, &tasks).expect("resolve");
  assert_eq!(v, json!("json"));
}

#[test]
fn task_placeholder_against_incomplete_task_is_an_error() {
  let mut task = completed_task("fetch", json!({}));
  task.status = TaskStatus::InProgress;
  let vars = VariableStore::new();
  let err = resolve_placeholders("${from.task:fetch$.ok}", &vars, &[task]).unwrap_err();
  assert!(err.to_string().contains("not completed"));
}

#[test]
fn undefined_variable_is_an_error() {
  let vars = VariableStore::new();
  let err = resolve_placeholders("${missing}", &vars, &[]).unwrap_err();
  assert!(err.to_string().contains("undefined variable"));
}
