//! End-to-end scenarios from spec §8's concrete-scenario list, driven
//! through the real loader + orchestrator + built-in actions.
use flow_core::document::load;
use flow_engine::actions::register_builtins;
use flow_engine::artifact::ArtifactAllocator;
use flow_engine::observer::NullObserver;
use flow_engine::orchestrator::{RunRequest, Selectors};
use flow_engine::registry::ActionRegistryBuilder;
use flow_engine::Orchestrator;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn scratch_dir(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("flow-engine-scenario-{}-{}", name, std::process::id()));
  let _ = fs::remove_dir_all(&dir);
  fs::create_dir_all(&dir).expect("create scratch dir");
  dir
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, contents).expect("write fixture");
  path
}

fn orchestrator(logs_dir: &Path, root_flow_name: &str) -> Arc<Orchestrator> {
  let registry = register_builtins(ActionRegistryBuilder::new()).freeze();
  let artifacts = ArtifactAllocator::new(logs_dir.to_path_buf(), root_flow_name);
  Orchestrator::new(registry, artifacts, Arc::new(NullObserver), 4)
}

#[tokio::test]
async fn variables_inter_variable_substitution() {
  let dir = scratch_dir("inter-var");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "t1", "action": "VARIABLES", "vars": [
          {"name": "a", "type": "string", "value": "x"},
          {"name": "b", "type": "string", "value": "y-${a}"}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("a").unwrap().raw_json(), serde_json::json!("x"));
  assert_eq!(outcome.variables.get("b").unwrap().raw_json(), serde_json::json!("y-x"));
}

#[tokio::test]
async fn variables_numeric_math_operation() {
  let dir = scratch_dir("numeric-math");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "seed", "action": "VARIABLES", "vars": [
          {"name": "counter", "type": "number", "value": 10},
          {"name": "step", "type": "number", "value": 2}
        ]},
        {"id": "bump", "action": "VARIABLES", "overwrite": true, "vars": [
          {"name": "counter", "type": "number", "operation": {"operator": "add", "variable": "step"}}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("counter").unwrap().raw_json(), serde_json::json!(12.0));
}

#[tokio::test]
async fn for_numeric_decrement_stops_at_last_value_holding_the_condition() {
  let dir = scratch_dir("for-numeric");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "loop", "action": "FOR", "variable": "c", "initial": 5, "step": -2,
         "condition": {"operator": ">=", "value": 0}, "tasks": []}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("c").unwrap().raw_json(), serde_json::json!(1.0));
}

#[tokio::test]
async fn for_values_honours_max_iterations() {
  let dir = scratch_dir("for-values");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "loop", "action": "FOR", "variable": "v", "values": ["a", "b", "c"],
         "max_iterations": 2, "tasks": []}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("v").unwrap().raw_json(), serde_json::json!("b"));
}

#[tokio::test]
async fn parallel_last_write_wins_honours_merge_order() {
  let dir = scratch_dir("parallel-lww");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "fan", "action": "PARALLEL", "merge_order": ["b", "a"], "tasks": [
          {"id": "a", "action": "VARIABLES", "vars": [{"name": "shared", "type": "string", "value": "from-a"}]},
          {"id": "b", "action": "VARIABLES", "vars": [{"name": "shared", "type": "string", "value": "from-b"}]}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("shared").unwrap().raw_json(), serde_json::json!("from-a"));
}

#[tokio::test]
async fn parallel_fail_on_conflict_rejects_divergent_writes() {
  let dir = scratch_dir("parallel-conflict");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "fan", "action": "PARALLEL", "merge_strategy": "fail_on_conflict", "tasks": [
          {"id": "a", "action": "VARIABLES", "vars": [{"name": "shared", "type": "string", "value": "from-a"}]},
          {"id": "b", "action": "VARIABLES", "vars": [{"name": "shared", "type": "string", "value": "from-b"}]}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_some());
  assert!(!outcome.variables.contains("shared"));
}

#[tokio::test]
async fn parallel_merge_ignores_a_subtask_that_never_wrote_the_shared_variable() {
  let dir = scratch_dir("parallel-untouched");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "seed", "action": "VARIABLES", "vars": [{"name": "counter", "type": "number", "value": 10}]},
        {"id": "fan", "action": "PARALLEL", "merge_order": ["a", "b"], "tasks": [
          {"id": "a", "action": "VARIABLES", "overwrite": true, "vars": [{"name": "counter", "type": "number", "value": 11}]},
          {"id": "b", "action": "PRINT", "message": "does not touch counter"}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  // Subtask "b" inherited counter=10 from its pre-fan-out clone but never
  // wrote it; merging must not let that stale copy clobber "a"'s real
  // write of 11, regardless of merge_order placing "b" after "a".
  assert_eq!(outcome.variables.get("counter").unwrap().raw_json(), serde_json::json!(11.0));
}

#[tokio::test]
async fn evaluate_empty_left_array_short_circuits_to_else() {
  let dir = scratch_dir("evaluate-empty");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "seed", "action": "VARIABLES", "vars": [{"name": "items", "type": "array", "value": []}]},
        {"id": "check", "action": "EVALUATE",
         "if_conditions": [{"left": "${items}", "operation": "=", "right": "x"}],
         "then": {"continue": "matched"},
         "else": {"continue": "fell-through"}}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let logs_dir = dir.join("logs");
  let outcome = orchestrator(&logs_dir, &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_none());
  let check_task = outcome.tasks.iter().find(|t| t.id == "check").unwrap();
  assert_eq!(check_task.result, Some(serde_json::json!("fell-through")));

  let log_path = logs_dir.join("root").join("task-0002-check").join("task_log.json");
  let body: serde_json::Value = serde_json::from_str(&fs::read_to_string(&log_path).expect("read task log")).expect("parse task log");
  let lines = body["logs"].as_array().expect("logs array");
  assert!(lines.iter().any(|l| l["message"].as_str().unwrap_or_default().contains("items")));
}

#[tokio::test]
async fn on_error_flow_runs_cleanup_and_preserves_the_original_failure() {
  let dir = scratch_dir("on-error-flow");
  write(
    &dir,
    "cleanup.json",
    r#"{
      "id": "cleanup",
      "tasks": [{"id": "cleanup_task", "action": "PRINT", "message": "cleaned up"}]
    }"#,
  );
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "imports": ["cleanup.json"],
      "onErrorFlow": "cleanup",
      "tasks": [
        {"id": "a", "action": "VARIABLES", "vars": [{"name": "x", "type": "number", "operation": {"operator": "add", "variable": "missing"}}]},
        {"id": "b", "action": "PRINT", "message": "never reached"}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id)
    .run(&loaded, RunRequest::default())
    .await
    .expect("run");

  assert!(outcome.primary_error.is_some());
  let a = outcome.tasks.iter().find(|t| t.id == "a").unwrap();
  assert!(!a.success);
  let b = outcome.tasks.iter().find(|t| t.id == "b").unwrap();
  assert_eq!(b.status, flow_core::TaskStatus::NotStarted);
  let cleanup = outcome.tasks.iter().find(|t| t.id == "cleanup_task").unwrap();
  assert!(cleanup.success);
  assert_eq!(outcome.primary_error.as_deref(), a.error.as_deref());
}

#[tokio::test]
async fn run_subtask_id_executes_only_the_targeted_nested_subtask() {
  let dir = scratch_dir("run-subtask");
  let root = write(
    &dir,
    "root.json",
    r#"{
      "id": "root",
      "tasks": [
        {"id": "fan", "action": "PARALLEL", "tasks": [
          {"id": "only", "action": "VARIABLES", "vars": [{"name": "ran", "type": "bool", "value": true}]}
        ]}
      ]
    }"#,
  );

  let loaded = load(&root).expect("load");
  let request = RunRequest {
    selectors: Selectors { run_subtask_id: Some("only".into()), ..Default::default() },
    ..Default::default()
  };
  let outcome = orchestrator(&dir.join("logs"), &loaded.root_id).run(&loaded, request).await.expect("run");

  assert!(outcome.primary_error.is_none());
  assert_eq!(outcome.variables.get("ran").unwrap().raw_json(), serde_json::json!(true));
  let fan_task = outcome.tasks.iter().find(|t| t.id == "fan").unwrap();
  assert_eq!(fan_task.status, flow_core::TaskStatus::NotStarted);
}
