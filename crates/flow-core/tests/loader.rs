use flow_core::{flows_for_execution, load};
use std::fs;
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("flow-core-loader-test-{}-{}", name, std::process::id()));
  let _ = fs::remove_dir_all(&dir);
  fs::create_dir_all(&dir).expect("create scratch dir");
  dir
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, contents).expect("write fixture");
  path
}

#[test]
fn imports_are_flattened_before_local_tasks() {
  let dir = scratch_dir("flatten");
  write(
    &dir,
    "child.json",
    r#"{"id": "child", "tasks": [{"id": "t1", "action": "PRINT"}]}"#,
  );
  let root = write(
    &dir,
    "root.json",
    r#"{"id": "root", "imports": ["child.json"], "tasks": [{"id": "t2", "action": "PRINT"}]}"#,
  );

  let loaded = load(&root).expect("load");
  assert_eq!(loaded.tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["t1", "t2"]);
  assert_eq!(loaded.flow_imports.get("root").unwrap(), &vec!["child".to_string()]);
}

#[test]
fn cycle_between_two_documents_is_fatal() {
  let dir = scratch_dir("cycle");
  write(&dir, "a.json", r#"{"id": "a", "imports": ["b.json"], "tasks": []}"#);
  write(&dir, "b.json", r#"{"id": "b", "imports": ["a.json"], "tasks": []}"#);
  let root = dir.join("a.json");

  let err = load(&root).unwrap_err();
  assert!(matches!(err, flow_core::LoadError::CycleDetected(_)));
}

#[test]
fn duplicate_task_id_across_documents_is_an_error() {
  let dir = scratch_dir("dup-task");
  write(&dir, "child.json", r#"{"id": "child", "tasks": [{"id": "same", "action": "PRINT"}]}"#);
  let root = write(
    &dir,
    "root.json",
    r#"{"id": "root", "imports": ["child.json"], "tasks": [{"id": "same", "action": "PRINT"}]}"#,
  );

  let err = load(&root).unwrap_err();
  assert!(matches!(err, flow_core::LoadError::DuplicateTaskId(ref id) if id == "same"));
}

#[test]
fn unknown_on_error_flow_is_rejected() {
  let dir = scratch_dir("bad-onerror");
  let root = write(
    &dir,
    "root.json",
    r#"{"id": "root", "onErrorFlow": "nope", "tasks": [{"id": "t1", "action": "PRINT"}]}"#,
  );

  let err = load(&root).unwrap_err();
  assert!(matches!(err, flow_core::LoadError::UnknownOnError(ref id) if id == "nope"));
}

#[test]
fn finally_task_must_exist_in_flattened_sequence() {
  let dir = scratch_dir("bad-finally-task");
  let root = write(
    &dir,
    "root.json",
    r#"{"id": "root", "finallyTask": "nope", "tasks": [{"id": "t1", "action": "PRINT"}]}"#,
  );

  let err = load(&root).unwrap_err();
  assert!(matches!(err, flow_core::LoadError::UnknownFinally(ref id) if id == "nope"));
}

#[test]
fn flows_for_execution_returns_transitive_closure() {
  let dir = scratch_dir("closure");
  write(&dir, "leaf.json", r#"{"id": "leaf", "tasks": []}"#);
  write(&dir, "mid.json", r#"{"id": "mid", "imports": ["leaf.json"], "tasks": []}"#);
  let root = write(
    &dir,
    "root.json",
    r#"{"id": "root", "imports": ["mid.json"], "tasks": []}"#,
  );

  let loaded = load(&root).expect("load");
  let mut closure = flows_for_execution(&loaded.flow_imports, "root").expect("closure");
  closure.sort();
  assert_eq!(closure, vec!["leaf".to_string(), "mid".to_string(), "root".to_string()]);
}

#[test]
fn unknown_flow_id_in_closure_lookup_is_an_error() {
  let dir = scratch_dir("closure-unknown");
  let root = write(&dir, "root.json", r#"{"id": "root", "tasks": []}"#);
  let loaded = load(&root).expect("load");

  let err = flows_for_execution(&loaded.flow_imports, "ghost").unwrap_err();
  assert!(matches!(err, flow_core::LoadError::UnknownFlow(ref id) if id == "ghost"));
}
