//! The flow loader and import resolver: `FlowDocument`/`FlowImports`
//! (spec §3), loaded into a single flat task sequence (spec §4.1).
use crate::errors::LoadError;
use crate::task::{Task, TaskStatus};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// document-id -> list of directly imported document-ids.
pub type FlowImports = HashMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct LoadedFlow {
    pub root_id: String,
    pub tasks: Vec<Task>,
    pub flow_imports: FlowImports,
    pub on_error_flow: Option<String>,
    pub finally_flow: Option<String>,
    pub finally_task: Option<String>,
}

struct RawDoc {
    id: String,
    imports: Vec<String>,
    tasks: Vec<Json>,
    on_error_flow: Option<String>,
    finally_flow: Option<String>,
    finally_task: Option<String>,
}

fn required_str(obj: &serde_json::Map<String, Json>, field: &str, path: &Path) -> Result<String, LoadError> {
    obj.get(field)
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LoadError::MissingField { path: path.display().to_string(), field: field.to_string() })
}

fn parse_document(path: &Path, raw: &str) -> Result<RawDoc, LoadError> {
    let json: Json = serde_json::from_str(raw).map_err(|e| LoadError::ParseError(format!("{}: {}", path.display(), e)))?;
    let obj = json
        .as_object()
        .ok_or_else(|| LoadError::SchemaError(format!("{}: document must be a json object", path.display())))?;

    let id = required_str(obj, "id", path)?;

    let imports = match obj.get("imports") {
        None => Vec::new(),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| LoadError::SchemaError(format!("{}: imports entries must be strings", path.display())))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(LoadError::SchemaError(format!("{}: imports must be an array", path.display()))),
    };

    let tasks = match obj.get("tasks") {
        None => Vec::new(),
        Some(Json::Array(items)) => items.clone(),
        Some(_) => return Err(LoadError::SchemaError(format!("{}: tasks must be an array", path.display()))),
    };

    let on_error_flow = obj.get("onErrorFlow").and_then(Json::as_str).map(str::to_string);
    let finally_flow = obj.get("finallyFlow").and_then(Json::as_str).map(str::to_string);
    let finally_task = obj.get("finallyTask").and_then(Json::as_str).map(str::to_string);

    Ok(RawDoc { id, imports, tasks, on_error_flow, finally_flow, finally_task })
}

fn task_from_json(flow_id: &str, raw: &Json, doc_path: &Path) -> Result<Task, LoadError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| LoadError::SchemaError(format!("{}: task entries must be json objects", doc_path.display())))?;
    let id = required_str(obj, "id", doc_path)?;
    let action = required_str(obj, "action", doc_path)?;
    let description = obj.get("description").and_then(Json::as_str).unwrap_or("").to_string();

    Ok(Task {
        id,
        description,
        action,
        flow_id: flow_id.to_string(),
        payload: raw.clone(),
        status: TaskStatus::NotStarted,
        success: false,
        start_timestamp: None,
        end_timestamp: None,
        duration_seconds: None,
        result_type: None,
        result: None,
        error: None,
    })
}

fn load_document(
    path: &Path,
    stack: &mut Vec<PathBuf>,
    registered_ids: &mut HashMap<String, PathBuf>,
    flow_imports: &mut FlowImports,
) -> Result<(RawDoc, Vec<Task>), LoadError> {
    let canonical = fs::canonicalize(path).map_err(|e| LoadError::IoError(format!("{}: {}", path.display(), e)))?;

    if stack.contains(&canonical) {
        return Err(LoadError::CycleDetected(canonical.display().to_string()));
    }
    stack.push(canonical.clone());

    let raw_text = fs::read_to_string(&canonical).map_err(|e| LoadError::IoError(format!("{}: {}", canonical.display(), e)))?;
    let doc = match parse_document(&canonical, &raw_text) {
        Ok(doc) => doc,
        Err(e) => {
            stack.pop();
            return Err(e);
        }
    };

    if let Some(existing) = registered_ids.get(&doc.id) {
        if existing != &canonical {
            stack.pop();
            return Err(LoadError::DuplicateDocumentId(doc.id.clone()));
        }
    } else {
        registered_ids.insert(doc.id.clone(), canonical.clone());
    }
    flow_imports.entry(doc.id.clone()).or_default();

    let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let mut flattened = Vec::new();

    for import in &doc.imports {
        let import_path = base_dir.join(import);
        let (imported_doc, imported_tasks) = load_document(&import_path, stack, registered_ids, flow_imports)?;
        flow_imports.entry(doc.id.clone()).or_default().push(imported_doc.id.clone());
        flattened.extend(imported_tasks);
    }

    for raw_task in &doc.tasks {
        flattened.push(task_from_json(&doc.id, raw_task, &canonical)?);
    }

    stack.pop();
    Ok((doc, flattened))
}

/// Load a root document and its transitive imports into a single flat task
/// sequence, per spec §4.1.
pub fn load(root_path: &Path) -> Result<LoadedFlow, LoadError> {
    let mut stack = Vec::new();
    let mut registered_ids = HashMap::new();
    let mut flow_imports = FlowImports::new();

    let (root_doc, tasks) = load_document(root_path, &mut stack, &mut registered_ids, &mut flow_imports)?;

    let mut seen_ids = HashSet::new();
    for task in &tasks {
        if !seen_ids.insert(task.id.clone()) {
            return Err(LoadError::DuplicateTaskId(task.id.clone()));
        }
    }

    if let Some(on_error) = &root_doc.on_error_flow {
        if !flow_imports.contains_key(on_error) {
            return Err(LoadError::UnknownOnError(on_error.clone()));
        }
    }
    if let Some(finally_flow) = &root_doc.finally_flow {
        if !flow_imports.contains_key(finally_flow) {
            return Err(LoadError::UnknownFinally(finally_flow.clone()));
        }
    }
    if let Some(finally_task) = &root_doc.finally_task {
        if !tasks.iter().any(|t| &t.id == finally_task) {
            return Err(LoadError::UnknownFinally(finally_task.clone()));
        }
    }

    Ok(LoadedFlow {
        root_id: root_doc.id,
        tasks,
        flow_imports,
        on_error_flow: root_doc.on_error_flow,
        finally_flow: root_doc.finally_flow,
        finally_task: root_doc.finally_task,
    })
}

/// DFS transitive closure of `flow_imports` starting at `flow_id`
/// (spec §4.1 `FlowsForExecution`).
pub fn flows_for_execution(flow_imports: &FlowImports, flow_id: &str) -> Result<Vec<String>, LoadError> {
    if !flow_imports.contains_key(flow_id) {
        return Err(LoadError::UnknownFlow(flow_id.to_string()));
    }
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut to_visit = vec![flow_id.to_string()];
    while let Some(id) = to_visit.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        order.push(id.clone());
        if let Some(children) = flow_imports.get(&id) {
            for child in children {
                to_visit.push(child.clone());
            }
        }
    }
    Ok(order)
}
