//! Per-task artifact directories (spec §6): `task_log.json` and
//! `environment_variables.json`, written after every task completion.
//! Directory allocation is guarded by a monotonic counter behind a mutex,
//! per spec §5's `task-NNNN-<sanitized-id>` naming rule.
use crate::logging::LogLine;
use flow_core::{Task, VariableStore};
use serde_json::{json, Value as Json};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

pub struct ArtifactAllocator {
    logs_dir: PathBuf,
    root_flow_name: String,
    counter: Mutex<u64>,
}

impl ArtifactAllocator {
    pub fn new(logs_dir: PathBuf, root_flow_name: impl Into<String>) -> Self {
        Self { logs_dir, root_flow_name: root_flow_name.into(), counter: Mutex::new(0) }
    }

    /// Allocate and create the directory for `task`'s artifacts, returning
    /// its path. `logs/<flow>/<subflow?>/task-NNNN-<task-id>/`.
    pub fn allocate(&self, task: &Task) -> std::io::Result<PathBuf> {
        let n = {
            let mut guard = self.counter.lock().unwrap_or_else(|e| e.into_inner());
            *guard += 1;
            *guard
        };

        let mut dir = self.logs_dir.join(sanitize(&self.root_flow_name));
        if task.flow_id != self.root_flow_name {
            dir = dir.join(sanitize(&task.flow_id));
        }
        dir = dir.join(format!("task-{:04}-{}", n, sanitize(&task.id)));

        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

pub fn write_task_log(dir: &Path, task: &Task, logs: &[LogLine]) -> std::io::Result<()> {
    let body = json!({
        "id": task.id,
        "description": task.description,
        "action": task.action,
        "status": task.status,
        "success": task.success,
        "start_timestamp": task.start_timestamp,
        "end_timestamp": task.end_timestamp,
        "duration_seconds": task.duration_seconds,
        "result_type": task.result_type,
        "result": task.result,
        "error": task.error,
        "logs": logs,
    });
    std::fs::write(dir.join("task_log.json"), serde_json::to_vec_pretty(&body)?)
}

/// `environment_variables.json`'s own masking token, distinct from the
/// `****` used everywhere else a secret is rendered.
const ENV_FILE_SECRET_PLACEHOLDER: &str = "<secret>";

pub fn write_environment_variables(dir: &Path, vars: &VariableStore) -> std::io::Result<()> {
    let mut out = serde_json::Map::new();
    for (name, var) in vars.iter() {
        let value: Json =
            if var.secret { Json::String(ENV_FILE_SECRET_PLACEHOLDER.to_string()) } else { var.raw_json() };
        out.insert(
            name.clone(),
            json!({
                "type": format!("{:?}", var.var_type).to_lowercase(),
                "secret": var.secret,
                "value": value,
            }),
        );
    }
    std::fs::write(dir.join("environment_variables.json"), serde_json::to_vec_pretty(&Json::Object(out))?)
}
