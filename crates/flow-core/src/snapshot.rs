//! `RunSnapshot` (spec §3): the in-memory resume checkpoint written after
//! each task completes. There is no cross-restart persistence (spec
//! Non-goals) — a snapshot only outlives a single process's run.
use crate::task::{ResultType, Task, TaskStatus};
use crate::variable::{Variable, VariableStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultSnapshot {
    pub status: TaskStatus,
    pub success: bool,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub result_type: Option<ResultType>,
    pub result: Option<Json>,
}

impl From<&Task> for TaskResultSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            status: task.status,
            success: task.success,
            start_timestamp: task.start_timestamp,
            end_timestamp: task.end_timestamp,
            result_type: task.result_type,
            result: task.result.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub variables: IndexMap<String, Variable>,
    pub task_results: IndexMap<String, TaskResultSnapshot>,
}

impl RunSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current variable store and task list into a snapshot.
    /// Only tasks that have left `not_started` are recorded — a resume
    /// replays from the last completed task, not from tasks never reached.
    pub fn capture(vars: &VariableStore, tasks: &[Task]) -> Self {
        let variables = vars.iter().map(|(name, var)| (name.clone(), var.clone())).collect();
        let task_results = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::NotStarted)
            .map(|t| (t.id.clone(), TaskResultSnapshot::from(t)))
            .collect();
        Self { variables, task_results }
    }

    /// Rebuild a `VariableStore` from the snapshot, preserving the order the
    /// variables were captured in (`IndexMap` keeps insertion order, so a
    /// resumed run's snapshot serializes byte-identically to the run it
    /// came from, per spec §8's determinism property).
    pub fn restore_variables(&self) -> VariableStore {
        let mut store = VariableStore::new();
        for var in self.variables.values() {
            store.insert(var.clone());
        }
        store
    }

    /// Apply recorded task results back onto a freshly loaded task list, so
    /// a resumed run sees the same history it was checkpointed with.
    pub fn apply_to(&self, tasks: &mut [Task]) {
        for task in tasks.iter_mut() {
            if let Some(snapshot) = self.task_results.get(&task.id) {
                task.status = snapshot.status;
                task.success = snapshot.success;
                task.start_timestamp = snapshot.start_timestamp;
                task.end_timestamp = snapshot.end_timestamp;
                task.duration_seconds = match (snapshot.start_timestamp, snapshot.end_timestamp) {
                    (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
                    _ => None,
                };
                task.result_type = snapshot.result_type;
                task.result = snapshot.result.clone();
            }
        }
    }
}
