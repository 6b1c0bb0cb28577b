//! The single-consumer observer event stream (spec §6). Optional: a run
//! with no observer attached simply drops these events.
use crate::logging::LogLine;
use chrono::{DateTime, Utc};
use flow_core::{ResultType, TaskStatus};
use serde::Serialize;
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub flow_id: String,
    pub action: String,
    pub status: TaskStatus,
    pub success: bool,
    pub result_type: Option<ResultType>,
    pub result: Option<Json>,
    pub error: Option<String>,
}

impl From<&flow_core::Task> for TaskSnapshot {
    fn from(task: &flow_core::Task) -> Self {
        Self {
            id: task.id.clone(),
            flow_id: task.flow_id.clone(),
            action: task.action.clone(),
            status: task.status,
            success: task.success,
            result_type: task.result_type,
            result: task.result.clone(),
            error: task.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Event {
    FlowLoaded { flow_id: String, task_count: usize, at: DateTime<Utc> },
    FlowStarted { flow_id: String, at: DateTime<Utc> },
    FlowFinished { flow_id: String, success: bool, at: DateTime<Utc> },
    TaskStarted { task: TaskSnapshot, at: DateTime<Utc> },
    TaskCompleted { task: TaskSnapshot, at: DateTime<Utc> },
    TaskFailed { task: TaskSnapshot, at: DateTime<Utc> },
    TaskLog { task_id: String, line: LogLine, at: DateTime<Utc> },
}

/// Implemented by whatever is watching a run: a CLI progress printer, a
/// test harness, a UI backend. The orchestrator never blocks on this.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: Event);
}

/// The default no-op observer, used when the caller attaches none.
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&self, _event: Event) {}
}
