//! Errors surfaced by the orchestrator and its actions. Low-level
//! `flow_core` errors are wrapped with `#[from]`, mirroring the teacher's
//! `FlowError`/`WorkflowError` split.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Errors from the data-model crate: loading, coercion, placeholders,
    /// JSON-path evaluation.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Selector conflicts, detected before any task runs (spec §4.5).
    #[error("invalid selector combination: {0}")]
    SelectorConflict(String),

    /// `task.action` has no registered implementation.
    #[error("unsupported action '{0}'")]
    UnsupportedAction(String),

    /// `jumpToTaskId`/`finallyTask`/`finallyFlow` referencing an id not in
    /// the flattened sequence.
    #[error("control-flow error: {0}")]
    ControlFlow(String),

    /// A PARALLEL task's `fail_on_conflict` merge hit a genuine conflict.
    #[error("merge conflict on variable '{name}': '{first_origin}' and '{second_origin}' wrote different values")]
    MergeConflict { name: String, first_origin: String, second_origin: String },

    /// An action's own `execute` returned an error.
    #[error("action failed: {0}")]
    Action(String),

    /// The run's cancellation flag tripped while this task was suspended.
    #[error("task cancelled")]
    Cancelled,

    /// A composite's subtask lookup was ambiguous or not found
    /// (`run-subtask`, spec §4.5).
    #[error("subtask error: {0}")]
    Subtask(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Re-exported so callers don't need a direct `flow_core` dependency just
/// to name the wrapped error type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Load(#[from] flow_core::LoadError),
    #[error(transparent)]
    Variable(#[from] flow_core::VariableError),
    #[error(transparent)]
    Placeholder(#[from] flow_core::PlaceholderError),
    #[error(transparent)]
    Coercion(#[from] flow_core::CoercionError),
    #[error(transparent)]
    JsonPath(#[from] flow_core::JsonPathError),
}

impl From<flow_core::LoadError> for EngineError {
    fn from(e: flow_core::LoadError) -> Self {
        EngineError::Core(CoreError::Load(e))
    }
}
impl From<flow_core::VariableError> for EngineError {
    fn from(e: flow_core::VariableError) -> Self {
        EngineError::Core(CoreError::Variable(e))
    }
}
impl From<flow_core::PlaceholderError> for EngineError {
    fn from(e: flow_core::PlaceholderError) -> Self {
        EngineError::Core(CoreError::Placeholder(e))
    }
}
impl From<flow_core::CoercionError> for EngineError {
    fn from(e: flow_core::CoercionError) -> Self {
        EngineError::Core(CoreError::Coercion(e))
    }
}
impl From<flow_core::JsonPathError> for EngineError {
    fn from(e: flow_core::JsonPathError) -> Self {
        EngineError::Core(CoreError::JsonPath(e))
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
