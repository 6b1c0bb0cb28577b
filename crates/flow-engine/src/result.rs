//! `Result` and control directives, the action interface's return value
//! (spec §6, §4.5).
use flow_core::ResultType;
use serde_json::Value as Json;

/// Out-of-band signal an action hands back to the orchestrator, alongside
/// its ordinary value.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlDirective {
    JumpToTask(String),
    Exit,
    BreakLoop,
}

/// The value an action produces, typed per spec §6: `value`, `type`,
/// optional `control`.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub value: Json,
    pub result_type: ResultType,
    pub control: Option<ControlDirective>,
}

impl ActionResult {
    pub fn new(value: Json, result_type: ResultType) -> Self {
        Self { value, result_type, control: None }
    }

    pub fn with_control(mut self, control: ControlDirective) -> Self {
        self.control = Some(control);
        self
    }

    pub fn json(value: Json) -> Self {
        Self::new(value, ResultType::Json)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Json::String(value.into()), ResultType::String)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(Json::Bool(value), ResultType::Bool)
    }
}
