//! PRINT: render a templated message against the active variables/task
//! results and log it. Payload is expanded against placeholders here (not
//! pre-expanded by the orchestrator, per spec §4.5c) so secrets inside the
//! template still go through the masking path.
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::registry::Action;
use crate::result::ActionResult;
use async_trait::async_trait;
use flow_core::resolve_placeholders;
use serde_json::Value as Json;

pub struct PrintAction;

#[derive(serde::Deserialize)]
struct Payload {
    message: String,
}

#[async_trait]
impl Action for PrintAction {
    fn name(&self) -> &'static str {
        "PRINT"
    }

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<ActionResult> {
        let payload: Payload = serde_json::from_value(payload.clone()).map_err(EngineError::Json)?;
        let resolved = resolve_placeholders(&payload.message, &ctx.variables, &ctx.visible_tasks)?;
        let text = match &resolved {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        ctx.logger.log(&text);
        Ok(ActionResult::string(text))
    }
}
