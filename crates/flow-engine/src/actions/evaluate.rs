//! EVALUATE (spec §4.6): a conditional branch that resolves a list of
//! conditions and yields a control directive from the matching `then`/`else`
//! branch.
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::registry::Action;
use crate::result::{ActionResult, ControlDirective};
use async_trait::async_trait;
use flow_core::{resolve_placeholders, unwrap_single};
use regex::Regex;
use serde_json::Value as Json;
use std::time::Duration;

pub struct EvaluateAction;

#[derive(serde::Deserialize)]
struct ConditionCfg {
    #[serde(default)]
    left: Option<String>,
    #[serde(default)]
    field: Option<String>,
    operation: String,
    #[serde(default)]
    right: Option<String>,
    #[serde(default)]
    expected: Option<String>,
}

#[derive(serde::Deserialize, Default)]
struct Branch {
    #[serde(default, rename = "continue")]
    continue_: Option<String>,
    #[serde(default, rename = "break")]
    break_: Option<String>,
    #[serde(default)]
    exit: Option<String>,
    #[serde(default)]
    gototask: Option<String>,
    #[serde(default)]
    sleep: Option<f64>,
}

#[derive(serde::Deserialize)]
struct Payload {
    if_conditions: Vec<ConditionCfg>,
    #[serde(default)]
    then: Branch,
    #[serde(default, rename = "else")]
    else_: Branch,
}

/// `left`/`field` precedence: prefer `left` when set and non-empty; fall
/// back to the legacy `field`; a conflicting pair is rejected rather than
/// silently picking one (Open Question decision, spec §9).
fn resolve_operand(primary: &Option<String>, legacy: &Option<String>) -> Result<Option<String>> {
    match (primary, legacy) {
        (Some(p), Some(l)) if !p.trim().is_empty() && !l.trim().is_empty() => {
            if p == l {
                Ok(Some(p.clone()))
            } else {
                Err(EngineError::Action(format!("condition sets conflicting operands: left='{}' field='{}'", p, l)))
            }
        }
        (Some(p), _) if !p.trim().is_empty() => Ok(Some(p.clone())),
        (_, Some(l)) if !l.trim().is_empty() => Ok(Some(l.clone())),
        _ => Ok(None),
    }
}

fn as_f64(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_display_string(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(left: &Json, right: &Json) -> bool {
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l == r;
    }
    unwrap_single(left) == unwrap_single(right)
}

fn contains(left: &Json, right: &Json) -> bool {
    match left {
        Json::String(s) => s.contains(&as_display_string(right)),
        Json::Array(items) => items.iter().any(|item| values_equal(item, right)),
        Json::Object(map) => map.values().any(|item| values_equal(item, right)),
        _ => false,
    }
}

fn in_collection(left: &Json, right: &Json) -> Result<bool> {
    match right {
        Json::Array(items) => Ok(items.iter().any(|item| values_equal(item, left))),
        Json::Object(map) => Ok(map.values().any(|item| values_equal(item, left))),
        _ => Err(EngineError::Action("IN/NOT_IN requires the right operand to be a collection".into())),
    }
}

fn require_right<'a>(right: Option<&'a Json>, op: &str) -> Result<&'a Json> {
    right.ok_or_else(|| EngineError::Action(format!("operator '{}' requires a right/expected operand", op)))
}

fn compare(left: &Json, op: &str, right: Option<&Json>) -> Result<bool> {
    match op {
        "=" | "==" => Ok(values_equal(left, require_right(right, op)?)),
        "!=" => Ok(!values_equal(left, require_right(right, op)?)),
        ">" | "<" | ">=" | "<=" => {
            let r = require_right(right, op)?;
            let l = as_f64(left).ok_or_else(|| EngineError::Action(format!("operator '{}' requires a numeric left operand", op)))?;
            let r = as_f64(r).ok_or_else(|| EngineError::Action(format!("operator '{}' requires a numeric right operand", op)))?;
            Ok(match op {
                ">" => l > r,
                "<" => l < r,
                ">=" => l >= r,
                "<=" => l <= r,
                _ => unreachable!(),
            })
        }
        "STARTS_WITH" => Ok(as_display_string(left).starts_with(&as_display_string(require_right(right, op)?))),
        "ENDS_WITH" => Ok(as_display_string(left).ends_with(&as_display_string(require_right(right, op)?))),
        "CONTAINS" => Ok(contains(left, require_right(right, op)?)),
        "NOT_CONTAINS" => Ok(!contains(left, require_right(right, op)?)),
        "MATCHES" => {
            let pattern = as_display_string(require_right(right, op)?);
            let re = Regex::new(&pattern).map_err(|e| EngineError::Action(format!("invalid MATCHES pattern '{}': {}", pattern, e)))?;
            Ok(re.is_match(&as_display_string(left)))
        }
        "IN" => in_collection(left, require_right(right, op)?),
        "NOT_IN" => Ok(!in_collection(left, require_right(right, op)?)?),
        other => Err(EngineError::Action(format!("unknown condition operator '{}'", other))),
    }
}

fn evaluate_condition(cfg: &ConditionCfg, ctx: &ExecutionContext) -> Result<bool> {
    let left_raw = resolve_operand(&cfg.left, &cfg.field)?
        .ok_or_else(|| EngineError::Action("condition is missing a left/field operand".into()))?;
    let right_raw = resolve_operand(&cfg.right, &cfg.expected)?;

    let left_val = resolve_placeholders(&left_raw, &ctx.variables, &ctx.visible_tasks)?;
    let op = cfg.operation.to_ascii_uppercase();

    if let Json::Array(items) = &left_val {
        if items.is_empty() && op != "!=" && op != "NOT_IN" {
            ctx.logger.log(&format!("condition short-circuited: left operand '{}' resolved to an empty array", left_raw));
            return Ok(false);
        }
    }

    let right_val = match &right_raw {
        Some(r) => Some(resolve_placeholders(r, &ctx.variables, &ctx.visible_tasks)?),
        None => None,
    };

    compare(&left_val, &op, right_val.as_ref())
}

async fn run_branch(branch: &Branch, ctx: &ExecutionContext) -> Result<ActionResult> {
    let primary_count =
        [branch.continue_.is_some(), branch.break_.is_some(), branch.exit.is_some(), branch.gototask.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
    if primary_count > 1 {
        return Err(EngineError::Action("a branch may set at most one of continue/break/exit/gototask".into()));
    }
    if branch.break_.is_some() && branch.gototask.is_some() {
        return Err(EngineError::Action("break cannot combine with gototask".into()));
    }

    if let Some(seconds) = branch.sleep {
        if seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        }
    }

    if let Some(msg) = &branch.continue_ {
        ctx.logger.log(msg);
        return Ok(ActionResult::string(msg.clone()));
    }
    if let Some(target) = &branch.gototask {
        return Ok(ActionResult::string(target.clone()).with_control(ControlDirective::JumpToTask(target.clone())));
    }
    if let Some(msg) = &branch.break_ {
        ctx.logger.log(msg);
        return Ok(ActionResult::string(msg.clone()).with_control(ControlDirective::BreakLoop));
    }
    if let Some(msg) = &branch.exit {
        ctx.logger.log(msg);
        return Ok(ActionResult::string(msg.clone()).with_control(ControlDirective::Exit));
    }

    Ok(ActionResult::string(""))
}

#[async_trait]
impl Action for EvaluateAction {
    fn name(&self) -> &'static str {
        "EVALUATE"
    }

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<ActionResult> {
        let payload: Payload = serde_json::from_value(payload.clone()).map_err(EngineError::Json)?;

        let mut all_pass = true;
        for cfg in &payload.if_conditions {
            if !evaluate_condition(cfg, ctx)? {
                all_pass = false;
                break;
            }
        }

        let branch = if all_pass { &payload.then } else { &payload.else_ };
        run_branch(branch, ctx).await
    }
}
