//! VARIABLES (spec §4.4): declare or update variables in the active store.
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::registry::Action;
use async_trait::async_trait;
use flow_core::{coerce, resolve_placeholders, Variable, VarType, VariableStore};
use serde_json::{Map, Value as Json};

pub struct VariablesAction;

#[derive(serde::Deserialize)]
struct Operation {
    operator: String,
    variable: String,
}

#[derive(serde::Deserialize)]
struct VarConfig {
    name: String,
    #[serde(rename = "type")]
    var_type: String,
    #[serde(default)]
    value: Option<Json>,
    #[serde(default)]
    operation: Option<Operation>,
}

#[derive(serde::Deserialize)]
struct Payload {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    overwrite: bool,
    vars: Vec<VarConfig>,
}

fn normalize_operator(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "add" | "plus" | "+" => Some("add"),
        "subtract" | "minus" | "-" => Some("subtract"),
        "multiply" | "times" | "*" => Some("multiply"),
        "divide" | "/" => Some("divide"),
        _ => None,
    }
}

/// Look up a number first in this payload's not-yet-published updates, then
/// in the store, per spec §4.4's "visible so far in this payload" rule.
fn lookup_number(name: &str, partial: &VariableStore, store: &VariableStore) -> Result<f64> {
    let var = partial.get(name).or_else(|| store.get(name)).ok_or_else(|| EngineError::Action(format!("undefined variable '{}'", name)))?;
    var.value.as_number().ok_or_else(|| EngineError::Action(format!("variable '{}' is not a number", name)))
}

#[async_trait]
impl Action for VariablesAction {
    fn name(&self) -> &'static str {
        "VARIABLES"
    }

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<crate::result::ActionResult> {
        let payload: Payload = serde_json::from_value(payload.clone()).map_err(EngineError::Json)?;

        if let Some(scope) = &payload.scope {
            if !scope.trim().is_empty() && !scope.eq_ignore_ascii_case("flow") {
                return Err(EngineError::Action(format!("unsupported VARIABLES scope '{}'", scope)));
            }
        }
        if payload.vars.is_empty() {
            return Err(EngineError::Action("VARIABLES payload must declare at least one variable".into()));
        }

        let overwrite = payload.overwrite || ctx.resuming;

        let mut seen = std::collections::HashSet::new();
        let mut partial = VariableStore::new();

        for cfg in &payload.vars {
            if !seen.insert(cfg.name.clone()) {
                return Err(EngineError::Action(format!("duplicate variable name '{}' in payload", cfg.name)));
            }
            if ctx.variables.contains(&cfg.name) && !overwrite {
                return Err(EngineError::Action(format!("variable '{}' already exists and overwrite is false", cfg.name)));
            }

            let var_type = VarType::parse(&cfg.var_type)
                .ok_or_else(|| EngineError::Action(format!("unknown variable type '{}'", cfg.var_type)))?;

            let value = if let Some(op) = &cfg.operation {
                if var_type != VarType::Number {
                    return Err(EngineError::Action("'operation' is only valid when type == number".into()));
                }
                let operator = normalize_operator(&op.operator)
                    .ok_or_else(|| EngineError::Action(format!("unknown operator '{}'", op.operator)))?;
                let base = lookup_number(&cfg.name, &partial, &ctx.variables)?;
                let operand = lookup_number(&op.variable, &partial, &ctx.variables)?;
                let result = match operator {
                    "add" => base + operand,
                    "subtract" => base - operand,
                    "multiply" => base * operand,
                    "divide" => {
                        if operand == 0.0 {
                            return Err(EngineError::Action(format!("division by zero computing '{}'", cfg.name)));
                        }
                        base / operand
                    }
                    _ => unreachable!(),
                };
                coerce(VarType::Number, &Json::from(result)).map_err(EngineError::from)?
            } else {
                let raw = cfg.value.clone().unwrap_or(Json::Null);
                let resolved = match &raw {
                    Json::String(s) => resolve_placeholders(s, &merged_view(&partial, &ctx.variables), &ctx.visible_tasks)?,
                    other => other.clone(),
                };
                coerce(var_type, &resolved).map_err(EngineError::from)?
            };

            let variable = Variable::new(cfg.name.clone(), var_type, value).map_err(EngineError::from)?;
            partial.insert(variable);
        }

        let mut out = Map::new();
        for (name, var) in partial.iter() {
            out.insert(name.clone(), var.masked_json());
            ctx.variables.insert(var.clone());
        }

        Ok(crate::result::ActionResult::json(Json::Object(out)))
    }
}

/// A merged read-only view isn't modeled as its own type; `resolve_placeholders`
/// only needs `get`/`contains`, so build a small temporary store combining
/// partial updates (highest priority) over the existing store.
fn merged_view(partial: &VariableStore, store: &VariableStore) -> VariableStore {
    let mut merged = store.clone();
    for (_, var) in partial.iter() {
        merged.insert(var.clone());
    }
    merged
}
