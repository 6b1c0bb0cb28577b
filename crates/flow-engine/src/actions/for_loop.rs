//! FOR (spec §4.8): numeric or values-driven iteration over a fixed set of
//! nested subtasks, executed through the nested-executor callback.
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::orchestrator::task_from_raw_json;
use crate::registry::Action;
use crate::result::{ActionResult, ControlDirective};
use async_trait::async_trait;
use flow_core::{resolve_placeholders, Variable, VarType, VariableStore, VariableValue};
use serde_json::{json, Map, Value as Json};

pub struct ForAction;

#[derive(serde::Deserialize)]
struct NumericCondition {
    operator: String,
    value: Json,
}

#[derive(serde::Deserialize)]
struct Payload {
    variable: String,
    #[serde(default)]
    initial: Option<Json>,
    #[serde(default)]
    condition: Option<NumericCondition>,
    #[serde(default)]
    step: Option<f64>,
    #[serde(default)]
    values: Option<Vec<String>>,
    #[serde(default)]
    max_iterations: Option<u64>,
    #[serde(default)]
    require_break: bool,
    tasks: Vec<Json>,
}

enum Sequence {
    Numeric { current: f64, step: f64, operator: String, target: f64 },
    Values(std::vec::IntoIter<Json>),
}

fn as_f64(v: &Json) -> Option<f64> {
    match v {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn numeric_condition_holds(counter: f64, operator: &str, target: f64) -> Result<bool> {
    Ok(match operator {
        "==" => counter == target,
        "!=" => counter != target,
        "<" => counter < target,
        "<=" => counter <= target,
        ">" => counter > target,
        ">=" => counter >= target,
        other => return Err(EngineError::Action(format!("unknown FOR condition operator '{}'", other))),
    })
}

fn display_string(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bind_iteration_variable(variables: &mut VariableStore, name: &str, value: &Json, numeric: bool) -> Result<()> {
    let (var_type, inner) = if numeric {
        (VarType::Number, VariableValue::Number(as_f64(value).unwrap_or(0.0)))
    } else {
        (VarType::String, VariableValue::String(display_string(value)))
    };
    let variable = Variable::new(name, var_type, inner).map_err(EngineError::from)?;
    variables.insert(variable);
    Ok(())
}

#[async_trait]
impl Action for ForAction {
    fn name(&self) -> &'static str {
        "FOR"
    }

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<ActionResult> {
        let payload: Payload = serde_json::from_value(payload.clone()).map_err(EngineError::Json)?;

        let numeric_mode = payload.condition.is_some();
        if numeric_mode && payload.values.is_some() {
            return Err(EngineError::Action("FOR payload must declare either numeric or values fields, not both".into()));
        }

        let mut sequence = if numeric_mode {
            let initial = payload.initial.as_ref().ok_or_else(|| EngineError::Action("numeric FOR requires 'initial'".into()))?;
            let step = payload.step.ok_or_else(|| EngineError::Action("numeric FOR requires a non-zero 'step'".into()))?;
            if step == 0.0 {
                return Err(EngineError::Action("FOR 'step' must be non-zero".into()));
            }
            let condition = payload.condition.as_ref().unwrap();
            let target = as_f64(&condition.value)
                .ok_or_else(|| EngineError::Action("FOR condition 'value' must be numeric".into()))?;
            Sequence::Numeric {
                current: as_f64(initial).ok_or_else(|| EngineError::Action("FOR 'initial' must be numeric".into()))?,
                step,
                operator: condition.operator.clone(),
                target,
            }
        } else {
            let templates = payload.values.as_ref().ok_or_else(|| EngineError::Action("FOR requires 'values' when not numeric".into()))?;
            let mut flat = Vec::new();
            for template in templates {
                let resolved = resolve_placeholders(template, &ctx.variables, &ctx.visible_tasks)?;
                match resolved {
                    Json::Array(items) => flat.extend(items),
                    other => flat.push(other),
                }
            }
            Sequence::Values(flat.into_iter())
        };

        let max_iterations = payload.max_iterations.filter(|n| *n > 0);
        let mut iteration_count: u64 = 0;
        let mut loop_broken = false;
        let mut propagated: Option<ControlDirective> = None;
        let mut iterations_summary = Vec::new();

        'outer: loop {
            if let Some(max) = max_iterations {
                if iteration_count >= max {
                    break;
                }
            }

            let current_value = match &mut sequence {
                Sequence::Numeric { current, operator, target, .. } => {
                    if !numeric_condition_holds(*current, operator, *target)? {
                        break;
                    }
                    Json::from(*current)
                }
                Sequence::Values(iter) => match iter.next() {
                    Some(v) => v,
                    None => break,
                },
            };

            bind_iteration_variable(&mut ctx.variables, &payload.variable, &current_value, numeric_mode)?;

            let mut visible_this_iteration = ctx.visible_tasks.clone();
            let mut iteration_results = Map::new();

            for subtask_json in &payload.tasks {
                let child = task_from_raw_json(&ctx.task.flow_id, subtask_json)?;
                let outcome = ctx
                    .execute_child(child, visible_this_iteration.clone(), ctx.variables.clone(), ctx.cancellation.child())
                    .await?;

                iteration_results.insert(
                    outcome.task.id.clone(),
                    json!({
                        "result": outcome.task.result,
                        "type": outcome.task.result_type,
                        "error": outcome.task.error,
                    }),
                );

                ctx.variables = outcome.variables;
                bind_iteration_variable(&mut ctx.variables, &payload.variable, &current_value, numeric_mode)?;
                visible_this_iteration.push(outcome.task.clone());

                if !outcome.task.success {
                    iterations_summary.push(Json::Object(iteration_results));
                    return Err(EngineError::Action(format!(
                        "FOR subtask '{}' failed: {} (partial summary: {})",
                        outcome.task.id,
                        outcome.task.error.clone().unwrap_or_default(),
                        Json::Array(iterations_summary.clone())
                    )));
                }

                match &outcome.control {
                    Some(ControlDirective::BreakLoop) => {
                        loop_broken = true;
                    }
                    Some(other @ ControlDirective::Exit) | Some(other @ ControlDirective::JumpToTask(_)) => {
                        propagated = Some(other.clone());
                    }
                    None => {}
                }

                if loop_broken || propagated.is_some() {
                    break;
                }
            }

            iterations_summary.push(Json::Object(iteration_results));
            iteration_count += 1;

            if let Sequence::Numeric { current, step, .. } = &mut sequence {
                *current += *step;
            }

            if loop_broken || propagated.is_some() {
                break 'outer;
            }
        }

        if payload.require_break && !loop_broken {
            return Err(EngineError::Action(format!(
                "FOR requires termination via breakLoop but the loop ended normally (partial summary: {})",
                Json::Array(iterations_summary)
            )));
        }

        let mut result = ActionResult::json(json!({ "iterations": iterations_summary, "loop_broken": loop_broken }));
        if let Some(control) = propagated {
            result = result.with_control(control);
        }
        Ok(result)
    }
}
