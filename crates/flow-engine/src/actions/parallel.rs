//! PARALLEL (spec §4.7): concurrent fan-out over a fixed set of subtasks,
//! each with its own cloned variable store, merged back under a declared
//! strategy once every subtask settles.
use crate::context::ExecutionContext;
use crate::error::{EngineError, Result};
use crate::orchestrator::task_from_raw_json;
use crate::registry::Action;
use crate::result::ActionResult;
use async_trait::async_trait;
use flow_core::{Task, Variable, VariableStore};
use serde_json::{json, Map, Value as Json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

pub struct ParallelAction;

#[derive(serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum MergeStrategy {
    LastWriteWins,
    FailOnConflict,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::LastWriteWins
    }
}

#[derive(serde::Deserialize)]
struct Payload {
    tasks: Vec<Json>,
    #[serde(default)]
    fail_fast: bool,
    #[serde(default)]
    merge_strategy: MergeStrategy,
    #[serde(default)]
    merge_order: Option<Vec<String>>,
}

struct SubtaskReport {
    id: String,
    variables: VariableStore,
    result: Option<Json>,
    result_type: Option<flow_core::ResultType>,
    error: Option<String>,
}

#[async_trait]
impl Action for ParallelAction {
    fn name(&self) -> &'static str {
        "PARALLEL"
    }

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<ActionResult> {
        let payload: Payload = serde_json::from_value(payload.clone()).map_err(EngineError::Json)?;

        if payload.tasks.is_empty() {
            return Err(EngineError::Action("PARALLEL payload must declare at least one subtask".into()));
        }
        let mut declared_ids = std::collections::HashSet::new();
        let mut children = Vec::with_capacity(payload.tasks.len());
        for raw in &payload.tasks {
            let child = task_from_raw_json(&ctx.task.flow_id, raw)?;
            if !declared_ids.insert(child.id.clone()) {
                return Err(EngineError::Action(format!("duplicate subtask id '{}' in PARALLEL payload", child.id)));
            }
            children.push(child);
        }

        let fan_out_cancellation = ctx.cancellation.child();
        let reports: Arc<Mutex<HashMap<String, SubtaskReport>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut joins = JoinSet::new();

        // Snapshot taken before any subtask runs, so the merge step can tell
        // a subtask's genuine write apart from a value it only inherited
        // from its own pre-fan-out clone and never touched.
        let baseline = ctx.variables.clone();

        let permits = ctx.orchestrator.parallel_permits.clone();

        for child in children {
            let orchestrator = ctx.orchestrator.clone();
            let visible_tasks = ctx.visible_tasks.clone();
            let variables = ctx.variables.clone();
            let cancellation = fan_out_cancellation.clone();
            let reports = reports.clone();
            let fail_fast = payload.fail_fast;
            let id = child.id.clone();
            let resuming = ctx.resuming;
            let permits = permits.clone();

            joins.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let mut task = child;
                let outcome = orchestrator.execute_task(&mut task, &visible_tasks, variables, cancellation.clone(), resuming).await;
                let report = match outcome {
                    Ok(outcome) => SubtaskReport {
                        id: id.clone(),
                        variables: if outcome.task.success { outcome.variables } else { VariableStore::new() },
                        result: outcome.task.result.clone(),
                        result_type: outcome.task.result_type,
                        error: outcome.task.error.clone(),
                    },
                    Err(e) => SubtaskReport { id: id.clone(), variables: VariableStore::new(), result: None, result_type: None, error: Some(e.to_string()) },
                };
                if fail_fast && report.error.is_some() {
                    cancellation.cancel();
                }
                reports.lock().await.insert(id, report);
            });
        }

        while joins.join_next().await.is_some() {}

        let reports = Arc::try_unwrap(reports).map_err(|_| EngineError::Action("internal: PARALLEL reports still shared".into()))?.into_inner();

        let order: Vec<String> = match &payload.merge_order {
            Some(explicit) => {
                let mut seen = std::collections::HashSet::new();
                let mut out = Vec::new();
                for id in explicit {
                    if !declared_ids.contains(id) {
                        return Err(EngineError::Action(format!("merge_order references unknown subtask id '{}'", id)));
                    }
                    if !seen.insert(id.clone()) {
                        return Err(EngineError::Action(format!("duplicate subtask id '{}' in merge_order", id)));
                    }
                    out.push(id.clone());
                }
                for id in &payload.tasks {
                    if let Some(id) = id.get("id").and_then(Json::as_str) {
                        if seen.insert(id.to_string()) {
                            out.push(id.to_string());
                        }
                    }
                }
                out
            }
            None => payload.tasks.iter().filter_map(|t| t.get("id").and_then(Json::as_str)).map(str::to_string).collect(),
        };

        let mut origins: HashMap<String, String> = HashMap::new();
        for id in &order {
            let Some(report) = reports.get(id) else { continue };
            if report.error.is_some() {
                continue;
            }
            for (name, var) in report.variables.iter() {
                // A subtask's returned store is seeded from the same baseline
                // every sibling started from; a name whose value is still
                // exactly what the baseline had means this subtask never
                // wrote it, so it must not participate in the merge.
                if baseline.get(name).map(Variable::raw_json).as_ref() == Some(&var.raw_json()) {
                    continue;
                }
                if let Some(prior_origin) = origins.get(name) {
                    if matches!(payload.merge_strategy, MergeStrategy::FailOnConflict) {
                        let prior_value = ctx.variables.get(name).map(Variable::masked_json);
                        if prior_value.as_ref() != Some(&var.masked_json()) {
                            return Err(EngineError::MergeConflict {
                                name: name.clone(),
                                first_origin: prior_origin.clone(),
                                second_origin: id.clone(),
                            });
                        }
                    }
                }
                ctx.variables.insert(var.clone());
                origins.insert(name.clone(), id.clone());
            }
        }

        let mut aggregated = Map::new();
        let mut failures = Vec::new();
        for id in &order {
            let Some(report) = reports.get(id) else { continue };
            aggregated.insert(
                id.clone(),
                json!({ "result": report.result, "type": report.result_type, "error": report.error }),
            );
            if let Some(err) = &report.error {
                failures.push(format!("{}: {}", id, err));
            }
        }

        if !failures.is_empty() {
            return Err(EngineError::Action(format!(
                "PARALLEL had {} failing subtask(s): {} (aggregated: {})",
                failures.len(),
                failures.join("; "),
                Json::Object(aggregated)
            )));
        }

        Ok(ActionResult::json(Json::Object(aggregated)))
    }
}
