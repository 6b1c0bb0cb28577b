//! The task orchestrator (spec §4.5): the outer sequential execution loop,
//! selector resolution, control-directive handling, and the on_error_flow/
//! finally propagation policy (spec §7).
use crate::artifact::{write_environment_variables, write_task_log, ArtifactAllocator};
use crate::context::{CancellationFlag, ExecutionContext};
use crate::error::{EngineError, Result};
use crate::expand::expand_payload;
use crate::observer::{Event, Observer, TaskSnapshot};
use crate::registry::ActionRegistry;
use crate::result::ControlDirective;
use chrono::Utc;
use flow_core::{flows_for_execution, resolve_placeholders, FlowImports, LoadedFlow, RunSnapshot, Task, TaskStatus, VariableStore};
use serde_json::Value as Json;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Selectors {
    pub begin_from_task_id: Option<String>,
    pub run_task_id: Option<String>,
    pub run_flow_id: Option<String>,
    pub run_subtask_id: Option<String>,
}

impl Selectors {
    fn any_set(&self) -> bool {
        self.begin_from_task_id.is_some()
            || self.run_task_id.is_some()
            || self.run_flow_id.is_some()
            || self.run_subtask_id.is_some()
    }

    /// `runFlowId` excludes every other selector; `runSubtaskId` excludes
    /// `beginFromTaskId`/`runTaskId` (spec §4.5).
    fn validate(&self) -> Result<()> {
        let others_than_flow =
            self.begin_from_task_id.is_some() || self.run_task_id.is_some() || self.run_subtask_id.is_some();
        if self.run_flow_id.is_some() && others_than_flow {
            return Err(EngineError::SelectorConflict("run-flow-id is mutually exclusive with every other selector".into()));
        }
        if self.run_subtask_id.is_some() && (self.begin_from_task_id.is_some() || self.run_task_id.is_some()) {
            return Err(EngineError::SelectorConflict(
                "run-subtask-id is mutually exclusive with begin-from-task-id/run-task-id".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub selectors: Selectors,
    pub stop_at_task_id: Option<String>,
    pub snapshot: Option<RunSnapshot>,
}

pub struct RunOutcome {
    pub tasks: Vec<Task>,
    pub variables: VariableStore,
    pub snapshot: RunSnapshot,
    /// Set when a task failed and the failure was not fully absorbed by an
    /// `on_error_flow`/`finally_*` run (spec §7's propagation policy).
    pub primary_error: Option<String>,
}

pub struct TaskOutcome {
    pub task: Task,
    pub variables: VariableStore,
    pub control: Option<ControlDirective>,
}

pub struct Orchestrator {
    registry: Arc<ActionRegistry>,
    artifacts: Arc<ArtifactAllocator>,
    observer: Arc<dyn Observer>,
    /// Bounds PARALLEL fan-out concurrency (spec §5's "bounded parallelism").
    pub(crate) parallel_permits: Arc<tokio::sync::Semaphore>,
}

impl Orchestrator {
    pub fn new(registry: ActionRegistry, artifacts: ArtifactAllocator, observer: Arc<dyn Observer>, max_parallel: usize) -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(registry),
            artifacts: Arc::new(artifacts),
            observer,
            parallel_permits: Arc::new(tokio::sync::Semaphore::new(max_parallel.max(1))),
        })
    }

    pub async fn run(self: &Arc<Self>, loaded: &LoadedFlow, request: RunRequest) -> Result<RunOutcome> {
        request.selectors.validate()?;
        let is_resume = request.snapshot.is_some() && request.selectors.any_set();

        let mut tasks = loaded.tasks.clone();
        let mut variables = match (&request.snapshot, is_resume) {
            (Some(snap), true) => snap.restore_variables(),
            _ => VariableStore::new(),
        };
        if let (Some(snap), true) = (&request.snapshot, is_resume) {
            snap.apply_to(&mut tasks);
        }

        self.observer.on_event(Event::FlowLoaded { flow_id: loaded.root_id.clone(), task_count: tasks.len(), at: Utc::now() });
        self.observer.on_event(Event::FlowStarted { flow_id: loaded.root_id.clone(), at: Utc::now() });

        let cancellation = CancellationFlag::new();

        let primary_error = if let Some(subtask_id) = request.selectors.run_subtask_id.clone() {
            self.run_subtask_mode(&mut tasks, &mut variables, &subtask_id, &cancellation, is_resume).await?
        } else {
            self.run_predicate_mode(loaded, &mut tasks, &mut variables, &request, &cancellation, is_resume).await?
        };

        let snapshot = RunSnapshot::capture(&variables, &tasks);
        self.observer.on_event(Event::FlowFinished { flow_id: loaded.root_id.clone(), success: primary_error.is_none(), at: Utc::now() });

        Ok(RunOutcome { tasks, variables, snapshot, primary_error })
    }

    /// Execute a single task: allocate its artifact directory, expand its
    /// payload per its action family, dispatch to the registered action,
    /// and fold the outcome back onto the task (spec §4.5 steps b-h).
    ///
    /// Returns `Err` only for conditions spec §7 classifies as
    /// Configuration/Control-flow — fatal to the whole run. An action's own
    /// failure, a resolution error, or a coercion error instead comes back
    /// as `Ok` with `task.success == false`.
    pub async fn execute_task(
        self: &Arc<Self>,
        task: &mut Task,
        visible_tasks: &[Task],
        variables: VariableStore,
        cancellation: CancellationFlag,
        resuming: bool,
    ) -> Result<TaskOutcome> {
        if cancellation.is_cancelled() {
            task.mark_completed(Utc::now(), false, None, None, Some("task cancelled".into()));
            return Ok(TaskOutcome { task: task.clone(), variables, control: None });
        }

        let dir = self.artifacts.allocate(task)?;
        let logger = Arc::new(crate::logging::TaskLogger::new(task.id.clone(), self.observer.clone()));

        task.mark_in_progress(Utc::now());

        let description = match resolve_placeholders(&task.description, &variables, &[]) {
            Ok(Json::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(e) => return Ok(self.fail_task(task, &variables, &logger, &dir, e)),
        };
        task.description = description;

        self.observer.on_event(Event::TaskStarted { task: TaskSnapshot::from(&*task), at: Utc::now() });

        let action_key = task.action_key();
        let Some(action) = self.registry.get(&action_key) else {
            return Err(EngineError::UnsupportedAction(task.action.clone()));
        };

        let expanded = match expand_payload(&action_key, &task.payload, &variables, visible_tasks) {
            Ok(p) => p,
            Err(e) => return Ok(self.fail_task(task, &variables, &logger, &dir, e)),
        };

        let mut ctx = ExecutionContext {
            task: task.clone(),
            visible_tasks: visible_tasks.to_vec(),
            variables: variables.clone(),
            logger: logger.clone(),
            dir: dir.clone(),
            cancellation,
            orchestrator: self.clone(),
            resuming,
        };

        match action.execute(&expanded, &mut ctx).await {
            Ok(action_result) => {
                task.mark_completed(Utc::now(), true, Some(action_result.result_type), Some(action_result.value), None);
                let _ = write_task_log(&dir, task, &logger.lines());
                let _ = write_environment_variables(&dir, &ctx.variables);
                self.observer.on_event(Event::TaskCompleted { task: TaskSnapshot::from(&*task), at: Utc::now() });
                Ok(TaskOutcome { task: task.clone(), variables: ctx.variables, control: action_result.control })
            }
            Err(e) => Ok(self.fail_task(task, &variables, &logger, &dir, e)),
        }
    }

    fn fail_task(
        &self,
        task: &mut Task,
        variables: &VariableStore,
        logger: &crate::logging::TaskLogger,
        dir: &std::path::Path,
        err: impl std::fmt::Display,
    ) -> TaskOutcome {
        logger.error(&err.to_string());
        task.mark_completed(Utc::now(), false, None, None, Some(err.to_string()));
        let _ = write_task_log(dir, task, &logger.lines());
        let _ = write_environment_variables(dir, variables);
        self.observer.on_event(Event::TaskFailed { task: TaskSnapshot::from(&*task), at: Utc::now() });
        TaskOutcome { task: task.clone(), variables: variables.clone(), control: None }
    }

    fn compute_predicate(tasks: &[Task], flow_imports: &FlowImports, selectors: &Selectors) -> Result<Vec<bool>> {
        let n = tasks.len();

        if let Some(id) = &selectors.run_task_id {
            let idx = tasks.iter().position(|t| &t.id == id).ok_or_else(|| EngineError::ControlFlow(format!("unknown task '{}'", id)))?;
            let mut pred = vec![false; n];
            pred[idx] = true;
            return Ok(pred);
        }

        if let Some(id) = &selectors.run_flow_id {
            let allowed: HashSet<String> = flows_for_execution(flow_imports, id)?.into_iter().collect();
            let first_idx = tasks.iter().position(|t| allowed.contains(&t.flow_id));
            let mut pred = vec![false; n];
            for (i, t) in tasks.iter().enumerate() {
                let is_allowed_flow = allowed.contains(&t.flow_id);
                let is_variables_before_first = first_idx.map(|f| i < f).unwrap_or(true) && t.action_key() == "VARIABLES";
                pred[i] = is_allowed_flow || is_variables_before_first;
            }
            return Ok(pred);
        }

        if let Some(id) = &selectors.begin_from_task_id {
            let idx = tasks.iter().position(|t| &t.id == id).ok_or_else(|| EngineError::ControlFlow(format!("unknown task '{}'", id)))?;
            let pred = (0..n).map(|i| i >= idx || tasks[i].action_key() == "VARIABLES").collect();
            return Ok(pred);
        }

        Ok(vec![true; n])
    }

    async fn run_predicate_mode(
        self: &Arc<Self>,
        loaded: &LoadedFlow,
        tasks: &mut Vec<Task>,
        variables: &mut VariableStore,
        request: &RunRequest,
        cancellation: &CancellationFlag,
        resuming: bool,
    ) -> Result<Option<String>> {
        let predicate = Self::compute_predicate(tasks, &loaded.flow_imports, &request.selectors)?;
        let begin_from = request.selectors.begin_from_task_id.clone();
        let mut primary_error: Option<String> = None;
        let mut stop_requested = false;
        let mut i = 0usize;

        while i < tasks.len() {
            if stop_requested || cancellation.is_cancelled() {
                break;
            }
            if !predicate[i] {
                i += 1;
                continue;
            }

            let task_id = tasks[i].id.clone();
            let mut task = tasks[i].clone();
            let outcome = self.execute_task(&mut task, tasks, variables.clone(), cancellation.clone(), resuming).await?;
            tasks[i] = outcome.task.clone();

            if outcome.task.success {
                *variables = outcome.variables;
            } else {
                if primary_error.is_none() {
                    primary_error = outcome.task.error.clone();
                }
                if let Some(on_error_id) = loaded.on_error_flow.clone() {
                    self.run_flow_range(&on_error_id, tasks, variables, cancellation, resuming, &mut primary_error, true).await?;
                }
                break;
            }

            if let Some(control) = &outcome.control {
                match control {
                    ControlDirective::Exit => break,
                    ControlDirective::JumpToTask(target) => {
                        let idx = tasks
                            .iter()
                            .position(|t| &t.id == target)
                            .ok_or_else(|| EngineError::ControlFlow(format!("unknown jump target '{}'", target)))?;
                        i = idx;
                        continue;
                    }
                    ControlDirective::BreakLoop => {}
                }
            }

            if let Some(stop_id) = &request.stop_at_task_id {
                if *stop_id == task_id && begin_from.as_deref() != Some(stop_id.as_str()) {
                    stop_requested = true;
                }
            }

            i += 1;
        }

        if let Some(finally_flow_id) = loaded.finally_flow.clone() {
            self.run_flow_range(&finally_flow_id, tasks, variables, cancellation, resuming, &mut primary_error, false).await?;
        }
        if let Some(finally_task_id) = &loaded.finally_task {
            if let Some(idx) = tasks.iter().position(|t| &t.id == finally_task_id) {
                let mut t = tasks[idx].clone();
                let o = self.execute_task(&mut t, tasks, variables.clone(), cancellation.clone(), resuming).await?;
                tasks[idx] = o.task.clone();
                if o.task.success {
                    *variables = o.variables;
                } else {
                    primary_error = Some(compose_finally_error(finally_task_id, &o.task.error, &primary_error));
                }
            }
        }

        Ok(primary_error)
    }

    /// Run every task belonging to `flow_id`, in flattened order, used by
    /// both `on_error_flow` and `finally_flow` (spec §7).
    async fn run_flow_range(
        self: &Arc<Self>,
        flow_id: &str,
        tasks: &mut [Task],
        variables: &mut VariableStore,
        cancellation: &CancellationFlag,
        resuming: bool,
        primary_error: &mut Option<String>,
        is_on_error: bool,
    ) -> Result<()> {
        let indices: Vec<usize> = tasks.iter().enumerate().filter(|(_, t)| t.flow_id == flow_id).map(|(i, _)| i).collect();
        for idx in indices {
            let mut t = tasks[idx].clone();
            let o = self.execute_task(&mut t, tasks, variables.clone(), cancellation.clone(), resuming).await?;
            tasks[idx] = o.task.clone();
            if o.task.success {
                *variables = o.variables;
            } else if is_on_error {
                *primary_error = Some(format!(
                    "{} (on_error_flow '{}' also failed: {})",
                    primary_error.clone().unwrap_or_default(),
                    flow_id,
                    o.task.error.clone().unwrap_or_default()
                ));
            } else {
                *primary_error = Some(compose_finally_error(flow_id, &o.task.error, primary_error));
            }
        }
        Ok(())
    }

    async fn run_subtask_mode(
        self: &Arc<Self>,
        tasks: &mut [Task],
        variables: &mut VariableStore,
        target: &str,
        cancellation: &CancellationFlag,
        resuming: bool,
    ) -> Result<Option<String>> {
        let mut matches = find_subtask_locations(tasks, target);
        if matches.is_empty() {
            return Err(EngineError::Subtask(format!("subtask '{}' not found", target)));
        }
        if matches.len() > 1 {
            return Err(EngineError::Subtask(format!("subtask '{}' is ambiguous ({} matches)", target, matches.len())));
        }
        let (outer_idx, levels, target_json) = matches.remove(0);
        let flow_id = tasks[outer_idx].flow_id.clone();
        let mut primary_error: Option<String> = None;

        for i in 0..outer_idx {
            if tasks[i].action_key() == "VARIABLES" {
                let mut t = tasks[i].clone();
                let o = self.execute_task(&mut t, tasks, variables.clone(), cancellation.clone(), resuming).await?;
                tasks[i] = o.task.clone();
                if o.task.success {
                    *variables = o.variables;
                } else if primary_error.is_none() {
                    primary_error = o.task.error.clone();
                }
            }
        }

        for level in &levels {
            for sibling_json in &level.siblings_before {
                let action = sibling_json.get("action").and_then(Json::as_str).unwrap_or_default();
                if !action.eq_ignore_ascii_case("VARIABLES") {
                    continue;
                }
                let mut t = task_from_raw_json(&flow_id, sibling_json)?;
                let o = self.execute_task(&mut t, tasks, variables.clone(), cancellation.clone(), resuming).await?;
                if o.task.success {
                    *variables = o.variables;
                } else if primary_error.is_none() {
                    primary_error = o.task.error.clone();
                }
            }
        }

        let mut target_task = task_from_raw_json(&flow_id, &target_json)?;
        let o = self.execute_task(&mut target_task, tasks, variables.clone(), cancellation.clone(), resuming).await?;
        if o.task.success {
            *variables = o.variables;
        } else if primary_error.is_none() {
            primary_error = o.task.error.clone();
        }

        Ok(primary_error)
    }
}

fn compose_finally_error(flow_or_task: &str, new_error: &Option<String>, original: &Option<String>) -> String {
    match (new_error, original) {
        (Some(new), Some(orig)) => format!("finally '{}' failed: {}; original cause: {}", flow_or_task, new, orig),
        (Some(new), None) => format!("finally '{}' failed: {}", flow_or_task, new),
        (None, Some(orig)) => orig.clone(),
        (None, None) => String::new(),
    }
}

struct SubtaskLevel {
    siblings_before: Vec<Json>,
}

type SubtaskMatch = (usize, Vec<SubtaskLevel>, Json);

/// Locate `target` by walking every top-level FOR/PARALLEL task's nested
/// `tasks` payload recursively (spec §4.5 `runSubtaskId`). Returns every
/// match found — the caller rejects ambiguity.
fn find_subtask_locations(tasks: &[Task], target: &str) -> Vec<SubtaskMatch> {
    let mut matches = Vec::new();
    for (outer_idx, task) in tasks.iter().enumerate() {
        let key = task.action_key();
        if key != "FOR" && key != "PARALLEL" {
            continue;
        }
        let Some(nested) = task.payload.get("tasks").and_then(Json::as_array) else {
            continue;
        };
        for (levels, target_json) in search_nested_tasks(nested, target) {
            matches.push((outer_idx, levels, target_json));
        }
    }
    matches
}

fn search_nested_tasks(tasks_json: &[Json], target: &str) -> Vec<(Vec<SubtaskLevel>, Json)> {
    let mut matches = Vec::new();
    let mut siblings_before: Vec<Json> = Vec::new();

    for t in tasks_json {
        let id = t.get("id").and_then(Json::as_str).unwrap_or_default();
        if id == target {
            matches.push((vec![SubtaskLevel { siblings_before: siblings_before.clone() }], t.clone()));
        }
        if let Some(nested) = t.get("tasks").and_then(Json::as_array) {
            for (mut deeper_levels, target_json) in search_nested_tasks(nested, target) {
                let mut levels = vec![SubtaskLevel { siblings_before: siblings_before.clone() }];
                levels.append(&mut deeper_levels);
                matches.push((levels, target_json));
            }
        }
        siblings_before.push(t.clone());
    }

    matches
}

/// Build a `Task` from a raw subtask JSON object nested inside a FOR/
/// PARALLEL payload — those subtasks never pass through the loader, so
/// composite actions and `runSubtaskId` both need this conversion.
pub(crate) fn task_from_raw_json(flow_id: &str, raw: &Json) -> Result<Task> {
    let obj = raw.as_object().ok_or_else(|| EngineError::Subtask("subtask entry is not a json object".into()))?;
    let id = obj
        .get("id")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::Subtask("subtask entry missing 'id'".into()))?;
    let action = obj
        .get("action")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::Subtask("subtask entry missing 'action'".into()))?;
    let description = obj.get("description").and_then(Json::as_str).unwrap_or("").to_string();

    Ok(Task {
        id,
        description,
        action,
        flow_id: flow_id.to_string(),
        payload: raw.clone(),
        status: TaskStatus::NotStarted,
        success: false,
        start_timestamp: None,
        end_timestamp: None,
        duration_seconds: None,
        result_type: None,
        result: None,
        error: None,
    })
}
