//! `ExecutionContext` (spec §6) and the cancellable context propagated
//! through the orchestrator into every action (spec §5).
use crate::logging::TaskLogger;
use crate::orchestrator::Orchestrator;
use flow_core::{Task, VariableStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct CancellationInner {
    flag: AtomicBool,
    notify: Notify,
    parent: Option<CancellationFlag>,
}

/// A cancellable context handle. `child()` derives a new flag whose
/// `is_cancelled` also observes the parent — this is how `fail_fast`
/// PARALLEL cancellation (spec §5) reaches not-yet-started descendants
/// without every level needing to poll its ancestors by hand.
#[derive(Clone)]
pub struct CancellationFlag(Arc<CancellationInner>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(CancellationInner { flag: AtomicBool::new(false), notify: Notify::new(), parent: None }))
    }

    pub fn child(&self) -> Self {
        Self(Arc::new(CancellationInner {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
            parent: Some(self.clone()),
        }))
    }

    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst) || self.0.parent.as_ref().map(|p| p.is_cancelled()).unwrap_or(false)
    }
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Carries everything an action needs to run (spec §6): a pointer to the
/// current task, the tasks visible to it, a mutable clone of the variable
/// store, a task-bound logger, the allocated artifact directory, and a
/// handle back into the orchestrator for nested execution (FOR/PARALLEL).
pub struct ExecutionContext {
    pub task: Task,
    pub visible_tasks: Vec<Task>,
    pub variables: VariableStore,
    pub logger: Arc<TaskLogger>,
    pub dir: PathBuf,
    pub cancellation: CancellationFlag,
    pub orchestrator: Arc<Orchestrator>,
    /// True when this run resumed from a `RunSnapshot` — VARIABLES treats
    /// `overwrite` as forced to true for the whole run (spec §4.5).
    pub resuming: bool,
}

impl ExecutionContext {
    /// The nested-executor callback (spec §4.5e, §9): recursively drive
    /// `execute_task` for a child task declared inside a composite payload.
    pub async fn execute_child(
        &self,
        mut child: Task,
        visible_tasks: Vec<Task>,
        variables: VariableStore,
        cancellation: CancellationFlag,
    ) -> crate::error::Result<crate::orchestrator::TaskOutcome> {
        self.orchestrator.execute_task(&mut child, &visible_tasks, variables, cancellation, self.resuming).await
    }
}
