//! The action registry (spec §9 design notes): a process-wide, init-at-
//! start, read-during-run, never-mutated-at-runtime map from uppercased
//! action name to implementation. Built via `ActionRegistryBuilder::freeze`
//! so the frozen `ActionRegistry` itself exposes no mutating method.
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::result::ActionResult;
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;

/// The only contract between the core engine and its leaf/composite
/// action collaborators (spec §6).
#[async_trait]
pub trait Action: Send + Sync {
    /// Case-insensitive identity; the registry uppercases it on lookup.
    fn name(&self) -> &'static str;

    async fn execute(&self, payload: &Json, ctx: &mut ExecutionContext) -> Result<ActionResult>;

    /// Validation constraints this action contributes to the combined
    /// document schema (spec §4.1 step 2). `None` if it contributes none.
    fn json_schema(&self) -> Option<Json> {
        None
    }
}

/// Newtype over the uppercased action identifier, used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionName(String);

impl ActionName {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub struct ActionRegistryBuilder {
    actions: HashMap<ActionName, Arc<dyn Action>>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, action: impl Action + 'static) -> Self {
        let key = ActionName::new(action.name());
        self.actions.insert(key, Arc::new(action));
        self
    }

    /// Freeze the builder into an immutable registry. Nothing registered
    /// after this point is visible to any run — per spec §9, later
    /// registration is a programming error, not a runtime path.
    pub fn freeze(self) -> ActionRegistry {
        ActionRegistry { actions: self.actions }
    }
}

pub struct ActionRegistry {
    actions: HashMap<ActionName, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn get(&self, raw_name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(&ActionName::new(raw_name)).cloned()
    }

    pub fn contains(&self, raw_name: &str) -> bool {
        self.actions.contains_key(&ActionName::new(raw_name))
    }

    pub fn json_schemas(&self) -> Vec<Json> {
        self.actions.values().filter_map(|a| a.json_schema()).collect()
    }
}
