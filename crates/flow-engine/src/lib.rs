//! Crate `flow-engine` — the orchestrator, the built-in actions, and the
//! ambient stack (logging, config, artifacts, observer events) that drive a
//! `flow_core::LoadedFlow` to completion.
pub mod actions;
pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod expand;
pub mod logging;
pub mod observer;
pub mod orchestrator;
pub mod registry;
pub mod result;

pub use config::FlowForgeConfig;
pub use error::{EngineError, Result};
pub use orchestrator::{Orchestrator, RunOutcome, RunRequest, Selectors, TaskOutcome};
pub use registry::{Action, ActionName, ActionRegistry, ActionRegistryBuilder};
pub use result::{ActionResult, ControlDirective};
