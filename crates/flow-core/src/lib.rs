//! Crate `flow-core` — data model and pure evaluation logic for the
//! declarative workflow engine: `FlowDocument` loading and import
//! resolution, the typed `Variable`/`VariableStore`, the JSON-path
//! evaluator, the placeholder engine, and `RunSnapshot`.
//!
//! This crate has no knowledge of actions, the orchestrator's control flow,
//! or I/O beyond reading flow documents off disk — those live in
//! `flow_engine`, which depends on this crate for its data model.
pub mod document;
pub mod errors;
pub mod jsonpath;
pub mod placeholder;
pub mod snapshot;
pub mod task;
pub mod value;
pub mod variable;

pub use document::*;
pub use errors::*;
pub use jsonpath::{evaluate as evaluate_json_path, unwrap_single};
pub use placeholder::resolve as resolve_placeholders;
pub use snapshot::*;
pub use task::*;
pub use value::*;
pub use variable::*;
