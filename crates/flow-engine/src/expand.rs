//! Recursive placeholder expansion of a task payload (spec §4.5c): each
//! action family gets a different expansion policy before its `execute` is
//! invoked.
use crate::error::Result;
use flow_core::{resolve_placeholders, Task, VariableStore};
use serde_json::Value as Json;

/// Walk a JSON value, resolving every string leaf's placeholders. Non-string
/// scalars pass through unchanged; objects/arrays recurse.
pub fn expand_value(value: &Json, vars: &VariableStore, tasks: &[Task]) -> Result<Json> {
    match value {
        Json::String(s) => Ok(resolve_placeholders(s, vars, tasks)?),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_value(item, vars, tasks)?);
            }
            Ok(Json::Array(out))
        }
        Json::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), expand_value(v, vars, tasks)?);
            }
            Ok(Json::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Expand every field of an object except the ones named in `skip_fields`,
/// which are copied verbatim.
fn expand_object_except(
    map: &serde_json::Map<String, Json>,
    skip_fields: &[&str],
    vars: &VariableStore,
    tasks: &[Task],
) -> Result<Json> {
    let mut out = serde_json::Map::with_capacity(map.len());
    for (k, v) in map {
        if skip_fields.contains(&k.as_str()) {
            out.insert(k.clone(), v.clone());
        } else {
            out.insert(k.clone(), expand_value(v, vars, tasks)?);
        }
    }
    Ok(Json::Object(out))
}

/// Apply the per-action-family expansion policy from spec §4.5c.
pub fn expand_payload(action_key: &str, payload: &Json, vars: &VariableStore, tasks: &[Task]) -> Result<Json> {
    match action_key {
        "PRINT" | "VARIABLES" | "FOR" => Ok(payload.clone()),
        "PARALLEL" => match payload.as_object() {
            Some(map) => expand_object_except(map, &["tasks"], vars, tasks),
            None => Ok(payload.clone()),
        },
        "EVALUATE" => expand_evaluate_payload(payload, vars, tasks),
        _ => expand_value(payload, vars, tasks),
    }
}

/// EVALUATE keeps every `if_conditions[].{left,right,field,expected}`
/// verbatim — the action resolves those itself when it evaluates each
/// condition (spec §4.6) — and expands everything else recursively.
fn expand_evaluate_payload(payload: &Json, vars: &VariableStore, tasks: &[Task]) -> Result<Json> {
    let Some(map) = payload.as_object() else {
        return Ok(payload.clone());
    };
    let mut out = serde_json::Map::with_capacity(map.len());
    for (k, v) in map {
        if k == "if_conditions" {
            out.insert(k.clone(), v.clone());
        } else {
            out.insert(k.clone(), expand_value(v, vars, tasks)?);
        }
    }
    Ok(Json::Object(out))
}
