//! `Variable` and the active variable store (spec §3, §4.4).
use crate::errors::VariableError;
use crate::value::{VarType, VariableValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub const SECRET_MASK: &str = "****";

fn valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub var_type: VarType,
    pub value: VariableValue,
    pub secret: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: VarType, value: VariableValue) -> Result<Self, VariableError> {
        let name = name.into();
        if !valid_name(&name) {
            return Err(VariableError::EmptyName);
        }
        let secret = var_type == VarType::Secret;
        Ok(Self { name: name.trim().to_string(), var_type, value, secret })
    }

    /// The externally visible projection: secrets render as `****` in every
    /// observable surface (PRINT output, action results, snapshots, logs).
    pub fn masked_json(&self) -> Json {
        if self.secret {
            Json::String(SECRET_MASK.to_string())
        } else {
            self.value.to_json()
        }
    }

    /// The real value, used only for interpolation into subsequent
    /// payloads — never for an externally visible projection.
    pub fn raw_json(&self) -> Json {
        self.value.to_json()
    }
}

/// The active variable store: name -> Variable, order-preserving so
/// snapshots and the VARIABLES projection are deterministic to compare.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableStore(IndexMap<String, Variable>);

impl VariableStore {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, var: Variable) {
        self.0.insert(var.name.clone(), var);
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.0.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The externally visible projection of the whole store, secrets
    /// masked, used by `task_log.json`'s `environment_variables.json`
    /// sibling file and by observer snapshots.
    pub fn masked_projection(&self) -> serde_json::Map<String, Json> {
        let mut out = serde_json::Map::new();
        for (name, var) in &self.0 {
            out.insert(
                name.clone(),
                serde_json::json!({
                    "type": format!("{:?}", var.var_type).to_lowercase(),
                    "secret": var.secret,
                    "value": var.masked_json(),
                }),
            );
        }
        out
    }
}

impl IntoIterator for VariableStore {
    type Item = (String, Variable);
    type IntoIter = indexmap::map::IntoIter<String, Variable>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
