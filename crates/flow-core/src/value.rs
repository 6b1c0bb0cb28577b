//! Typed conversions between JSON and the in-memory `VariableValue`
//! representation (spec §4.9), plus container normalisation for the
//! JSON-path evaluator.
use crate::errors::CoercionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    String,
    Number,
    Bool,
    Array,
    Object,
    Secret,
    Proxy,
}

impl VarType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Some(VarType::String),
            "number" => Some(VarType::Number),
            "bool" | "boolean" => Some(VarType::Bool),
            "array" => Some(VarType::Array),
            "object" => Some(VarType::Object),
            "secret" => Some(VarType::Secret),
            "proxy" => Some(VarType::Proxy),
            _ => None,
        }
    }
}

/// The coerced in-memory representation of a `Variable`'s value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    String(String),
    Number(f64),
    Bool(bool),
    Array(Vec<Json>),
    Object(Map<String, Json>),
    Proxy(IndexMap<String, String>),
}

impl VariableValue {
    /// The externally visible projection of this value: secrets are masked
    /// by the caller (this method only converts to JSON, it does not know
    /// whether the owning `Variable` is secret).
    pub fn to_json(&self) -> Json {
        match self {
            VariableValue::String(s) => Json::String(s.clone()),
            VariableValue::Number(n) => {
                serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null)
            }
            VariableValue::Bool(b) => Json::Bool(*b),
            VariableValue::Array(a) => Json::Array(a.clone()),
            VariableValue::Object(o) => Json::Object(o.clone()),
            VariableValue::Proxy(p) => {
                let mut m = Map::new();
                for (k, v) in p {
                    m.insert(k.clone(), Json::String(v.clone()));
                }
                Json::Object(m)
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            VariableValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn json_to_display_string(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a resolved JSON value into the declared `VarType`'s in-memory
/// representation, per spec §4.9.
pub fn coerce(target: VarType, value: &Json) -> Result<VariableValue, CoercionError> {
    match target {
        VarType::String | VarType::Secret => Ok(VariableValue::String(json_to_display_string(value))),
        VarType::Number => coerce_number(value).map(VariableValue::Number),
        VarType::Bool => coerce_bool(value).map(VariableValue::Bool),
        VarType::Array => coerce_array(value).map(VariableValue::Array),
        VarType::Object => coerce_object(value).map(VariableValue::Object),
        VarType::Proxy => coerce_proxy(value).map(VariableValue::Proxy),
    }
}

fn coerce_number(value: &Json) -> Result<f64, CoercionError> {
    match value {
        Json::Number(n) => n.as_f64().ok_or_else(|| CoercionError::WrongType {
            value: value.to_string(),
            target_type: "number",
        }),
        Json::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(CoercionError::EmptyNumber);
            }
            trimmed.parse::<f64>().map_err(|_| CoercionError::WrongType {
                value: s.clone(),
                target_type: "number",
            })
        }
        other => Err(CoercionError::WrongType { value: other.to_string(), target_type: "number" }),
    }
}

fn coerce_bool(value: &Json) -> Result<bool, CoercionError> {
    match value {
        Json::Bool(b) => Ok(*b),
        Json::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(CoercionError::WrongType { value: s.clone(), target_type: "bool" }),
        },
        other => Err(CoercionError::WrongType { value: other.to_string(), target_type: "bool" }),
    }
}

fn coerce_array(value: &Json) -> Result<Vec<Json>, CoercionError> {
    match value {
        Json::Array(a) => Ok(a.clone()),
        other => Err(CoercionError::WrongType { value: other.to_string(), target_type: "array" }),
    }
}

fn coerce_object(value: &Json) -> Result<Map<String, Json>, CoercionError> {
    match value {
        Json::Object(o) => Ok(o.clone()),
        other => Err(CoercionError::WrongType { value: other.to_string(), target_type: "object" }),
    }
}

fn coerce_proxy(value: &Json) -> Result<IndexMap<String, String>, CoercionError> {
    let mut out = IndexMap::new();
    match value {
        Json::String(s) => {
            if s.trim().is_empty() {
                return Err(CoercionError::ProxyEmptyValue("http".into()));
            }
            out.insert("http".to_string(), s.clone());
        }
        Json::Object(o) => {
            for (k, v) in o {
                let key = k.trim().to_string();
                if key.is_empty() {
                    return Err(CoercionError::ProxyEmptyKey);
                }
                let val = json_to_display_string(v);
                if val.trim().is_empty() {
                    return Err(CoercionError::ProxyEmptyValue(key));
                }
                out.insert(key, val);
            }
        }
        other => return Err(CoercionError::WrongType { value: other.to_string(), target_type: "proxy" }),
    }
    Ok(out)
}

/// Walk a task result decoding any raw JSON-shaped strings into their
/// generic structure, so the JSON-path evaluator always sees a fully
/// materialised tree (spec §4.9).
pub fn normalize_container(value: &Json) -> Json {
    match value {
        Json::String(s) => {
            if let Ok(parsed) = serde_json::from_str::<Json>(s) {
                if parsed.is_object() || parsed.is_array() {
                    return normalize_container(&parsed);
                }
            }
            value.clone()
        }
        Json::Array(items) => Json::Array(items.iter().map(normalize_container).collect()),
        Json::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize_container(v));
            }
            Json::Object(out)
        }
        other => other.clone(),
    }
}
