//! Error taxonomy for the core data model: value coercion, JSON-path
//! evaluation, placeholder resolution and variable-store operations.
//!
//! Loader- and orchestrator-level errors live in `flow_engine::error` and
//! wrap these via `#[from]`, mirroring the split the teacher's `FlowError`
//! (low-level) / `WorkflowError` (high-level) pair already draws.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("empty value cannot be coerced to number")]
    EmptyNumber,
    #[error("cannot coerce {value} to {target_type}")]
    WrongType { value: String, target_type: &'static str },
    #[error("proxy value has an empty key")]
    ProxyEmptyKey,
    #[error("proxy value has an empty value for key '{0}'")]
    ProxyEmptyValue(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("math operation requires a number variable, found {0}")]
    OperationRequiresNumber(&'static str),
    #[error("unknown math operator '{0}'")]
    UnknownOperator(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonPathError {
    #[error("empty json-path expression")]
    Empty,
    #[error("malformed json-path expression '{0}'")]
    Malformed(String),
    #[error("length() unsupported on this value type")]
    LengthUnsupported,
    #[error("field '{field}' not found in path '{path}'")]
    FieldNotFound { field: String, path: String },
    #[error("index {index} out of bounds in path '{path}'")]
    IndexOutOfBounds { index: usize, path: String },
    #[error("cannot index into a scalar value at '{0}'")]
    NotIndexable(String),
    #[error("invalid filter expression '{0}'")]
    InvalidFilter(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaceholderError {
    #[error("empty placeholder expression")]
    Empty,
    #[error("task placeholder missing task id in '{0}'")]
    MissingTaskId(String),
    #[error("task placeholder missing path in '{0}'")]
    MissingPath(String),
    #[error("task '{0}' not found")]
    TaskNotFound(String),
    #[error("task '{0}' has not completed")]
    TaskNotCompleted(String),
    #[error("task '{0}' result is not json, cannot evaluate a json-path against it")]
    NonJsonResult(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error(transparent)]
    JsonPath(#[from] JsonPathError),
    #[error("unknown field '{field}' in legacy task placeholder '{expr}'")]
    UnknownLegacyField { field: String, expr: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("variable name is empty after trimming")]
    EmptyName,
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),
    #[error("duplicate variable name '{0}' in one VARIABLES payload")]
    DuplicateInPayload(String),
    #[error("variable '{0}' already exists and overwrite is false")]
    AlreadyExists(String),
    #[error("operation is only valid for number variables (variable '{0}')")]
    OperationOnNonNumber(String),
    #[error("undefined variable '{0}' referenced by operation")]
    UndefinedOperand(String),
}

pub type Result<T, E = VariableError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("io error reading {0}")]
    IoError(String),
    #[error("parse error in {0}")]
    ParseError(String),
    #[error("schema error in {0}")]
    SchemaError(String),
    #[error("document id '{0}' is already registered to a different path")]
    DuplicateDocumentId(String),
    #[error("import cycle detected at {0}")]
    CycleDetected(String),
    #[error("duplicate task id '{0}' in flattened task sequence")]
    DuplicateTaskId(String),
    #[error("missing required field '{field}' in {path}")]
    MissingField { path: String, field: String },
    #[error("onErrorFlow references unknown flow '{0}'")]
    UnknownOnError(String),
    #[error("finallyFlow/finallyTask references unknown flow or task '{0}'")]
    UnknownFinally(String),
    #[error("unknown flow '{0}'")]
    UnknownFlow(String),
}
