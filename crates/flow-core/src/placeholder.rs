//! The placeholder engine (spec §4.3): `${name}` / `{{name}}` variable
//! placeholders and `${from.task:EXPR}` / `{{from.task:EXPR}}` task
//! placeholders, including the legacy dotted task-field form.
use crate::errors::PlaceholderError;
use crate::jsonpath;
use crate::task::{ResultType, Task, TaskStatus};
use crate::variable::VariableStore;
use serde_json::Value as Json;

const TASK_PREFIX: &str = "from.task:";
const LEGACY_FIELDS: [&str; 4] = ["status", "success", "resultType", "result"];

enum Resolved {
    Whole(Json),
    Partial(String),
}

struct Found<'a> {
    /// Byte range in the source string, including delimiters.
    start: usize,
    end: usize,
    inner: &'a str,
}

/// Find the next `${...}` or `{{...}}` span starting at or after `from`.
fn find_next(s: &str, from: usize) -> Option<Found<'_>> {
    let bytes = s.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(close) = s[i + 2..].find('}') {
                let end = i + 2 + close + 1;
                return Some(Found { start: i, end, inner: &s[i + 2..i + 2 + close] });
            }
            return None;
        }
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(close) = s[i + 2..].find("}}") {
                let end = i + 2 + close + 2;
                return Some(Found { start: i, end, inner: &s[i + 2..i + 2 + close] });
            }
            return None;
        }
        i += 1;
    }
    None
}

fn stringify_for_embed(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn contains_task_placeholder(s: &str) -> bool {
    s.contains(&format!("${{{}", TASK_PREFIX)) || s.contains(&format!("{{{{{}", TASK_PREFIX))
}

fn task_field_value(task: &Task, field: &str) -> Json {
    match field {
        "status" => Json::String(
            match task.status {
                TaskStatus::NotStarted => "not_started",
                TaskStatus::InProgress => "in_progress",
                TaskStatus::Paused => "paused",
                TaskStatus::Completed => "completed",
            }
            .to_string(),
        ),
        "success" => Json::Bool(task.success),
        "resultType" => task
            .result_type
            .map(|rt| {
                Json::String(
                    match rt {
                        ResultType::Bool => "bool",
                        ResultType::String => "string",
                        ResultType::Int => "int",
                        ResultType::Float => "float",
                        ResultType::Json => "json",
                    }
                    .to_string(),
                )
            })
            .unwrap_or(Json::Null),
        "result" => task.result.clone().unwrap_or(Json::Null),
        _ => Json::Null,
    }
}

fn resolve_task_expr(expr: &str, tasks: &[Task]) -> Result<Json, PlaceholderError> {
    if expr.is_empty() {
        return Err(PlaceholderError::MissingTaskId(expr.to_string()));
    }
    if let Some(dollar) = expr.find('$') {
        let mut task_part = &expr[..dollar];
        if let Some(stripped) = task_part.strip_suffix(".result") {
            task_part = stripped;
        }
        if task_part.is_empty() {
            return Err(PlaceholderError::MissingTaskId(expr.to_string()));
        }
        let path_part = &expr[dollar + 1..];
        if path_part.is_empty() {
            return Err(PlaceholderError::MissingPath(expr.to_string()));
        }
        let task = tasks
            .iter()
            .find(|t| t.id == task_part)
            .ok_or_else(|| PlaceholderError::TaskNotFound(task_part.to_string()))?;
        if !task.is_completed() {
            return Err(PlaceholderError::TaskNotCompleted(task_part.to_string()));
        }
        if task.result_type != Some(ResultType::Json) {
            return Err(PlaceholderError::NonJsonResult(task_part.to_string()));
        }
        let result = task.result.clone().unwrap_or(Json::Null);
        return Ok(jsonpath::evaluate(&result, path_part)?);
    }

    for field in LEGACY_FIELDS {
        let suffix = format!(".{}", field);
        if let Some(task_part) = expr.strip_suffix(&suffix) {
            if task_part.is_empty() {
                return Err(PlaceholderError::MissingTaskId(expr.to_string()));
            }
            let task = tasks
                .iter()
                .find(|t| t.id == task_part)
                .ok_or_else(|| PlaceholderError::TaskNotFound(task_part.to_string()))?;
            if !task.is_completed() {
                return Err(PlaceholderError::TaskNotCompleted(task_part.to_string()));
            }
            return Ok(task_field_value(task, field));
        }
    }

    Err(PlaceholderError::MissingPath(expr.to_string()))
}

fn resolve_task_placeholders(s: &str, tasks: &[Task]) -> Result<Resolved, PlaceholderError> {
    let mut out = String::new();
    let mut cursor = 0usize;
    let mut any = false;
    let mut whole_value: Option<Json> = None;

    loop {
        match find_next(s, cursor) {
            None => {
                out.push_str(&s[cursor..]);
                break;
            }
            Some(found) => {
                let Some(rest) = found.inner.strip_prefix(TASK_PREFIX) else {
                    // Not a task placeholder; copy verbatim and keep scanning.
                    out.push_str(&s[cursor..found.end]);
                    cursor = found.end;
                    continue;
                };
                if rest.is_empty() {
                    return Err(PlaceholderError::Empty);
                }
                any = true;
                let value = resolve_task_expr(rest, tasks)?;
                let is_whole = found.start == 0 && found.end == s.len();
                if is_whole {
                    whole_value = Some(value);
                } else {
                    out.push_str(&s[cursor..found.start]);
                    out.push_str(&stringify_for_embed(&value));
                }
                cursor = found.end;
            }
        }
    }

    if let Some(v) = whole_value {
        return Ok(Resolved::Whole(v));
    }
    if !any {
        return Ok(Resolved::Partial(s.to_string()));
    }
    Ok(Resolved::Partial(out))
}

fn resolve_variable_placeholders(s: &str, vars: &VariableStore) -> Result<Resolved, PlaceholderError> {
    let mut out = String::new();
    let mut cursor = 0usize;
    let mut any = false;
    let mut whole_value: Option<Json> = None;

    loop {
        match find_next(s, cursor) {
            None => {
                out.push_str(&s[cursor..]);
                break;
            }
            Some(found) => {
                if found.inner.starts_with(TASK_PREFIX) {
                    out.push_str(&s[cursor..found.end]);
                    cursor = found.end;
                    continue;
                }
                let name = found.inner;
                if name.is_empty() {
                    return Err(PlaceholderError::Empty);
                }
                any = true;
                let var = vars.get(name).ok_or_else(|| PlaceholderError::UndefinedVariable(name.to_string()))?;
                let is_whole = found.start == 0 && found.end == s.len();
                if is_whole && !var.secret {
                    whole_value = Some(var.raw_json());
                } else if is_whole && var.secret {
                    whole_value = Some(Json::String(crate::variable::SECRET_MASK.to_string()));
                } else {
                    out.push_str(&s[cursor..found.start]);
                    if var.secret {
                        out.push_str(crate::variable::SECRET_MASK);
                    } else {
                        out.push_str(&stringify_for_embed(&var.raw_json()));
                    }
                }
                cursor = found.end;
            }
        }
    }

    if let Some(v) = whole_value {
        return Ok(Resolved::Whole(v));
    }
    if !any {
        return Ok(Resolved::Partial(s.to_string()));
    }
    Ok(Resolved::Partial(out))
}

/// Fully resolve a string against the active variable store and the task
/// list, per the three-step order in spec §4.3.
pub fn resolve(s: &str, vars: &VariableStore, tasks: &[Task]) -> Result<Json, PlaceholderError> {
    let after_task = match resolve_task_placeholders(s, tasks)? {
        Resolved::Whole(v) => return Ok(v),
        Resolved::Partial(s) => s,
    };

    let after_vars = match resolve_variable_placeholders(&after_task, vars)? {
        Resolved::Whole(v) => {
            if let Json::String(s) = &v {
                if contains_task_placeholder(s) {
                    return rerun_task_pass(s, tasks);
                }
            }
            return Ok(v);
        }
        Resolved::Partial(s) => s,
    };

    if contains_task_placeholder(&after_vars) {
        return rerun_task_pass(&after_vars, tasks);
    }
    Ok(Json::String(after_vars))
}

fn rerun_task_pass(s: &str, tasks: &[Task]) -> Result<Json, PlaceholderError> {
    match resolve_task_placeholders(s, tasks)? {
        Resolved::Whole(v) => Ok(v),
        Resolved::Partial(s) => Ok(Json::String(s)),
    }
}

/// True if every placeholder in `s` resolved — used by tests asserting the
/// Placeholder totality property (spec §8): no leftover `${...}`/`{{...}}`.
pub fn has_unresolved_placeholder(s: &str) -> bool {
    find_next(s, 0).is_some()
}
