//! A JSON-path evaluator syntactically close to standard JSONPath, per spec
//! §4.2: `$.name`, `$[index]`, `$["name"]`, `$.array[*]`, filter
//! expressions `$.array[?(@.field OP 'value')]`, and a tail `.length()`
//! pseudo-function.
use crate::errors::JsonPathError;
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Debug, Clone)]
enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
    Filter { field: String, op: FilterOp, value: String },
    Length,
}

/// Normalise a raw path per spec §4.2: single quotes become double quotes;
/// if the path does not start with `$`, prepend `$` (and `.` when the next
/// character is a name character).
pub fn normalize(path: &str) -> String {
    let replaced = path.replace('\'', "\"");
    if replaced.starts_with('$') {
        return replaced;
    }
    let needs_dot = replaced.chars().next().map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false);
    if needs_dot {
        format!("$.{}", replaced)
    } else {
        format!("${}", replaced)
    }
}

fn parse_segments(normalized: &str) -> Result<Vec<Segment>, JsonPathError> {
    if normalized.is_empty() {
        return Err(JsonPathError::Empty);
    }
    let mut chars = normalized.chars().peekable();
    match chars.next() {
        Some('$') => {}
        _ => return Err(JsonPathError::Malformed(normalized.to_string())),
    }
    let rest: String = chars.collect();
    let mut segments = Vec::new();
    let bytes: Vec<char> = rest.chars().collect();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            '.' => {
                i += 1;
                let start = i;
                while i < bytes.len() && bytes[i] != '.' && bytes[i] != '[' {
                    i += 1;
                }
                let name: String = bytes[start..i].iter().collect();
                if name.is_empty() {
                    return Err(JsonPathError::Malformed(normalized.to_string()));
                }
                if name == "length()" {
                    segments.push(Segment::Length);
                } else {
                    segments.push(Segment::Field(name));
                }
            }
            '[' => {
                let start = i + 1;
                let mut depth = 1usize;
                let mut j = start;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        '[' => depth += 1,
                        ']' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(JsonPathError::Malformed(normalized.to_string()));
                }
                let inner: String = bytes[start..j].iter().collect();
                segments.push(parse_bracket(&inner, normalized)?);
                i = j + 1;
            }
            _ => return Err(JsonPathError::Malformed(normalized.to_string())),
        }
    }
    Ok(segments)
}

fn parse_bracket(inner: &str, whole: &str) -> Result<Segment, JsonPathError> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(filter_src) = inner.strip_prefix("?(").and_then(|s| s.strip_suffix(')')) {
        return parse_filter(filter_src, whole);
    }
    if inner.starts_with('"') && inner.ends_with('"') && inner.len() >= 2 {
        return Ok(Segment::Field(inner[1..inner.len() - 1].to_string()));
    }
    if let Ok(idx) = inner.parse::<usize>() {
        return Ok(Segment::Index(idx));
    }
    Err(JsonPathError::Malformed(whole.to_string()))
}

fn parse_filter(src: &str, whole: &str) -> Result<Segment, JsonPathError> {
    let src = src.trim();
    let ops: [(&str, FilterOp); 6] = [
        ("==", FilterOp::Eq),
        ("!=", FilterOp::Ne),
        (">=", FilterOp::Ge),
        ("<=", FilterOp::Le),
        (">", FilterOp::Gt),
        ("<", FilterOp::Lt),
    ];
    for (token, op) in ops {
        if let Some(pos) = src.find(token) {
            let left = src[..pos].trim();
            let right = src[pos + token.len()..].trim();
            let field = left.strip_prefix("@.").ok_or_else(|| JsonPathError::InvalidFilter(whole.to_string()))?;
            let value = right.trim_matches('"').to_string();
            return Ok(Segment::Filter { field: field.to_string(), op, value });
        }
    }
    Err(JsonPathError::InvalidFilter(whole.to_string()))
}

#[derive(Debug, Clone)]
enum Selection {
    One(Json),
    Many(Vec<Json>),
}

fn get_field<'a>(value: &'a Json, field: &str, path: &str) -> Result<&'a Json, JsonPathError> {
    match value {
        Json::Object(map) => {
            map.get(field).ok_or_else(|| JsonPathError::FieldNotFound { field: field.to_string(), path: path.to_string() })
        }
        _ => Err(JsonPathError::NotIndexable(path.to_string())),
    }
}

fn get_index<'a>(value: &'a Json, idx: usize, path: &str) -> Result<&'a Json, JsonPathError> {
    match value {
        Json::Array(a) => a.get(idx).ok_or(JsonPathError::IndexOutOfBounds { index: idx, path: path.to_string() }),
        _ => Err(JsonPathError::NotIndexable(path.to_string())),
    }
}

fn filter_matches(item: &Json, field: &str, op: &FilterOp, expected: &str) -> bool {
    let actual = match item {
        Json::Object(map) => map.get(field),
        _ => None,
    };
    let actual_str = match actual {
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return matches!(op, FilterOp::Ne),
    };
    let as_numbers = actual_str.parse::<f64>().ok().zip(expected.parse::<f64>().ok());
    match (op, as_numbers) {
        (FilterOp::Eq, Some((a, b))) => a == b,
        (FilterOp::Ne, Some((a, b))) => a != b,
        (FilterOp::Gt, Some((a, b))) => a > b,
        (FilterOp::Lt, Some((a, b))) => a < b,
        (FilterOp::Ge, Some((a, b))) => a >= b,
        (FilterOp::Le, Some((a, b))) => a <= b,
        (FilterOp::Eq, None) => actual_str == expected,
        (FilterOp::Ne, None) => actual_str != expected,
        (FilterOp::Gt, None) => actual_str > *expected,
        (FilterOp::Lt, None) => actual_str < *expected,
        (FilterOp::Ge, None) => actual_str >= *expected,
        (FilterOp::Le, None) => actual_str <= *expected,
    }
}

/// Evaluate `path` against `root`. The container is normalised first per
/// spec §4.9. Wildcard and filter segments yield a JSON array of matches;
/// callers that need the "single-element array unwraps transparently" rule
/// apply it themselves (spec §4.2), since that rule is about comparison
/// operators, not evaluation.
pub fn evaluate(root: &Json, path: &str) -> Result<Json, JsonPathError> {
    let normalized = normalize(path);
    let segments = parse_segments(&normalized)?;
    let normalized_root = crate::value::normalize_container(root);
    let mut current = Selection::One(normalized_root);

    for (i, seg) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        current = match seg {
            Segment::Field(name) => match &current {
                Selection::One(v) => Selection::One(get_field(v, name, &normalized)?.clone()),
                Selection::Many(items) => {
                    let mut out = Vec::new();
                    for item in items {
                        if let Ok(v) = get_field(item, name, &normalized) {
                            out.push(v.clone());
                        }
                    }
                    Selection::Many(out)
                }
            },
            Segment::Index(idx) => match &current {
                Selection::One(v) => Selection::One(get_index(v, *idx, &normalized)?.clone()),
                Selection::Many(items) => {
                    let mut out = Vec::new();
                    for item in items {
                        if let Ok(v) = get_index(item, *idx, &normalized) {
                            out.push(v.clone());
                        }
                    }
                    Selection::Many(out)
                }
            },
            Segment::Wildcard => match &current {
                Selection::One(Json::Array(a)) => Selection::Many(a.clone()),
                Selection::One(Json::Object(o)) => Selection::Many(o.values().cloned().collect()),
                Selection::One(other) => return Err(JsonPathError::NotIndexable(other.to_string())),
                Selection::Many(items) => Selection::Many(items.clone()),
            },
            Segment::Filter { field, op, value } => {
                let items: Vec<Json> = match &current {
                    Selection::One(Json::Array(a)) => a.clone(),
                    Selection::One(other) => return Err(JsonPathError::NotIndexable(other.to_string())),
                    Selection::Many(items) => items.clone(),
                };
                Selection::Many(items.into_iter().filter(|item| filter_matches(item, field, op, value)).collect())
            }
            Segment::Length => {
                if !is_last {
                    return Err(JsonPathError::InvalidFilter(normalized.clone()));
                }
                let count = match &current {
                    Selection::One(Json::Array(a)) => a.len(),
                    Selection::One(Json::Object(o)) => o.len(),
                    Selection::One(Json::String(s)) => s.chars().count(),
                    Selection::Many(items) => items.len(),
                    Selection::One(_) => return Err(JsonPathError::LengthUnsupported),
                };
                return Ok(Json::from(count));
            }
        };
    }

    Ok(match current {
        Selection::One(v) => v,
        Selection::Many(items) => Json::Array(items),
    })
}

/// Recursively unwrap a single-element array, per spec §4.2's comparison
/// unwrap rule.
pub fn unwrap_single(value: &Json) -> Json {
    match value {
        Json::Array(items) if items.len() == 1 => unwrap_single(&items[0]),
        other => other.clone(),
    }
}
