//! Tree-walking interpreter for the subset of JSON Schema used by resources.
//!
//! The validator works purely on schema data, so a schema replaced at runtime
//! takes effect on the next call. Every violation is collected; nothing
//! short-circuits except a type mismatch, after which the remaining keywords
//! for that value would only add noise.

use dashmap::DashMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

// Pattern source -> compile result, shared by every validation
static COMPILED_PATTERNS: LazyLock<DashMap<String, Result<Regex, regex::Error>>> =
    LazyLock::new(DashMap::new);

fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(cached) = COMPILED_PATTERNS.get(pattern) {
        return cached.value().clone();
    }
    let compiled = Regex::new(pattern);
    COMPILED_PATTERNS.insert(pattern.to_string(), compiled.clone());
    compiled
}

/// A single reason a candidate value failed validation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Slash-separated location of the offending value, empty for the root.
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Validates `candidate` against `schema`, returning all violations found.
///
/// A schema that is not a JSON object places no constraint on the value.
pub fn validate(schema: &Value, candidate: &Value) -> Vec<Violation> {
    match schema {
        Value::Object(schema) => validate_object_schema(schema, candidate),
        _ => Vec::new(),
    }
}

pub(crate) fn validate_object_schema(schema: &Map<String, Value>, candidate: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    walk(schema, candidate, "", &mut violations);
    violations
}

fn walk(schema: &Map<String, Value>, value: &Value, path: &str, out: &mut Vec<Violation>) {
    if let Some(expected) = schema.get("type") {
        if !type_matches(expected, value) {
            out.push(Violation::new(
                path,
                format!(
                    "expected {}, found {}",
                    describe_expected(expected),
                    type_name(value)
                ),
            ));
            return;
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            out.push(Violation::new(
                path,
                format!("value {} is not one of {}", value, Value::Array(allowed.clone())),
            ));
        }
    }

    match value {
        Value::Object(object) => check_object(schema, object, path, out),
        Value::Array(items) => check_array(schema, items, path, out),
        Value::String(text) => check_string(schema, text, path, out),
        Value::Number(_) => check_number(schema, value, path, out),
        Value::Bool(_) | Value::Null => {}
    }
}

fn check_object(
    schema: &Map<String, Value>,
    object: &Map<String, Value>,
    path: &str,
    out: &mut Vec<Violation>,
) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                out.push(Violation::new(path, format!("missing required field: {}", key)));
            }
        }
    }

    let properties = match schema.get("properties") {
        Some(Value::Object(properties)) => Some(properties),
        _ => None,
    };

    for (key, field_value) in object {
        let child_path = format!("{}/{}", path, key);
        match properties.and_then(|p| p.get(key)) {
            Some(Value::Object(sub_schema)) => walk(sub_schema, field_value, &child_path, out),
            Some(_) => {}
            None => match schema.get("additionalProperties") {
                Some(Value::Bool(false)) => {
                    out.push(Violation::new(path, format!("unexpected field: {}", key)));
                }
                Some(Value::Object(extra_schema)) => {
                    walk(extra_schema, field_value, &child_path, out)
                }
                _ => {}
            },
        }
    }
}

fn check_array(schema: &Map<String, Value>, items: &[Value], path: &str, out: &mut Vec<Violation>) {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            out.push(Violation::new(
                path,
                format!("array must contain at least {} items, found {}", min, items.len()),
            ));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            out.push(Violation::new(
                path,
                format!("array must contain at most {} items, found {}", max, items.len()),
            ));
        }
    }
    if let Some(Value::Object(item_schema)) = schema.get("items") {
        for (index, item) in items.iter().enumerate() {
            walk(item_schema, item, &format!("{}/{}", path, index), out);
        }
    }
}

fn check_string(schema: &Map<String, Value>, text: &str, path: &str, out: &mut Vec<Violation>) {
    let length = text.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if length < min {
            out.push(Violation::new(
                path,
                format!("string must be at least {} characters long", min),
            ));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if length > max {
            out.push(Violation::new(
                path,
                format!("string must be at most {} characters long", max),
            ));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        match compiled_pattern(pattern) {
            Ok(regex) if !regex.is_match(text) => {
                out.push(Violation::new(
                    path,
                    format!("string does not match pattern '{}'", pattern),
                ));
            }
            Ok(_) => {}
            Err(e) => out.push(Violation::new(
                path,
                format!("schema pattern '{}' is not a valid regular expression: {}", pattern, e),
            )),
        }
    }
    // Unknown formats are annotations only.
    if schema.get("format").and_then(Value::as_str) == Some("email")
        && !EMAIL_PATTERN.is_match(text)
    {
        out.push(Violation::new(path, "string is not a valid email address"));
    }
}

fn check_number(schema: &Map<String, Value>, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let Some(number) = value.as_f64() else {
        return;
    };
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if number < min {
            out.push(Violation::new(
                path,
                format!("value {} is less than minimum {}", value, min),
            ));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if number > max {
            out.push(Violation::new(
                path,
                format!("value {} is greater than maximum {}", value, max),
            ));
        }
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => matches_type_name(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_type_name(name, value)),
        // A malformed `type` keyword constrains nothing.
        _ => true,
    }
}

fn matches_type_name(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => is_integer(value),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) if is_integer(value) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe_expected(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}
