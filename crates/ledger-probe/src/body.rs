//! Schema-less access to JSON response bodies.
//!
//! The ledger service's response shapes are not a fixed contract for the
//! harness, so bodies are kept as generic [`serde_json::Value`] trees and
//! read through accessors that return `None` for anything missing or of the
//! wrong type instead of failing.

use serde_json::Value;

/// A parsed JSON body with tolerant, path-based accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBody {
    value: Value,
}

impl ResponseBody {
    /// Parses a raw body. Empty or non-JSON text yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        serde_json::from_str(raw).ok().map(Self::from_value)
    }

    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Looks up a dot-separated path (e.g., `"account.id"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.value, path)
    }

    /// Returns true if the path exists and is not JSON `null`.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn str_field(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn f64_field(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }
}

/// Resolves a dot-separated object path inside `value`.
///
/// JSON `null` is treated the same as an absent key.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Compares two JSON values, treating numbers by numeric value.
///
/// `100`, `100.0` and `1e2` are all equal; every other type compares
/// structurally.
pub fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= f64::EPSILON * scale
            }
            _ => a == b,
        },
        _ => expected == actual,
    }
}

/// Renders a value for result messages: strings quoted without JSON
/// escaping, everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

/// Converts an identifier-like value to a string (strings and numbers only).
pub fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
