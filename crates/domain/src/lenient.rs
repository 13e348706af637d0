//! Forgiving readers for loosely typed JSON fields
//!
//! The comment API is inconsistent about numbers versus strings, so every
//! reader here accepts either and returns `None` instead of failing.

use serde_json::Value;

/// Integer from a JSON number (fractions truncated) or a numeric string
pub(crate) fn int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Non-negative integer; negatives clamp to zero
pub(crate) fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) if n.as_u64().is_some() => n.as_u64(),
        _ => int(value).map(|i| u64::try_from(i.max(0)).unwrap_or(0)),
    }
}

/// Identifier from a number or a non-blank string
pub(crate) fn id(value: &Value) -> Option<String> {
    let id = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id) }
}

/// Display text from a string, or a number rendered as text
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
