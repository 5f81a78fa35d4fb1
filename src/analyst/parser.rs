//! Analyst response normalization
//!
//! The analyst answers either with `{"message": {"content": [...]}}` or with a
//! list of `{"content": "..."}` error records. Anything else degrades to a
//! fixed error; this module never panics on unexpected input.

use serde_json::{Map, Value};

/// Message used when the response matches neither known shape
pub const FALLBACK_ERROR: &str = "could not parse output";

/// Typed result of one analyst call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalystResult {
    Ok {
        texts: Vec<String>,
        statements: Vec<String>,
        suggestions: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl AnalystResult {
    fn fallback() -> Self {
        AnalystResult::Error {
            message: FALLBACK_ERROR.to_string(),
        }
    }
}

/// Normalize a raw analyst response
pub fn parse_analyst_response(raw: &Value) -> AnalystResult {
    match raw {
        Value::Object(map) if map.contains_key("message") => match map.get("message") {
            Some(Value::Object(message)) => parse_message(message),
            _ => AnalystResult::fallback(),
        },
        Value::Array(records) => match records.first() {
            Some(first) => AnalystResult::Error {
                message: string_field(first, "content"),
            },
            None => AnalystResult::fallback(),
        },
        _ => AnalystResult::fallback(),
    }
}

fn parse_message(message: &Map<String, Value>) -> AnalystResult {
    let mut texts = Vec::new();
    let mut statements = Vec::new();
    let mut suggestions = Vec::new();

    let items = message
        .get("content")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("text") => texts.push(string_field(item, "text")),
            Some("sql") => statements.push(string_field(item, "statement")),
            Some("suggestions") => {
                if let Some(list) = item.get("suggestions").and_then(Value::as_array) {
                    suggestions.extend(list.iter().filter_map(Value::as_str).map(String::from));
                }
            }
            _ => {}
        }
    }

    AnalystResult::Ok {
        texts,
        statements,
        suggestions,
    }
}

/// Trimmed string field, empty when missing or not a string
fn string_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}
