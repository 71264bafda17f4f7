//! Best-effort extraction of structured data from free-text LLM replies.
//!
//! Nothing here returns an error. A reply that yields nothing usable is an
//! empty `Vec` (or `None`), which the quota loop treats as a zero-record
//! attempt.

use serde_json::{Map, Value};
use tracing::debug;

use crate::utils::json_extraction::{
    fenced_blocks, object_fragments, outermost_array, outermost_object,
};

/// A loosely-typed candidate record: field name to JSON value.
pub type Candidate = Map<String, Value>;

/// Extracts candidate records from a generation reply.
///
/// Strategies, first success wins:
/// 1. the whole reply is JSON;
/// 2. a fenced code block holds JSON;
/// 3. the outermost `[...]` region is JSON;
/// 4. every balanced `{...}` fragment is parsed on its own.
///
/// Only objects with a non-blank string `query` field are returned.
pub fn parse_candidates(raw: &str) -> Vec<Candidate> {
    let text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if let Some(found) = candidates_from_json(text) {
        return found;
    }

    for block in fenced_blocks(text) {
        if let Some(found) = candidates_from_json(block) {
            debug!(count = found.len(), "Parsed candidates from fenced block");
            return found;
        }
    }

    if let Some(region) = outermost_array(text) {
        if let Some(found) = candidates_from_json(region) {
            debug!(count = found.len(), "Parsed candidates from embedded array");
            return found;
        }
    }

    let found: Vec<Candidate> = object_fragments(text)
        .into_iter()
        .filter_map(|fragment| serde_json::from_str::<Value>(fragment).ok())
        .filter_map(|value| match value {
            Value::Object(map) if has_query(&map) => Some(map),
            _ => None,
        })
        .collect();
    debug!(count = found.len(), "Recovered candidates from object fragments");
    found
}

/// Extracts a single JSON object from a reply, e.g. a taxonomy.
///
/// Uses the same fallbacks as [`parse_candidates`], ending with the first
/// balanced fragment that parses as an object.
pub fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let as_object = |s: &str| match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };

    as_object(text)
        .or_else(|| fenced_blocks(text).into_iter().find_map(as_object))
        .or_else(|| outermost_object(text).and_then(as_object))
        .or_else(|| object_fragments(text).into_iter().find_map(as_object))
}

fn candidates_from_json(text: &str) -> Option<Vec<Candidate>> {
    let value = serde_json::from_str::<Value>(text).ok()?;
    candidates_from_value(value)
}

fn candidates_from_value(value: Value) -> Option<Vec<Candidate>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) if has_query(&map) => Some(map),
                    _ => None,
                })
                .collect(),
        ),
        Value::Object(map) if has_query(&map) => Some(vec![map]),
        // Wrapper objects such as {"queries": [...]}: use the first array of objects.
        Value::Object(map) => map
            .into_iter()
            .map(|(_, v)| v)
            .find(|v| {
                v.as_array()
                    .is_some_and(|items| items.iter().any(Value::is_object))
            })
            .and_then(candidates_from_value),
        _ => None,
    }
}

fn has_query(map: &Map<String, Value>) -> bool {
    map.get("query")
        .and_then(Value::as_str)
        .is_some_and(|q| !q.trim().is_empty())
}
