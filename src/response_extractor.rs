//! Best-effort recovery of a JSON object from free-form model output.
//!
//! This is intentionally permissive. Whatever it returns still has to pass
//! [`crate::recipe_schema::validate_recipe`].

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)```[ \t]*json[^\n{]*\n?(.*?)```").ok());

static ANY_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`{]*\n?(.*?)```").ok());

/// Returns the interior of the first fenced block, preferring one tagged
/// `json`, or the whole text when there is no fence.
pub fn unfence(raw: &str) -> &str {
    let patterns: [&Option<Regex>; 2] = [&JSON_FENCE, &ANY_FENCE];
    for pattern in patterns {
        let interior = pattern
            .as_ref()
            .and_then(|re| re.captures(raw))
            .and_then(|caps| caps.get(1));
        if let Some(interior) = interior {
            return interior.as_str();
        }
    }
    raw
}

/// Parses the widest `{ ... }` span of the (unfenced) text as a JSON object.
///
/// `None` means no object could be found; it is never an error.
pub fn extract_json(raw: &str) -> Option<Map<String, Value>> {
    let text = unfence(raw);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!("brace-delimited span is not valid JSON: {e}");
            None
        }
    }
}
