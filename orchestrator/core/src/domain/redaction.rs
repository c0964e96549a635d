// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Payload shaping for tool-call logs.
//!
//! Summary mode records only structure (keys and serialized size); persisted
//! mode records the payload with configured fields replaced by
//! [`REDACTION_MARKER`]. Field paths are dotted (`credentials.password`);
//! arrays along the path are traversed element-wise.

use serde_json::{json, Map, Value};

pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Copy of `value` with every listed field path replaced by the marker.
pub fn redact(value: &Value, fields: &[String]) -> Value {
    let mut redacted = value.clone();
    for field in fields {
        let path: Vec<&str> = field.split('.').filter(|s| !s.is_empty()).collect();
        if !path.is_empty() {
            redact_path(&mut redacted, &path);
        }
    }
    redacted
}

fn redact_path(value: &mut Value, path: &[&str]) {
    match value {
        Value::Object(map) => {
            let (head, rest) = (path[0], &path[1..]);
            if let Some(child) = map.get_mut(head) {
                if rest.is_empty() {
                    *child = Value::String(REDACTION_MARKER.to_string());
                } else {
                    redact_path(child, rest);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_path(item, path);
            }
        }
        _ => {}
    }
}

/// Structural summary of a map: sorted keys and serialized byte length.
pub fn summarize(map: &Map<String, Value>) -> Value {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    let bytes = serde_json::to_vec(map).map(|b| b.len()).unwrap_or(0);
    json!({ "keys": keys, "bytes": bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_top_level_and_nested() {
        let value = json!({
            "query": "incident",
            "api_key": "sk-123",
            "credentials": {"user": "svc", "password": "hunter2"}
        });
        let out = redact(
            &value,
            &["api_key".to_string(), "credentials.password".to_string()],
        );
        assert_eq!(out["api_key"], REDACTION_MARKER);
        assert_eq!(out["credentials"]["password"], REDACTION_MARKER);
        assert_eq!(out["credentials"]["user"], "svc");
        assert_eq!(out["query"], "incident");
        // source untouched
        assert_eq!(value["api_key"], "sk-123");
    }

    #[test]
    fn test_missing_paths_are_ignored() {
        let value = json!({"a": 1});
        assert_eq!(redact(&value, &["b.c".to_string(), "".to_string()]), value);
    }

    #[test]
    fn test_arrays_traversed() {
        let value = json!({"rows": [{"ssn": "1"}, {"ssn": "2", "name": "x"}]});
        let out = redact(&value, &["rows.ssn".to_string()]);
        assert_eq!(out["rows"][0]["ssn"], REDACTION_MARKER);
        assert_eq!(out["rows"][1]["ssn"], REDACTION_MARKER);
        assert_eq!(out["rows"][1]["name"], "x");
    }

    #[test]
    fn test_summary_has_no_values() {
        let map = json!({"secret": "v", "b": 2}).as_object().cloned().unwrap();
        let summary = summarize(&map);
        assert_eq!(summary["keys"], json!(["b", "secret"]));
        assert!(!summary.to_string().contains("\"v\""));
    }
}
