//! Output Normalizer: coerces untrusted agent responses into `AgentOutput`.
//!
//! Responses are first classified into a closed set of shapes, then each shape
//! is normalized on its own. Nothing here can fail: anything unrecognizable
//! becomes plain text with no suggestions and zero confidence.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::enhancement::agents::AgentRole;

pub const MAX_SUGGESTIONS: usize = 6;

static LINE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n]+").expect("valid line split regex"));

/// One role's normalized output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutput {
    pub role: AgentRole,
    pub text: String,
    /// Ordered, deduplicated, at most `MAX_SUGGESTIONS`.
    pub suggestions: Vec<String>,
    /// 0.0 – 1.0
    pub confidence: f64,
    #[serde(skip_serializing)]
    pub meta: Value,
}

/// The shapes a provider response is known to arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Object whose `text` is prose.
    Flat {
        text: String,
        suggestions: Value,
        confidence: Value,
    },
    /// Object whose `text` holds a `sections` array, inline or JSON-encoded.
    Sectioned {
        sections: Vec<Value>,
        suggestions: Value,
        confidence: Value,
    },
    /// Bare string that is not JSON.
    PlainText(String),
    /// JSON-looking text that does not parse to an object, or a non-object value.
    Malformed(String),
}

fn looks_like_json(s: &str) -> bool {
    let s = s.trim();
    (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'))
}

/// Stringifies a loose JSON value the way a lenient reader would.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn sections_of(value: &Value) -> Option<Vec<Value>> {
    value.get("sections").and_then(Value::as_array).cloned()
}

pub fn classify(raw: &Value) -> ResponseShape {
    match raw {
        Value::Object(map) => classify_object(map),
        Value::String(s) if looks_like_json(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => classify_object(&map),
            _ => ResponseShape::Malformed(s.trim().to_string()),
        },
        Value::String(s) => ResponseShape::PlainText(s.trim().to_string()),
        other => ResponseShape::Malformed(value_to_text(other)),
    }
}

fn classify_object(map: &Map<String, Value>) -> ResponseShape {
    let suggestions = map.get("suggestions").cloned().unwrap_or(Value::Null);
    let confidence = map.get("confidence").cloned().unwrap_or(Value::Null);

    let flat = |text: String| ResponseShape::Flat {
        text,
        suggestions: suggestions.clone(),
        confidence: confidence.clone(),
    };
    let sectioned = |sections: Vec<Value>| ResponseShape::Sectioned {
        sections,
        suggestions: suggestions.clone(),
        confidence: confidence.clone(),
    };

    match map.get("text") {
        Some(Value::String(s)) if looks_like_json(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Object(_)) => {
                if let Some(sections) = sections_of(&inner) {
                    sectioned(sections)
                } else if let Some(text) = inner.get("text") {
                    flat(value_to_text(text))
                } else {
                    flat(s.trim().to_string())
                }
            }
            _ => flat(s.trim().to_string()),
        },
        Some(inner @ Value::Object(_)) => match sections_of(inner) {
            Some(sections) => sectioned(sections),
            None => flat(value_to_text(inner)),
        },
        Some(text) => flat(value_to_text(text)),
        None => flat(String::new()),
    }
}

/// Section titles uppercased, each followed by its body, blank line between sections.
pub fn flatten_sections(sections: &[Value]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for section in sections {
        let (title, body) = match section {
            Value::Object(map) => {
                let title = ["title", "type"]
                    .iter()
                    .filter_map(|k| map.get(*k))
                    .map(value_to_text)
                    .find(|t| !t.is_empty())
                    .unwrap_or_default();
                let body = map.get("text").map(value_to_text).unwrap_or_default();
                (title, body)
            }
            other => (String::new(), value_to_text(other)),
        };

        let title = title.trim().to_uppercase();
        if !title.is_empty() {
            parts.push(title);
        }
        if !body.is_empty() {
            parts.push(body);
        }
        parts.push(String::new());
    }
    parts.join("\n").trim().to_string()
}

/// Keeps first occurrences (exact, case-sensitive), then caps.
pub fn dedup_capped<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .take(cap)
        .collect()
}

/// Array of strings, or a single string split on newlines and bullet markers.
pub fn coerce_suggestions(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => LINE_SPLIT_RE
            .split(s)
            .map(|line| {
                line.trim_matches(|c: char| c == '-' || c == '•' || c == ' ' || c == '\t')
                    .to_string()
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    dedup_capped(items, MAX_SUGGESTIONS)
}

/// Missing or unparseable confidence is 0; anything else is clamped to [0, 1].
pub fn coerce_confidence(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Normalizes one raw response for `role`. `meta` is carried through untouched.
pub fn normalize(role: AgentRole, raw: &Value, meta: Value) -> AgentOutput {
    let (text, suggestions, confidence) = match classify(raw) {
        ResponseShape::Flat {
            text,
            suggestions,
            confidence,
        } => (
            text,
            coerce_suggestions(&suggestions),
            coerce_confidence(&confidence),
        ),
        ResponseShape::Sectioned {
            sections,
            suggestions,
            confidence,
        } => (
            flatten_sections(&sections),
            coerce_suggestions(&suggestions),
            coerce_confidence(&confidence),
        ),
        ResponseShape::PlainText(text) | ResponseShape::Malformed(text) => (text, Vec::new(), 0.0),
    };

    AgentOutput {
        role,
        text,
        suggestions,
        confidence,
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn norm(raw: Value) -> AgentOutput {
        normalize(AgentRole::Writer, &raw, Value::Null)
    }

    #[test]
    fn test_proper_object() {
        let out = norm(json!({
            "text": "  Led a team of 5 engineers  ",
            "suggestions": ["Add metrics", "Quantify scope"],
            "confidence": 0.82
        }));
        assert_eq!(out.text, "Led a team of 5 engineers");
        assert_eq!(out.suggestions, vec!["Add metrics", "Quantify scope"]);
        assert_eq!(out.confidence, 0.82);
    }

    #[test]
    fn test_provider_body_string_holding_json() {
        let body = r#"{"text": "Shipped v2", "suggestions": ["one"], "confidence": 0.7}"#;
        let out = norm(Value::String(body.to_string()));
        assert_eq!(out.text, "Shipped v2");
        assert_eq!(out.suggestions, vec!["one"]);
        assert_eq!(out.confidence, 0.7);
    }

    #[test]
    fn test_text_field_with_encoded_sections_is_flattened() {
        let inner = json!({
            "sections": [
                {"title": "Experience", "text": "Led migrations"},
                {"type": "skills", "text": "Rust, SQL"}
            ]
        })
        .to_string();
        let out = norm(json!({"text": inner, "suggestions": [], "confidence": 0.9}));
        assert_eq!(out.text, "EXPERIENCE\nLed migrations\n\nSKILLS\nRust, SQL");
        assert_eq!(out.confidence, 0.9);
    }

    #[test]
    fn test_text_field_as_inline_sections_object() {
        let out = norm(json!({
            "text": {"sections": [{"title": "Summary", "text": "Backend engineer"}]},
            "confidence": 0.5
        }));
        assert_eq!(out.text, "SUMMARY\nBackend engineer");
    }

    #[test]
    fn test_text_field_with_encoded_flat_object() {
        let inner = json!({"text": "Inner prose"}).to_string();
        let out = norm(json!({"text": inner}));
        assert_eq!(out.text, "Inner prose");
    }

    #[test]
    fn test_text_field_with_broken_json_is_kept_verbatim() {
        let out = norm(json!({"text": "{not json}", "confidence": 0.4}));
        assert_eq!(out.text, "{not json}");
        assert_eq!(out.confidence, 0.4);
    }

    #[test]
    fn test_bare_plain_string() {
        let out = norm(Value::String("  Just some prose back  ".to_string()));
        assert_eq!(out.text, "Just some prose back");
        assert!(out.suggestions.is_empty());
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_bare_string_that_fails_to_parse() {
        let out = norm(Value::String("{\"text\": \"oops\"".to_string() + "}}"));
        assert!(matches!(
            classify(&Value::String("[1, 2".to_string() + "]]")),
            ResponseShape::Malformed(_)
        ));
        assert_eq!(out.confidence, 0.0);
        assert!(out.suggestions.is_empty());
    }

    #[test]
    fn test_non_object_values_are_malformed() {
        assert!(matches!(classify(&json!(42)), ResponseShape::Malformed(_)));
        assert!(matches!(classify(&json!(null)), ResponseShape::Malformed(_)));
        assert!(matches!(
            classify(&Value::String("[\"a\"]".to_string())),
            ResponseShape::Malformed(_)
        ));
        let out = norm(json!(["a", "b"]));
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_confidence_defaults_and_clamps() {
        assert_eq!(coerce_confidence(&json!(null)), 0.0);
        assert_eq!(coerce_confidence(&json!("high")), 0.0);
        assert_eq!(coerce_confidence(&json!("0.75")), 0.75);
        assert_eq!(coerce_confidence(&json!(1.7)), 1.0);
        assert_eq!(coerce_confidence(&json!(-3)), 0.0);
        assert_eq!(coerce_confidence(&json!(true)), 0.0);
        assert_eq!(coerce_confidence(&json!({"v": 1})), 0.0);
        assert_eq!(coerce_confidence(&json!("NaN")), 0.0);
    }

    #[test]
    fn test_missing_confidence_is_zero() {
        let out = norm(json!({"text": "x", "suggestions": ["a"]}));
        assert_eq!(out.confidence, 0.0);
    }

    #[test]
    fn test_suggestions_from_bulleted_string() {
        let s = coerce_suggestions(&json!("- Add metrics\n• Use stronger verbs\r\n\n  - Add metrics \n-"));
        assert_eq!(s, vec!["Add metrics", "Use stronger verbs"]);
    }

    #[test]
    fn test_suggestions_dedup_preserves_first_occurrence_and_caps() {
        let s = coerce_suggestions(&json!([
            "b", "a", "b", "  ", "c", "A", "d", "e", "f", "g"
        ]));
        assert_eq!(s, vec!["b", "a", "c", "A", "d", "e"]);
        assert_eq!(s.len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn test_suggestions_non_string_items_are_stringified() {
        let s = coerce_suggestions(&json!(["ok", 3, null, " x "]));
        assert_eq!(s, vec!["ok", "3", "x"]);
    }

    #[test]
    fn test_suggestions_wrong_type_is_empty() {
        assert!(coerce_suggestions(&json!(12)).is_empty());
        assert!(coerce_suggestions(&json!({"a": "b"})).is_empty());
    }

    #[test]
    fn test_flatten_skips_empty_titles_and_bodies() {
        let text = flatten_sections(&[
            json!({"title": "", "text": "Body only"}),
            json!({"title": "Awards"}),
            json!("loose string section"),
        ]);
        assert_eq!(text, "Body only\n\nAWARDS\n\nloose string section");
    }

    #[test]
    fn test_missing_text_field_yields_empty_text() {
        let out = norm(json!({"suggestions": ["a"], "confidence": 0.3}));
        assert_eq!(out.text, "");
        assert_eq!(out.suggestions, vec!["a"]);
    }
}
