//! Response parsing: raw model text → [`ContactRecord`].
//!
//! Models asked for "JSON only" still wrap it in ```` ```json ```` fences or
//! add a sentence before it often enough that the parser has to cope. The
//! parser is fail-soft: anything that does not yield a JSON object becomes an
//! all-empty record, and [`has_usable_data`] decides whether the result is
//! worth showing.

use crate::contact::{ContactRecord, FIELD_ORDER};
use serde_json::{Map, Value};
use tracing::debug;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Parse a business-card response into a record.
///
/// Never fails. Fields missing from the response (or present with a type
/// that cannot be read as text) are left at their defaults.
pub fn parse_card_response(response: &str) -> ContactRecord {
    let candidate = extract_json_block(response);

    let object = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!("Card response is JSON but not an object ({})", json_kind(&other));
            return ContactRecord::default();
        }
        Err(e) => {
            debug!("Card response is not JSON: {}", e);
            return ContactRecord::default();
        }
    };

    record_from_object(&object)
}

/// Locate the JSON payload inside a response.
///
/// Uses the first ```` ```json ```` fence if present, otherwise the first
/// bare fence, otherwise the whole trimmed text. An unterminated fence runs
/// to the end of the text.
pub fn extract_json_block(response: &str) -> &str {
    let text = response.trim();

    let open = if let Some(i) = text.find(JSON_FENCE) {
        Some(i + JSON_FENCE.len())
    } else {
        text.find(FENCE).map(|i| i + FENCE.len())
    };

    match open {
        Some(start) => {
            let rest = &text[start..];
            let end = rest.find(FENCE).unwrap_or(rest.len());
            rest[..end].trim()
        }
        None => text,
    }
}

/// `true` iff at least one field holds a non-blank value.
pub fn has_usable_data(record: &ContactRecord) -> bool {
    use crate::contact::FieldValue;

    FIELD_ORDER.iter().any(|&field| match record.get(field) {
        FieldValue::Text(v) => v.is_some_and(|s| !s.trim().is_empty()),
        FieldValue::List(items) => items.iter().any(|s| !s.trim().is_empty()),
    })
}

fn record_from_object(object: &Map<String, Value>) -> ContactRecord {
    let mut record = ContactRecord::default();
    for field in FIELD_ORDER {
        let Some(value) = object.get(field.key()) else {
            continue;
        };
        if let Some(list) = record.list_slot(field) {
            *list = list_value(value);
        } else if let Some(slot) = record.text_slot(field) {
            *slot = text_value(value);
        }
    }
    record
}

/// Read a scalar field. Arrays collapse to a ", "-joined string.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(text_value)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
    }
}

/// Read a multi-valued field. A lone string becomes a one-item list.
fn list_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text_value).collect(),
        Value::String(s) if s.is_empty() => Vec::new(),
        other => text_value(other).into_iter().collect(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_fills_defaults() {
        let r = parse_card_response(r#"{"name":"Taro Yamada","email":["a@b.com"]}"#);
        assert_eq!(r.name.as_deref(), Some("Taro Yamada"));
        assert_eq!(r.email, vec!["a@b.com"]);
        assert_eq!(
            r,
            ContactRecord {
                name: Some("Taro Yamada".into()),
                email: vec!["a@b.com".into()],
                ..Default::default()
            }
        );
    }

    #[test]
    fn json_fence_is_stripped() {
        let fenced = parse_card_response("```json\n{\"name\":\"X\"}\n```");
        let bare = parse_card_response("{\"name\":\"X\"}");
        assert_eq!(fenced, bare);
        assert_eq!(fenced.name.as_deref(), Some("X"));
    }

    #[test]
    fn generic_fence_and_surrounding_prose() {
        let text = "Here is the card:\n```\n{\"company\": \"Acme\"}\n```\nLet me know!";
        assert_eq!(parse_card_response(text).company.as_deref(), Some("Acme"));
    }

    #[test]
    fn json_fence_preferred_over_earlier_bare_fence() {
        let text = "```\nnot json\n```\n```json\n{\"title\":\"CTO\"}\n```";
        assert_eq!(parse_card_response(text).title.as_deref(), Some("CTO"));
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        assert_eq!(extract_json_block("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn prose_is_fail_soft() {
        let r = parse_card_response("I cannot read this image");
        assert_eq!(r, ContactRecord::default());
        assert!(!has_usable_data(&r));
    }

    #[test]
    fn non_object_json_is_fail_soft() {
        assert_eq!(parse_card_response("[1, 2, 3]"), ContactRecord::default());
        assert_eq!(parse_card_response("\"hello\""), ContactRecord::default());
    }

    #[test]
    fn lenient_field_types() {
        let r = parse_card_response(
            r#"{"phone":"03-1234-5678","email":null,"fax":12345,"mobile":["090-1","090-2"],"address":{"city":"x"}}"#,
        );
        assert_eq!(r.phone, vec!["03-1234-5678"]);
        assert!(r.email.is_empty());
        assert_eq!(r.fax.as_deref(), Some("12345"));
        assert_eq!(r.mobile.as_deref(), Some("090-1, 090-2"));
        assert_eq!(r.address, None);
    }

    #[test]
    fn null_list_entries_dropped() {
        let r = parse_card_response(r#"{"phone":["03-1", null, "03-2"]}"#);
        assert_eq!(r.phone, vec!["03-1", "03-2"]);
    }

    #[test]
    fn validator_rules() {
        let empty_phone = ContactRecord {
            phone: vec![],
            ..Default::default()
        };
        assert!(!has_usable_data(&empty_phone));

        let with_phone = ContactRecord {
            phone: vec!["090-0000-0000".into()],
            ..Default::default()
        };
        assert!(has_usable_data(&with_phone));

        let blank = ContactRecord {
            name: Some("   ".into()),
            email: vec![String::new()],
            ..Default::default()
        };
        assert!(!has_usable_data(&blank));
    }
}
