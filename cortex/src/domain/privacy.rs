// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Privacy guards for everything that reaches the vector store.
//!
//! Health statements are scrubbed of phone numbers, Aadhaar-like ids and
//! e-mail addresses before they are embedded or stored, and payloads are
//! re-checked on the write path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[6-9]\d{9}\b").expect("valid phone regex"));
static NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}\s?\d{4}\s?\d{4}\b").expect("valid id regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

/// Replace PII in free text with redaction markers.
pub fn sanitize_text(text: &str) -> String {
    let text = PHONE.replace_all(text, "[PHONE_REDACTED]");
    let text = NATIONAL_ID.replace_all(&text, "[ID_REDACTED]");
    let text = EMAIL.replace_all(&text, "[EMAIL_REDACTED]");
    text.trim().to_string()
}

pub fn text_contains_pii(text: &str) -> bool {
    PHONE.is_match(text) || NATIONAL_ID.is_match(text) || EMAIL.is_match(text)
}

/// System-generated identifiers; a UUID tail can look like a 12-digit id.
const GENERATED_KEYS: &[&str] = &["id", "user_id"];

/// True when any free-form string value of the payload still carries PII.
pub fn payload_contains_pii(payload: &Map<String, Value>) -> bool {
    payload
        .iter()
        .filter(|(key, _)| !GENERATED_KEYS.contains(&key.as_str()))
        .any(|(_, value)| match value {
            Value::String(s) => text_contains_pii(s),
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_redacts_all_kinds() {
        let text = "call me on 9876543210, aadhaar 1234 5678 9012, mail asha@example.org";
        let clean = sanitize_text(text);

        assert!(clean.contains("[PHONE_REDACTED]"));
        assert!(clean.contains("[ID_REDACTED]"));
        assert!(clean.contains("[EMAIL_REDACTED]"));
        assert!(!text_contains_pii(&clean));
    }

    #[test]
    fn test_sanitize_keeps_clinical_numbers() {
        let text = "bp 140/90 and fever of 102 for 3 days";
        assert_eq!(sanitize_text(text), text);
    }

    #[test]
    fn test_payload_check() {
        let mut payload = Map::new();
        payload.insert("text".to_string(), json!("swelling in feet"));
        payload.insert("risk_score".to_string(), json!(0.6));
        payload.insert("id".to_string(), json!("9b2f0c1e-7a4d-4e1b-8c3f-123456789012"));
        assert!(!payload_contains_pii(&payload));

        payload.insert("note".to_string(), json!("reach me at 9123456789"));
        assert!(payload_contains_pii(&payload));
    }
}
