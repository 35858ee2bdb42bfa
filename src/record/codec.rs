//! Compact wire codec for the consent record.
//!
//! The stored form renames every field to a short key and every known
//! category to a one-letter code so the record fits comfortably inside a
//! cookie header. The field table is fixed and must not be renumbered
//! without a revision bump:
//!
//! | long | short | | long | short |
//! |------|-------|-|------|-------|
//! | categories | `c` | | services | `s` |
//! | revision | `r` | | languageCode | `l` |
//! | data | `d` | | lastConsentTimestamp | `lct` |
//! | consentTimestamp | `ct` | | expirationTime | `exp` |
//! | consentId | `id` | | | |
//!
//! Decoding is best-effort and never fails: unparseable input yields an
//! empty record, unknown short keys are ignored, and a long-form input
//! (detected by the presence of the `categories` key) is returned as-is.

use crate::record::{truncate_seconds, ConsentRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Map a category identifier to its short code. Identifiers outside the
/// fixed alphabet pass through unchanged.
pub fn short_category(name: &str) -> &str {
    match name {
        "necessary" => "n",
        "functionality" => "f",
        "analytics" => "a",
        "personalization" => "p",
        "marketing" => "m",
        other => other,
    }
}

/// Reverse of [`short_category`]. Unknown codes pass through unchanged.
pub fn long_category(code: &str) -> &str {
    match code {
        "n" => "necessary",
        "f" => "functionality",
        "a" => "analytics",
        "p" => "personalization",
        "m" => "marketing",
        other => other,
    }
}

/// The compact on-the-wire form. Timestamps are whole unix seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EncodedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lct: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Encode a record into its compact form.
///
/// Lossless except for sub-second timestamp precision. Empty service
/// lists and absent optional fields are omitted from the output.
pub fn encode(record: &ConsentRecord) -> EncodedRecord {
    let services: HashMap<String, Vec<String>> = record
        .services
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .map(|(cat, list)| (short_category(cat).to_string(), list.clone()))
        .collect();

    EncodedRecord {
        c: Some(
            record
                .categories
                .iter()
                .map(|cat| short_category(cat).to_string())
                .collect(),
        ),
        r: Some(record.revision),
        d: match &record.custom_data {
            Value::Null => None,
            data => Some(data.clone()),
        },
        ct: record.consent_timestamp.map(|t| t.unix_timestamp()),
        id: record.consent_id.clone(),
        s: (!services.is_empty()).then_some(services),
        l: record.language_code.clone(),
        lct: record.last_consent_timestamp.map(|t| t.unix_timestamp()),
        exp: record.expiration_time.map(|t| t.unix_timestamp()),
    }
}

/// Encode straight to the JSON string that goes into storage.
pub fn encode_to_string(record: &ConsentRecord) -> String {
    match serde_json::to_string(&encode(record)) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("consent record serialization failed: {e}");
            "{}".to_string()
        }
    }
}

/// Decode a raw stored value into a semantic record.
///
/// Never fails: malformed input yields an empty record, a bad field is
/// skipped while the rest survives, and an already-expanded input
/// (long-form `categories` key present) decodes idempotently.
pub fn decode(raw: &str) -> ConsentRecord {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("unparseable consent record, starting fresh: {e}");
            return ConsentRecord::default();
        }
    };

    let Some(obj) = value.as_object() else {
        return ConsentRecord::default();
    };

    if obj.contains_key("categories") {
        from_expanded(obj)
    } else {
        from_compact(obj)
    }
}

/// Long-form JSON projection of a record, for embedders that want the
/// readable shape back. Timestamps render as RFC 3339, the expiration as
/// unix milliseconds.
pub fn expanded_value(record: &ConsentRecord) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "categories".to_string(),
        json!(record.categories),
    );
    obj.insert("revision".to_string(), json!(record.revision));
    obj.insert("data".to_string(), record.custom_data.clone());
    if let Some(ts) = record.consent_timestamp.and_then(format_rfc3339) {
        obj.insert("consentTimestamp".to_string(), Value::String(ts));
    }
    if let Some(id) = &record.consent_id {
        obj.insert("consentId".to_string(), Value::String(id.clone()));
    }
    obj.insert("services".to_string(), json!(record.services));
    if let Some(lang) = &record.language_code {
        obj.insert("languageCode".to_string(), Value::String(lang.clone()));
    }
    if let Some(ts) = record.last_consent_timestamp.and_then(format_rfc3339) {
        obj.insert("lastConsentTimestamp".to_string(), Value::String(ts));
    }
    if let Some(expiry) = record.expiration_time {
        obj.insert(
            "expirationTime".to_string(),
            json!(expiry.unix_timestamp() * 1000),
        );
    }
    Value::Object(obj)
}

fn from_compact(obj: &Map<String, Value>) -> ConsentRecord {
    let mut record = ConsentRecord::default();

    if let Some(categories) = string_array(obj.get("c")) {
        record.categories = categories
            .into_iter()
            .map(|code| long_category(&code).to_string())
            .collect();
    }
    if let Some(revision) = obj.get("r").and_then(Value::as_i64) {
        record.revision = revision;
    }
    if let Some(data) = obj.get("d") {
        record.custom_data = data.clone();
    }
    record.consent_timestamp = unix_seconds(obj.get("ct"));
    record.consent_id = obj.get("id").and_then(Value::as_str).map(str::to_string);
    if let Some(services) = obj.get("s").and_then(Value::as_object) {
        for (code, list) in services {
            if let Some(list) = string_array(Some(list)) {
                record
                    .services
                    .insert(long_category(code).to_string(), list);
            }
        }
    }
    record.language_code = obj.get("l").and_then(Value::as_str).map(str::to_string);
    record.last_consent_timestamp = unix_seconds(obj.get("lct"));
    record.expiration_time = unix_seconds(obj.get("exp"));

    record
}

fn from_expanded(obj: &Map<String, Value>) -> ConsentRecord {
    let mut record = ConsentRecord::default();

    if let Some(categories) = string_array(obj.get("categories")) {
        record.categories = categories;
    }
    if let Some(revision) = obj.get("revision").and_then(Value::as_i64) {
        record.revision = revision;
    }
    if let Some(data) = obj.get("data") {
        record.custom_data = data.clone();
    }
    record.consent_timestamp = instant(obj.get("consentTimestamp"));
    record.consent_id = obj
        .get("consentId")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(services) = obj.get("services").and_then(Value::as_object) {
        for (cat, list) in services {
            if let Some(list) = string_array(Some(list)) {
                record.services.insert(cat.clone(), list);
            }
        }
    }
    record.language_code = obj
        .get("languageCode")
        .and_then(Value::as_str)
        .map(str::to_string);
    record.last_consent_timestamp = instant(obj.get("lastConsentTimestamp"));
    // Long-form expiration is unix milliseconds.
    record.expiration_time = obj
        .get("expirationTime")
        .and_then(Value::as_i64)
        .and_then(|ms| OffsetDateTime::from_unix_timestamp(ms / 1000).ok());

    record
}

/// Extract a string array, skipping non-string entries.
fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|array| {
        array
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Whole-second unix timestamp field.
fn unix_seconds(value: Option<&Value>) -> Option<OffsetDateTime> {
    value
        .and_then(Value::as_i64)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
}

/// Long-form instant: RFC 3339 string, or unix seconds as a fallback.
fn instant(value: Option<&Value>) -> Option<OffsetDateTime> {
    match value {
        Some(Value::String(raw)) => OffsetDateTime::parse(raw, &Rfc3339)
            .ok()
            .map(truncate_seconds),
        Some(Value::Number(_)) => unix_seconds(value),
        _ => None,
    }
}

fn format_rfc3339(instant: OffsetDateTime) -> Option<String> {
    instant.format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn sample_record() -> ConsentRecord {
        let now = truncate_seconds(OffsetDateTime::now_utc());
        let mut services = HashMap::new();
        services.insert("analytics".to_string(), vec!["ga4".to_string()]);

        ConsentRecord {
            categories: vec!["necessary".to_string(), "analytics".to_string()],
            services,
            revision: 2,
            consent_id: Some("abc-123".to_string()),
            consent_timestamp: Some(now),
            last_consent_timestamp: Some(now),
            language_code: Some("en".to_string()),
            custom_data: json!({"plan": "pro"}),
            expiration_time: Some(now + Duration::days(182)),
        }
    }

    #[test]
    fn test_short_keys_on_the_wire() {
        let raw = encode_to_string(&sample_record());
        let value: Value = serde_json::from_str(&raw).unwrap();
        let obj = value.as_object().unwrap();

        for key in ["c", "r", "d", "ct", "id", "s", "l", "lct", "exp"] {
            assert!(obj.contains_key(key), "missing short key {key}");
        }
        assert!(!obj.contains_key("categories"));
        assert_eq!(obj["c"], json!(["n", "a"]));
        assert_eq!(obj["s"], json!({"a": ["ga4"]}));
    }

    #[test]
    fn test_roundtrip() {
        let record = sample_record();
        let decoded = decode(&encode_to_string(&record));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_roundtrip_truncates_subseconds() {
        let mut record = sample_record();
        record.consent_timestamp = record
            .consent_timestamp
            .map(|t| t + Duration::milliseconds(750));

        let decoded = decode(&encode_to_string(&record));
        assert_eq!(decoded, record.truncated_to_seconds());
    }

    #[test]
    fn test_decode_of_expanded_input_is_idempotent() {
        let record = sample_record();
        let expanded = expanded_value(&record);
        let decoded = decode(&expanded.to_string());
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_malformed_input_yields_empty_record() {
        assert_eq!(decode("not json at all"), ConsentRecord::default());
        assert_eq!(decode("[1,2,3]"), ConsentRecord::default());
        assert_eq!(decode(""), ConsentRecord::default());
    }

    #[test]
    fn test_partially_malformed_fields_are_skipped() {
        let decoded = decode(r#"{"c":["n","a"],"ct":"not-a-number","r":1}"#);
        assert_eq!(
            decoded.categories,
            vec!["necessary".to_string(), "analytics".to_string()]
        );
        assert_eq!(decoded.revision, 1);
        assert!(decoded.consent_timestamp.is_none());
    }

    #[test]
    fn test_unknown_short_keys_are_ignored() {
        let decoded = decode(r#"{"c":["n"],"zz":true,"r":0}"#);
        assert_eq!(decoded.categories, vec!["necessary".to_string()]);
    }

    #[test]
    fn test_unknown_categories_pass_through() {
        let mut record = sample_record();
        record.categories.push("operator_custom".to_string());

        let raw = encode_to_string(&record);
        assert!(raw.contains("operator_custom"));

        let decoded = decode(&raw);
        assert!(decoded
            .categories
            .contains(&"operator_custom".to_string()));
    }

    #[test]
    fn test_absent_optionals_normalize_to_explicit_empties() {
        let decoded = decode(r#"{"c":["n"],"r":0}"#);
        assert_eq!(decoded.custom_data, Value::Null);
        assert!(decoded.services.is_empty());
    }

    #[test]
    fn test_empty_service_lists_are_omitted() {
        let mut record = sample_record();
        record
            .services
            .insert("marketing".to_string(), Vec::new());

        let raw = encode_to_string(&record);
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["s"], json!({"a": ["ga4"]}));
    }
}
