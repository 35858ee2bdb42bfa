//! Consent record model and wire codec.
//!
//! A [`ConsentRecord`] is the semantic, in-memory form of a visitor's
//! decision. The [`codec`] module maps it to and from the compact
//! short-key form that fits inside a size-constrained cookie header.

pub mod codec;

use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;

/// The semantic consent record.
///
/// Created empty/invalid at first page load, populated from storage when a
/// valid encoded record exists, mutated as the user toggles categories and
/// services, and re-encoded on every save.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentRecord {
    /// Accepted category identifiers, insertion order preserved.
    pub categories: Vec<String>,
    /// Accepted services per category.
    pub services: HashMap<String, Vec<String>>,
    /// Operator-defined schema marker.
    pub revision: i64,
    /// Opaque identifier assigned once per validity period.
    pub consent_id: Option<String>,
    /// Instant of first consent for the current validity period.
    pub consent_timestamp: Option<OffsetDateTime>,
    /// Instant of the most recent update.
    pub last_consent_timestamp: Option<OffsetDateTime>,
    /// Language in effect when the decision was recorded.
    pub language_code: Option<String>,
    /// Opaque payload supplied by the embedding page. Absent data is an
    /// explicit `Value::Null`, never a hole that breaks equality checks.
    pub custom_data: Value,
    /// Absolute instant after which the record is stale. Always derived,
    /// never user-set.
    pub expiration_time: Option<OffsetDateTime>,
}

impl Default for ConsentRecord {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            services: HashMap::new(),
            revision: 0,
            consent_id: None,
            consent_timestamp: None,
            last_consent_timestamp: None,
            language_code: None,
            custom_data: Value::Null,
            expiration_time: None,
        }
    }
}

impl ConsentRecord {
    /// An empty record carries no decision.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Whether this record still represents a valid decision for the
    /// given configuration revision. Stale revision and passed expiration
    /// are "no valid record", not errors.
    pub fn is_valid(&self, revision: i64, now: OffsetDateTime) -> bool {
        if self.is_empty() || self.revision != revision {
            return false;
        }
        match self.expiration_time {
            Some(expiry) => expiry > now,
            None => true,
        }
    }

    /// Truncate both consent timestamps and the expiration to whole
    /// seconds, matching what survives a round-trip through the codec.
    pub fn truncated_to_seconds(mut self) -> Self {
        self.consent_timestamp = self.consent_timestamp.map(truncate_seconds);
        self.last_consent_timestamp = self.last_consent_timestamp.map(truncate_seconds);
        self.expiration_time = self.expiration_time.map(truncate_seconds);
        self
    }
}

/// Drop sub-second precision.
pub(crate) fn truncate_seconds(instant: OffsetDateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(instant.unix_timestamp()).unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_empty_record_is_invalid() {
        let record = ConsentRecord::default();
        assert!(record.is_empty());
        assert!(!record.is_valid(0, OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_revision_mismatch_invalidates() {
        let record = ConsentRecord {
            categories: vec!["necessary".to_string()],
            revision: 1,
            ..Default::default()
        };
        let now = OffsetDateTime::now_utc();

        assert!(record.is_valid(1, now));
        assert!(!record.is_valid(2, now));
    }

    #[test]
    fn test_expired_record_is_invalid() {
        let now = OffsetDateTime::now_utc();
        let record = ConsentRecord {
            categories: vec!["necessary".to_string()],
            expiration_time: Some(now - Duration::days(1)),
            ..Default::default()
        };

        assert!(!record.is_valid(0, now));
    }

    #[test]
    fn test_truncation_drops_subsecond_precision() {
        let now = OffsetDateTime::now_utc();
        let record = ConsentRecord {
            categories: vec!["necessary".to_string()],
            consent_timestamp: Some(now),
            ..Default::default()
        };

        let truncated = record.truncated_to_seconds();
        let ts = truncated.consent_timestamp.expect("timestamp kept");
        assert_eq!(ts.nanosecond(), 0);
        assert_eq!(ts.unix_timestamp(), now.unix_timestamp());
    }
}
