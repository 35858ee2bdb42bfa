//! In-memory session state.
//!
//! The single source of truth during a page session: the current decision,
//! the last persisted projection of it, and the change sets the diff
//! engine computed on the most recent save. Constructed once per session
//! and threaded by reference through the diff, autoclear, and dispatch
//! stages, never ambient and never global.

use crate::config::ConsentConfig;
use crate::record::ConsentRecord;
use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;

/// How the visitor's decision relates to the configured catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptType {
    /// Every configured category accepted.
    All,
    /// Exactly the read-only set accepted.
    Necessary,
    /// Anything else.
    Custom,
}

impl AcceptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptType::All => "all",
            AcceptType::Necessary => "necessary",
            AcceptType::Custom => "custom",
        }
    }
}

/// Mutable consent state for one page session.
#[derive(Debug, Clone)]
pub struct ConsentStore {
    /// Categories currently accepted, insertion order preserved.
    pub accepted_categories: Vec<String>,
    /// Services currently accepted, per category.
    pub accepted_services: HashMap<String, Vec<String>>,
    /// The record as last persisted; the update-diff baseline.
    pub saved_record: ConsentRecord,
    /// Services enabled at the last persist; the service-diff baseline.
    pub last_enabled_services: HashMap<String, Vec<String>>,
    /// Category change set from the most recent save.
    pub last_changed_categories: Vec<String>,
    /// Service change sets from the most recent save.
    pub last_changed_services: HashMap<String, Vec<String>>,
    pub consent_id: Option<String>,
    pub consent_timestamp: Option<OffsetDateTime>,
    pub last_consent_timestamp: Option<OffsetDateTime>,
    /// True until a valid record is loaded or the first save commits.
    pub invalid_consent: bool,
    /// Set by autoclear when a disabled category demands a page reload;
    /// drained at the end of the save that set it.
    pub reload_page: bool,
    /// Opaque embedder payload, persisted verbatim.
    pub custom_data: Value,
    pub language_code: String,
}

impl Default for ConsentStore {
    fn default() -> Self {
        Self {
            accepted_categories: Vec::new(),
            accepted_services: HashMap::new(),
            saved_record: ConsentRecord::default(),
            last_enabled_services: HashMap::new(),
            last_changed_categories: Vec::new(),
            last_changed_services: HashMap::new(),
            consent_id: None,
            consent_timestamp: None,
            last_consent_timestamp: None,
            invalid_consent: true,
            reload_page: false,
            custom_data: Value::Null,
            language_code: "en".to_string(),
        }
    }
}

impl ConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self, category: &str) -> bool {
        self.accepted_categories.iter().any(|c| c == category)
    }

    pub fn service_accepted(&self, category: &str, service: &str) -> bool {
        self.accepted_services
            .get(category)
            .map(|list| list.iter().any(|s| s == service))
            .unwrap_or(false)
    }

    /// Configured categories not currently accepted, in display order.
    pub fn rejected_categories(&self, config: &ConsentConfig) -> Vec<String> {
        config
            .category_names()
            .into_iter()
            .filter(|name| !self.accepted(name))
            .collect()
    }

    /// Classify the current decision against the catalogue.
    pub fn accept_type(&self, config: &ConsentConfig) -> AcceptType {
        let all = config.category_names();
        if all.iter().all(|name| self.accepted(name)) {
            return AcceptType::All;
        }

        let read_only = config.read_only_categories();
        let only_read_only = self.accepted_categories.len() == read_only.len()
            && read_only.iter().all(|name| self.accepted(name));
        if only_read_only {
            return AcceptType::Necessary;
        }

        AcceptType::Custom
    }
}
