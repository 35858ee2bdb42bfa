//! Save orchestration.
//!
//! [`ConsentManager`] owns the session state and drives a save through
//! its stages: diff → persist → autoclear → callbacks → detached
//! dispatch. Persisting happens-before autoclear, autoclear
//! happens-before the callbacks, and the callbacks happen-before the
//! detached dispatch is initiated; nothing on this path ever awaits the
//! network.
//!
//! # Example
//!
//! ```rust,ignore
//! use consentkit::config::{CategoryDefinition, ConsentConfig};
//! use consentkit::manager::ConsentManager;
//!
//! let config = ConsentConfig::new()
//!     .category(CategoryDefinition::new("necessary").enabled(true).read_only(true))
//!     .category(CategoryDefinition::new("analytics"));
//!
//! let mut manager = ConsentManager::builder(config).build();
//! manager.load();
//! manager.accept_category("analytics");
//! let outcome = manager.save_preferences();
//! assert!(outcome.first_consent);
//! ```

use crate::autoclear::{Autoclear, CookieEraser, CookieMatcher};
use crate::browser::{
    CookieJar, EventSink, LocalStorage, MemoryCookieJar, MemoryLocalStorage, PageContext,
    ScriptGate,
};
use crate::config::{ConsentConfig, ConsentMode};
use crate::diff;
use crate::dispatch::{
    ConsentEventKind, ConsentLogger, ConsentSnapshot, HyperTransport, LogTransport,
    CONSENT_ID_STORAGE_KEY,
};
use crate::record::{codec, ConsentRecord};
use crate::state::ConsentStore;
use crate::storage::PersistenceAdapter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// What one save call did. Handed to every callback; the embedder acts
/// on `reload_requested` (the core never reloads anything itself).
#[derive(Debug, Clone, Default)]
pub struct SaveOutcome {
    /// This save established a validity period where none existed.
    pub first_consent: bool,
    /// Category or service acceptance changed.
    pub state_changed: bool,
    pub changed_categories: Vec<String>,
    pub changed_services: HashMap<String, Vec<String>>,
    /// A freshly disabled category's autoclear descriptor demanded a
    /// page reload. Drained: subsequent saves start clean.
    pub reload_requested: bool,
}

type ConsentCallback = Box<dyn Fn(&SaveOutcome) + Send + Sync>;

/// The engine's front door: session state plus every collaborator,
/// constructed once per page session.
pub struct ConsentManager {
    config: ConsentConfig,
    page: PageContext,
    store: ConsentStore,
    jar: Arc<dyn CookieJar>,
    storage: Arc<dyn LocalStorage>,
    adapter: PersistenceAdapter,
    logger: Option<ConsentLogger>,
    script_gate: Option<Arc<dyn ScriptGate>>,
    on_first_consent: Vec<ConsentCallback>,
    on_consent: Vec<ConsentCallback>,
    on_change: Vec<ConsentCallback>,
}

/// Builder for a [`ConsentManager`].
pub struct ConsentManagerBuilder {
    config: ConsentConfig,
    page: PageContext,
    jar: Option<Arc<dyn CookieJar>>,
    storage: Option<Arc<dyn LocalStorage>>,
    transport: Option<Arc<dyn LogTransport>>,
    events: Option<Arc<dyn EventSink>>,
    script_gate: Option<Arc<dyn ScriptGate>>,
}

impl ConsentManagerBuilder {
    /// Set the page context (hostname, scheme, URL, user agent).
    pub fn page(mut self, page: PageContext) -> Self {
        self.page = page;
        self
    }

    /// Bind the live cookie jar. Defaults to an in-memory jar.
    pub fn cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Bind local device storage. Defaults to in-memory storage.
    pub fn local_storage(mut self, storage: Arc<dyn LocalStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Override the logging transport. Defaults to the hyper client.
    pub fn transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Bind the page's shared event queue.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Bind the script-tag gating collaborator.
    pub fn script_gate(mut self, gate: Arc<dyn ScriptGate>) -> Self {
        self.script_gate = Some(gate);
        self
    }

    pub fn build(self) -> ConsentManager {
        let jar = self
            .jar
            .unwrap_or_else(|| Arc::new(MemoryCookieJar::new()));
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryLocalStorage::new()));

        let adapter =
            PersistenceAdapter::for_config(&self.config, jar.clone(), storage.clone(), self.page.clone());

        // An unparseable endpoint disables logging; it never breaks the
        // page.
        let logger = self.config.logging.clone().and_then(|logging| {
            let transport = self
                .transport
                .clone()
                .unwrap_or_else(|| Arc::new(HyperTransport::new()));
            match ConsentLogger::new(
                logging,
                transport,
                jar.clone(),
                storage.clone(),
                self.events.clone(),
                self.page.clone(),
            ) {
                Ok(logger) => Some(logger),
                Err(e) => {
                    tracing::warn!("consent logging disabled: {e}");
                    None
                }
            }
        });

        let store = ConsentStore {
            language_code: self.config.language.clone(),
            ..ConsentStore::new()
        };

        ConsentManager {
            config: self.config,
            page: self.page,
            store,
            jar,
            storage,
            adapter,
            logger,
            script_gate: self.script_gate,
            on_first_consent: Vec::new(),
            on_consent: Vec::new(),
            on_change: Vec::new(),
        }
    }
}

impl ConsentManager {
    pub fn builder(config: ConsentConfig) -> ConsentManagerBuilder {
        ConsentManagerBuilder {
            config,
            page: PageContext::default(),
            jar: None,
            storage: None,
            transport: None,
            events: None,
            script_gate: None,
        }
    }

    /// Populate the store from a previously persisted record, or mark
    /// consent invalid when there is none worth keeping (missing,
    /// malformed, stale revision, or expired: all the same thing here).
    pub fn load(&mut self) {
        let record = self.adapter.load();
        let now = OffsetDateTime::now_utc();

        if record.is_valid(self.config.revision, now) {
            self.store.invalid_consent = false;
            self.store.accepted_categories =
                self.with_read_only(self.known_categories(&record.categories));
            self.store.accepted_services = record.services.clone();
            self.store.last_enabled_services = record.services.clone();
            self.store.consent_id = record.consent_id.clone();
            self.store.consent_timestamp = record.consent_timestamp;
            self.store.last_consent_timestamp = record.last_consent_timestamp;
            self.store.custom_data = record.custom_data.clone();
            if let Some(language) = &record.language_code {
                self.store.language_code = language.clone();
            }
            self.store.saved_record = record;
            tracing::debug!("valid consent record loaded");
            return;
        }

        if !record.is_empty() {
            tracing::debug!("stored consent record is stale, forcing re-consent");
        }

        self.store = ConsentStore {
            language_code: self.config.language.clone(),
            ..ConsentStore::new()
        };

        // Opt-out runs the defaults until the user says otherwise;
        // opt-in runs nothing but the read-only set.
        let preseed = match self.config.mode {
            ConsentMode::OptOut => self.config.default_enabled_categories(),
            ConsentMode::OptIn => self.config.read_only_categories(),
        };
        for name in &preseed {
            if let Some(category) = self.config.find_category(name) {
                self.store
                    .accepted_services
                    .insert(name.clone(), category.service_names());
            }
        }
        // What runs by default is the service-diff baseline until the
        // first save commits.
        self.store.last_enabled_services = self.store.accepted_services.clone();
        self.store.accepted_categories = preseed;
    }

    // --- mutators -------------------------------------------------------

    /// Accept a category. Its services follow unless a partial service
    /// selection already exists.
    pub fn accept_category(&mut self, name: &str) {
        let Some(category) = self.config.find_category(name) else {
            tracing::debug!(category = name, "ignoring unknown category");
            return;
        };

        if !self.store.accepted(name) {
            self.store.accepted_categories.push(name.to_string());
        }

        let has_selection = self
            .store
            .accepted_services
            .get(name)
            .map(|list| !list.is_empty())
            .unwrap_or(false);
        if !has_selection {
            self.store
                .accepted_services
                .insert(name.to_string(), category.service_names());
        }
    }

    /// Reject a category and its services. Read-only categories cannot
    /// be rejected.
    pub fn reject_category(&mut self, name: &str) {
        if self
            .config
            .find_category(name)
            .map(|c| c.read_only)
            .unwrap_or(false)
        {
            tracing::debug!(category = name, "read-only category cannot be rejected");
            return;
        }

        self.store.accepted_categories.retain(|c| c != name);
        self.store.accepted_services.remove(name);
    }

    /// Replace the accepted set wholesale. Unknown names are dropped and
    /// read-only categories forced back in.
    pub fn set_accepted_categories<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        self.store.accepted_categories = Vec::new();
        self.store
            .accepted_services
            .retain(|category, _| requested.iter().any(|name| name == category));

        for name in self.with_read_only(self.known_categories(&requested)) {
            self.accept_category(&name);
        }
    }

    /// Accept every configured category.
    pub fn accept_all(&mut self) {
        self.set_accepted_categories(self.config.category_names());
    }

    /// Accept only the read-only set.
    pub fn accept_necessary_only(&mut self) {
        self.set_accepted_categories(self.config.read_only_categories());
    }

    /// Select specific services within a category. A non-empty selection
    /// pulls the category into the accepted set.
    pub fn set_accepted_services<I, S>(&mut self, category: &str, services: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.config.find_category(category).is_none() {
            tracing::debug!(category, "ignoring services for unknown category");
            return;
        }

        let selected: Vec<String> = services
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| self.config.find_service(category, s).is_some())
            .collect();

        let non_empty = !selected.is_empty();
        self.store
            .accepted_services
            .insert(category.to_string(), selected);

        if non_empty && !self.store.accepted(category) {
            self.store.accepted_categories.push(category.to_string());
        }
    }

    /// Attach an opaque embedder payload, persisted verbatim. A valid
    /// decision is re-persisted in place with its remaining lifetime.
    pub fn set_custom_data(&mut self, data: Value) {
        self.store.custom_data = data;

        if !self.store.invalid_consent {
            let mut record = self.record_from_store();
            self.adapter.write(&mut record, true);
            self.store.saved_record = record;
        }
    }

    /// Switch the recorded language. A valid decision is re-persisted
    /// with its *remaining* lifetime so the validity clock keeps running.
    pub fn set_language(&mut self, code: &str) {
        if self.store.language_code == code {
            return;
        }
        self.store.language_code = code.to_string();

        if !self.store.invalid_consent {
            let mut record = self.record_from_store();
            self.adapter.write(&mut record, true);
            self.store.saved_record = record;
        }
    }

    // --- queries --------------------------------------------------------

    pub fn accepted_categories(&self) -> &[String] {
        &self.store.accepted_categories
    }

    pub fn accepted_category(&self, name: &str) -> bool {
        self.store.accepted(name)
    }

    pub fn accepted_service(&self, category: &str, service: &str) -> bool {
        self.store.service_accepted(category, service)
    }

    /// False until a valid record is loaded or the first save commits.
    pub fn valid_consent(&self) -> bool {
        !self.store.invalid_consent
    }

    pub fn consent_id(&self) -> Option<&str> {
        self.store.consent_id.as_deref()
    }

    pub fn store(&self) -> &ConsentStore {
        &self.store
    }

    /// Long-form JSON view of the last persisted record.
    pub fn exported_record(&self) -> Value {
        codec::expanded_value(&self.store.saved_record)
    }

    // --- callbacks ------------------------------------------------------

    pub fn on_first_consent(&mut self, callback: impl Fn(&SaveOutcome) + Send + Sync + 'static) {
        self.on_first_consent.push(Box::new(callback));
    }

    pub fn on_consent(&mut self, callback: impl Fn(&SaveOutcome) + Send + Sync + 'static) {
        self.on_consent.push(Box::new(callback));
    }

    pub fn on_change(&mut self, callback: impl Fn(&SaveOutcome) + Send + Sync + 'static) {
        self.on_change.push(Box::new(callback));
    }

    // --- save path ------------------------------------------------------

    /// Commit the current decision.
    ///
    /// Diffs against the appropriate baseline, persists the re-encoded
    /// record, purges cookies of anything that turned off, notifies the
    /// script gate and callbacks, then initiates the detached dispatch.
    /// Never blocks on the network; never panics on the page's behalf.
    pub fn save_preferences(&mut self) -> SaveOutcome {
        let now = OffsetDateTime::now_utc();

        let diff = diff::compute(&self.store, &self.config);
        self.store.last_changed_categories = diff.changed_categories.clone();
        self.store.last_changed_services = diff.changed_services.clone();
        let state_changed = diff.state_changed();

        // Set exactly once per validity period.
        if self.store.consent_timestamp.is_none() {
            self.store.consent_timestamp = Some(now);
        }
        self.resolve_consent_id();

        let mut first_consent = false;

        if self.store.invalid_consent || state_changed {
            if self.store.invalid_consent {
                self.store.invalid_consent = false;
                first_consent = true;
            }

            self.store.last_consent_timestamp = Some(match self.store.last_consent_timestamp {
                None => self.store.consent_timestamp.unwrap_or(now),
                Some(_) => now,
            });

            let mut record = self.record_from_store();
            self.adapter.write(&mut record, false);
            self.store.saved_record = record;
            self.store.last_enabled_services = self.store.accepted_services.clone();

            if self.config.auto_clear_cookies {
                let domain = self.effective_domain();
                Autoclear::new(&self.config, self.jar.as_ref(), &domain)
                    .run(&mut self.store, first_consent);
            }

            if let Some(gate) = &self.script_gate {
                gate.apply(
                    &self.store.accepted_categories,
                    &self.store.accepted_services,
                );
            }
        }

        let outcome = SaveOutcome {
            first_consent,
            state_changed,
            changed_categories: self.store.last_changed_categories.clone(),
            changed_services: self.store.last_changed_services.clone(),
            reload_requested: std::mem::take(&mut self.store.reload_page),
        };

        let snapshot = self.snapshot();

        if first_consent {
            for callback in &self.on_first_consent {
                callback(&outcome);
            }
            for callback in &self.on_consent {
                callback(&outcome);
            }
            if let Some(logger) = &self.logger {
                logger.log_event(ConsentEventKind::FirstConsent, snapshot.clone());
            }
        }

        // An opt-in first consent is only ever a first consent, even
        // when its diff is non-empty.
        let suppress_update = first_consent && self.config.mode == ConsentMode::OptIn;
        if state_changed && !suppress_update {
            for callback in &self.on_change {
                callback(&outcome);
            }
            if let Some(logger) = &self.logger {
                logger.log_event(ConsentEventKind::ConsentUpdate, snapshot);
            }
        }

        outcome
    }

    /// Manually erase cookies matching the given matchers, outside any
    /// save flow.
    pub fn erase_cookies(&self, matchers: &[CookieMatcher]) {
        let live = self.jar.cookie_names();
        let domain = self.effective_domain();
        let eraser = CookieEraser::new(self.jar.as_ref(), &domain, &self.config.cookie.path);

        for matcher in matchers {
            let found = matcher.find_matches(&live);
            eraser.erase(&found, matcher.path.as_deref(), matcher.domain.as_deref());
        }
    }

    // --- internals ------------------------------------------------------

    /// Assign the record's consent id for this validity period. A stale
    /// or missing record gets a fresh id; the device-stable copy in local
    /// storage (which the dispatcher prefers) is created once and never
    /// rotated.
    fn resolve_consent_id(&mut self) {
        if self.store.consent_id.is_some() {
            return;
        }

        let id = Uuid::new_v4().to_string();
        if self.storage.get_item(CONSENT_ID_STORAGE_KEY).is_none() {
            self.storage.set_item(CONSENT_ID_STORAGE_KEY, &id);
        }
        self.store.consent_id = Some(id);
    }

    fn record_from_store(&self) -> ConsentRecord {
        ConsentRecord {
            categories: self.store.accepted_categories.clone(),
            services: self.store.accepted_services.clone(),
            revision: self.config.revision,
            consent_id: self.store.consent_id.clone(),
            consent_timestamp: self.store.consent_timestamp,
            last_consent_timestamp: self.store.last_consent_timestamp,
            language_code: Some(self.store.language_code.clone()),
            custom_data: self.store.custom_data.clone(),
            // Carried so a remaining-lifetime write can see the old clock.
            expiration_time: self.store.saved_record.expiration_time,
        }
    }

    fn snapshot(&self) -> ConsentSnapshot {
        ConsentSnapshot {
            consent_id: self.store.consent_id.clone(),
            accept_type: self.store.accept_type(&self.config).as_str().to_string(),
            accepted: self.store.accepted_categories.clone(),
            rejected: self.store.rejected_categories(&self.config),
        }
    }

    /// Drop identifiers the configuration no longer knows.
    fn known_categories(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter(|name| self.config.find_category(name).is_some())
            .cloned()
            .collect()
    }

    /// Read-only categories are always present.
    fn with_read_only(&self, mut names: Vec<String>) -> Vec<String> {
        for read_only in self.config.read_only_categories() {
            if !names.contains(&read_only) {
                names.push(read_only);
            }
        }
        names
    }

    fn effective_domain(&self) -> String {
        if self.config.cookie.domain.is_empty() {
            self.page.hostname.clone()
        } else {
            self.config.cookie.domain.clone()
        }
    }
}
