use consentkit::browser::{
    LocalStorage, MemoryCookieJar, MemoryLocalStorage, PageContext, ScriptGate,
};
use consentkit::config::{
    CategoryDefinition, ConsentConfig, ConsentMode, LoggingConfig, ServiceDefinition,
};
use consentkit::dispatch::LogTransport;
use consentkit::base::ConsentError;
use consentkit::manager::ConsentManager;
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl LogTransport for ChannelTransport {
    fn post_json(
        &self,
        _endpoint: Url,
        body: String,
        _prefer_minimal: bool,
    ) -> BoxFuture<'static, Result<u16, ConsentError>> {
        let _ = self.tx.send(body);
        Box::pin(async { Ok(204) })
    }
}

#[derive(Default)]
struct RecordingGate {
    applied: Mutex<Vec<Vec<String>>>,
}

impl ScriptGate for RecordingGate {
    fn apply(&self, accepted_categories: &[String], _services: &HashMap<String, Vec<String>>) {
        self.applied
            .lock()
            .unwrap()
            .push(accepted_categories.to_vec());
    }
}

fn site_config(revision: i64) -> ConsentConfig {
    let mut config = ConsentConfig::new()
        .revision(revision)
        .category(CategoryDefinition::new("necessary").enabled(true).read_only(true))
        .category(
            CategoryDefinition::new("analytics")
                .service(ServiceDefinition::new("ga4"))
                .service(ServiceDefinition::new("matomo")),
        )
        .category(CategoryDefinition::new("marketing"));
    config.cookie.domain = "www.example.com".to_string();
    config
}

fn session(
    config: ConsentConfig,
    jar: Arc<MemoryCookieJar>,
    storage: Arc<MemoryLocalStorage>,
) -> ConsentManager {
    let mut manager = ConsentManager::builder(config)
        .page(PageContext::new("www.example.com"))
        .cookie_jar(jar)
        .local_storage(storage)
        .build();
    manager.load();
    manager
}

#[test]
fn test_decision_survives_across_sessions() {
    let jar = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());

    // First visit: custom selection.
    let mut first = session(site_config(1), jar.clone(), storage.clone());
    assert!(!first.valid_consent());
    first.accept_category("analytics");
    first.set_custom_data(json!({"ab_test": "b"}));
    let outcome = first.save_preferences();
    assert!(outcome.first_consent);
    let consent_id = first.consent_id().map(str::to_string).expect("assigned");

    // Next visit: the decision is already there.
    let second = session(site_config(1), jar.clone(), storage.clone());
    assert!(second.valid_consent());
    assert_eq!(second.accepted_categories(), ["necessary", "analytics"]);
    assert!(second.accepted_service("analytics", "ga4"));
    assert_eq!(second.consent_id(), Some(consent_id.as_str()));
    assert_eq!(second.store().custom_data, json!({"ab_test": "b"}));
}

#[test]
fn test_update_visit_diffs_against_stored_record() {
    let jar = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());

    let mut first = session(site_config(1), jar.clone(), storage.clone());
    first.set_accepted_categories(["necessary", "analytics"]);
    first.save_preferences();

    let mut second = session(site_config(1), jar.clone(), storage.clone());
    second.set_accepted_categories(["necessary", "marketing"]);
    let outcome = second.save_preferences();

    assert!(!outcome.first_consent);
    assert!(outcome.state_changed);
    assert_eq!(
        outcome.changed_categories,
        vec!["marketing".to_string(), "analytics".to_string()]
    );
}

#[test]
fn test_revision_bump_forces_reconsent() {
    let jar = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());

    let mut first = session(site_config(1), jar.clone(), storage.clone());
    first.accept_category("analytics");
    first.save_preferences();

    // The operator bumped the schema revision: the stored record no
    // longer counts.
    let mut second = session(site_config(2), jar.clone(), storage.clone());
    assert!(!second.valid_consent());
    assert_eq!(second.accepted_categories(), ["necessary"]);

    // Saving again is a fresh first consent under a superseding id.
    let outcome = second.save_preferences();
    assert!(outcome.first_consent);
    assert_ne!(second.consent_id(), first.consent_id());

    // The device-stable dispatch id was created once and never rotated.
    assert!(storage.get_item("cc_consent_id").is_some());
}

#[test]
fn test_expired_record_forces_reconsent() {
    let jar = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());

    let mut config = site_config(1);
    config.cookie.use_local_storage = true;

    // A record that expired yesterday, straight into local storage.
    let expired = time::OffsetDateTime::now_utc().unix_timestamp() - 86_400;
    storage.set_item(
        "cc_cookie",
        &format!(r#"{{"c":["n","a"],"r":1,"exp":{expired}}}"#),
    );

    let manager = session(config, jar, storage);
    assert!(!manager.valid_consent());
}

#[test]
fn test_language_switch_keeps_validity_clock_running() {
    let jar = Arc::new(MemoryCookieJar::new());
    let storage = Arc::new(MemoryLocalStorage::new());

    let mut manager = session(site_config(1), jar, storage);
    manager.accept_category("analytics");
    manager.save_preferences();

    let original_expiry = manager
        .store()
        .saved_record
        .expiration_time
        .expect("stamped");

    manager.set_language("de");

    let record = &manager.store().saved_record;
    assert_eq!(record.language_code.as_deref(), Some("de"));

    // Re-persisted with the remaining lifetime, not a fresh full one.
    let new_expiry = record.expiration_time.expect("stamped");
    let drift = (new_expiry - original_expiry).whole_seconds().abs();
    assert!(drift <= 1, "expiry drifted by {drift}s");
}

#[test]
fn test_script_gate_sees_every_committed_save() {
    let gate = Arc::new(RecordingGate::default());
    let mut manager = ConsentManager::builder(site_config(1))
        .page(PageContext::new("www.example.com"))
        .script_gate(gate.clone())
        .build();
    manager.load();

    manager.accept_category("analytics");
    manager.save_preferences();

    manager.reject_category("analytics");
    manager.save_preferences();

    // A no-op save commits nothing and does not reach the gate.
    manager.save_preferences();

    let applied = gate.applied.lock().unwrap();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0], vec!["necessary".to_string(), "analytics".to_string()]);
    assert_eq!(applied[1], vec!["necessary".to_string()]);
}

#[test]
fn test_callbacks_fire_in_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut manager = ConsentManager::builder(site_config(1))
        .page(PageContext::new("www.example.com"))
        .build();
    manager.load();

    {
        let calls = calls.clone();
        manager.on_first_consent(move |_| calls.lock().unwrap().push("first"));
    }
    {
        let calls = calls.clone();
        manager.on_consent(move |_| calls.lock().unwrap().push("consent"));
    }
    {
        let calls = calls.clone();
        manager.on_change(move |outcome| {
            assert!(outcome.state_changed);
            calls.lock().unwrap().push("change");
        });
    }

    manager.accept_category("analytics");
    manager.save_preferences();

    // Opt-in first consent: no change leg.
    assert_eq!(*calls.lock().unwrap(), vec!["first", "consent"]);

    manager.reject_category("analytics");
    manager.save_preferences();
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["first", "consent", "change"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_opt_in_first_consent_suppresses_update_event() {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut config = site_config(1);
    config = config.logging(LoggingConfig::new("http://logs.example.com/ccdata").wait_for_ga4(false));

    let mut manager = ConsentManager::builder(config)
        .page(PageContext::new("www.example.com"))
        .transport(Arc::new(ChannelTransport { tx }))
        .build();
    manager.load();

    manager.accept_all();
    let outcome = manager.save_preferences();

    // Non-empty diff, but opt-in first consent is only a first consent.
    assert!(outcome.first_consent);
    assert!(outcome.state_changed);

    let body = rx.recv().await.expect("first_consent sent");
    let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payload["event"], "first_consent");
    assert_eq!(payload["accept_type"], "all");

    assert!(
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .is_err(),
        "consent_update must be suppressed"
    );
}
