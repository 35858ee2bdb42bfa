//! Persistence adapter: the encoded record's way in and out of the page.
//!
//! Two backing stores, selected by configuration, never both: the cookie
//! jar (expiration lives in the cookie's `expires` attribute and,
//! redundantly, in the payload) or local device storage (expiration is
//! tracked only inside the payload). Writes are fire-and-forget.

use crate::browser::{CookieJar, LocalStorage, PageContext};
use crate::config::{ConsentConfig, CookieOptions};
use crate::record::{codec, truncate_seconds, ConsentRecord};
use cookie::Cookie;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Which store holds the encoded record.
pub enum StorageBackend {
    Cookie(Arc<dyn CookieJar>),
    Local(Arc<dyn LocalStorage>),
}

/// Reads and writes the encoded consent record; owns expiration
/// computation.
pub struct PersistenceAdapter {
    backend: StorageBackend,
    options: CookieOptions,
    page: PageContext,
}

impl PersistenceAdapter {
    pub fn new(backend: StorageBackend, options: CookieOptions, page: PageContext) -> Self {
        Self {
            backend,
            options,
            page,
        }
    }

    /// Pick the backend the configuration asks for.
    pub fn for_config(
        config: &ConsentConfig,
        jar: Arc<dyn CookieJar>,
        storage: Arc<dyn LocalStorage>,
        page: PageContext,
    ) -> Self {
        let backend = if config.cookie.use_local_storage {
            StorageBackend::Local(storage)
        } else {
            StorageBackend::Cookie(jar)
        };
        Self::new(backend, config.cookie.clone(), page)
    }

    /// Persist the record, stamping its expiration first.
    ///
    /// `use_remaining_lifetime` recomputes the expiration as "time left
    /// until the previously stored expiration" instead of the full
    /// configured duration, so re-persisting after a change does not reset
    /// the decision's validity clock.
    pub fn write(&self, record: &mut ConsentRecord, use_remaining_lifetime: bool) {
        let now = OffsetDateTime::now_utc();
        let expiry = truncate_seconds(now + self.lifetime(record, use_remaining_lifetime, now));
        record.expiration_time = Some(expiry);

        let raw = codec::encode_to_string(record);

        match &self.backend {
            StorageBackend::Local(storage) => {
                storage.set_item(&self.options.name, &raw);
            }
            StorageBackend::Cookie(jar) => {
                jar.set(self.build_cookie(raw, expiry));
            }
        }

        tracing::debug!(name = %self.options.name, "consent record persisted");
    }

    /// Raw stored value, if any. Cookie-backed values are percent-decoded.
    pub fn read(&self) -> Option<String> {
        match &self.backend {
            StorageBackend::Local(storage) => storage.get_item(&self.options.name),
            StorageBackend::Cookie(jar) => jar.get(&self.options.name).map(|value| {
                Cookie::parse_encoded(format!("{}={}", self.options.name, value))
                    .map(|cookie| cookie.value().to_string())
                    .unwrap_or(value)
            }),
        }
    }

    /// Read and decode. Missing or malformed storage yields an empty
    /// record, never an error.
    pub fn load(&self) -> ConsentRecord {
        match self.read() {
            Some(raw) => codec::decode(&raw),
            None => ConsentRecord::default(),
        }
    }

    fn lifetime(
        &self,
        record: &ConsentRecord,
        use_remaining_lifetime: bool,
        now: OffsetDateTime,
    ) -> Duration {
        let full = Duration::days(self.options.expires_after_days);
        if !use_remaining_lifetime {
            return full;
        }
        record
            .expiration_time
            .map(|expiry| expiry - now)
            .filter(|remaining| remaining.is_positive())
            .unwrap_or(full)
    }

    fn build_cookie(&self, raw: String, expiry: OffsetDateTime) -> Cookie<'static> {
        let mut builder = Cookie::build((self.options.name.clone(), raw))
            .path(self.options.path.clone())
            .same_site(self.options.same_site);

        // Session record: no expires attribute at all.
        if self.options.expires_after_days != 0 {
            builder = builder.expires(expiry);
        }

        // Domain only when the hostname can carry one ('localhost' can't).
        if self.page.hostname_has_dot() {
            builder = builder.domain(self.effective_domain());
        }

        if self.options.secure && self.page.is_https() {
            builder = builder.secure(true);
        }

        builder.build()
    }

    fn effective_domain(&self) -> String {
        if self.options.domain.is_empty() {
            self.page.hostname.clone()
        } else {
            self.options.domain.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MemoryCookieJar, MemoryLocalStorage};

    fn adapter_with_jar() -> (PersistenceAdapter, Arc<MemoryCookieJar>) {
        let jar = Arc::new(MemoryCookieJar::new());
        let adapter = PersistenceAdapter::new(
            StorageBackend::Cookie(jar.clone()),
            CookieOptions {
                domain: "www.example.com".to_string(),
                ..Default::default()
            },
            PageContext::new("www.example.com"),
        );
        (adapter, jar)
    }

    fn populated_record() -> ConsentRecord {
        ConsentRecord {
            categories: vec!["necessary".to_string()],
            consent_id: Some("id-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cookie_backend_roundtrip() {
        let (adapter, _jar) = adapter_with_jar();
        let mut record = populated_record();

        adapter.write(&mut record, false);
        let loaded = adapter.load();

        assert_eq!(loaded.categories, record.categories);
        assert_eq!(loaded.consent_id, record.consent_id);
        assert_eq!(loaded.expiration_time, record.expiration_time);
    }

    #[test]
    fn test_local_backend_roundtrip() {
        let storage = Arc::new(MemoryLocalStorage::new());
        let adapter = PersistenceAdapter::new(
            StorageBackend::Local(storage.clone()),
            CookieOptions::default(),
            PageContext::new("localhost"),
        );

        let mut record = populated_record();
        adapter.write(&mut record, false);

        // Local-storage values are stored unencoded.
        let raw = storage.get_item("cc_cookie").expect("stored");
        assert!(raw.starts_with('{'));
        assert_eq!(adapter.load().categories, record.categories);
    }

    #[test]
    fn test_missing_record_loads_empty() {
        let (adapter, _jar) = adapter_with_jar();
        assert!(adapter.load().is_empty());
    }

    #[test]
    fn test_full_lifetime_stamps_configured_duration() {
        let (adapter, _jar) = adapter_with_jar();
        let mut record = populated_record();

        adapter.write(&mut record, false);

        let expiry = record.expiration_time.expect("stamped");
        let days = (expiry - OffsetDateTime::now_utc()).whole_days();
        assert!((181..=182).contains(&days), "got {days} days");
    }

    #[test]
    fn test_remaining_lifetime_does_not_reset_clock() {
        let (adapter, _jar) = adapter_with_jar();
        let mut record = populated_record();
        record.expiration_time = Some(OffsetDateTime::now_utc() + Duration::days(10));

        adapter.write(&mut record, true);

        let expiry = record.expiration_time.expect("stamped");
        let days = (expiry - OffsetDateTime::now_utc()).whole_days();
        assert!((9..=10).contains(&days), "got {days} days");
    }

    #[test]
    fn test_remaining_lifetime_falls_back_when_absent() {
        let (adapter, _jar) = adapter_with_jar();
        let mut record = populated_record();

        adapter.write(&mut record, true);

        let expiry = record.expiration_time.expect("stamped");
        let days = (expiry - OffsetDateTime::now_utc()).whole_days();
        assert!((181..=182).contains(&days), "got {days} days");
    }

    #[test]
    fn test_cookie_attributes() {
        let (adapter, _jar) = adapter_with_jar();
        let cookie = adapter.build_cookie("{}".to_string(), OffsetDateTime::now_utc());

        assert_eq!(cookie.domain(), Some("www.example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Lax));
        assert!(cookie.expires().is_some());
    }

    #[test]
    fn test_dotless_host_omits_domain() {
        let jar: Arc<MemoryCookieJar> = Arc::new(MemoryCookieJar::new());
        let adapter = PersistenceAdapter::new(
            StorageBackend::Cookie(jar),
            CookieOptions::default(),
            PageContext::new("localhost"),
        );

        let cookie = adapter.build_cookie("{}".to_string(), OffsetDateTime::now_utc());
        assert_eq!(cookie.domain(), None);
    }

    #[test]
    fn test_http_page_omits_secure() {
        let jar: Arc<MemoryCookieJar> = Arc::new(MemoryCookieJar::new());
        let adapter = PersistenceAdapter::new(
            StorageBackend::Cookie(jar),
            CookieOptions {
                domain: "example.com".to_string(),
                ..Default::default()
            },
            PageContext::new("example.com").scheme("http"),
        );

        let cookie = adapter.build_cookie("{}".to_string(), OffsetDateTime::now_utc());
        assert_eq!(cookie.secure(), None);
    }

    #[test]
    fn test_session_record_omits_expires() {
        let jar: Arc<MemoryCookieJar> = Arc::new(MemoryCookieJar::new());
        let adapter = PersistenceAdapter::new(
            StorageBackend::Cookie(jar),
            CookieOptions {
                expires_after_days: 0,
                ..Default::default()
            },
            PageContext::new("localhost"),
        );

        let cookie = adapter.build_cookie("{}".to_string(), OffsetDateTime::now_utc());
        assert_eq!(cookie.expires(), None);
    }
}
