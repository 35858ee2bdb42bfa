//! Live cookie jar access.

use cookie::{Cookie, Expiration};
use dashmap::DashMap;
use time::OffsetDateTime;

/// The page's live cookie jar.
///
/// Writes are fire-and-forget: browsers offer no confirmation callback
/// for cookie writes, so neither does this trait. Erasure is expressed the
/// only way a page can: setting an already-expired cookie with the same
/// name, domain, and path.
pub trait CookieJar: Send + Sync {
    /// Names of every live cookie.
    fn cookie_names(&self) -> Vec<String>;

    /// Value of the named cookie, if present.
    fn get(&self, name: &str) -> Option<String>;

    /// Write a cookie. An expiration in the past deletes the matching
    /// cookie; a denied write (browser policy) is silently dropped.
    ///
    /// Values cross this trait decoded. A binding that renders a real
    /// `Set-Cookie`/`document.cookie` string percent-encodes at that
    /// boundary via [`Cookie::encoded`]; reads decode symmetrically.
    fn set(&self, cookie: Cookie<'static>);
}

/// Cookie identity: a browser keys cookies by name, domain, and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JarKey {
    name: String,
    domain: String,
    path: String,
}

impl JarKey {
    fn from_cookie(cookie: &Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            domain: normalize_domain(cookie.domain().unwrap_or("")),
            path: cookie.path().unwrap_or("/").to_string(),
        }
    }
}

/// Cookie-domain matching is suffix-based, so the leading dot carries no
/// identity.
fn normalize_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

/// In-memory [`CookieJar`].
///
/// Shared between the save path and the detached logging dispatcher, so
/// the store is a concurrent map.
#[derive(Default)]
pub struct MemoryCookieJar {
    store: DashMap<JarKey, String>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie directly, as third-party scripts would have.
    pub fn seed(&self, name: &str, value: &str, domain: &str, path: &str) {
        self.store.insert(
            JarKey {
                name: name.to_string(),
                domain: normalize_domain(domain),
                path: path.to_string(),
            },
            value.to_string(),
        );
    }

    /// Whether any live cookie carries this name.
    pub fn contains(&self, name: &str) -> bool {
        self.store.iter().any(|entry| entry.key().name == name)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for entry in self.store.iter() {
            if !names.contains(&entry.key().name) {
                names.push(entry.key().name.clone());
            }
        }
        names
    }

    fn get(&self, name: &str) -> Option<String> {
        self.store
            .iter()
            .find(|entry| entry.key().name == name)
            .map(|entry| entry.value().clone())
    }

    fn set(&self, cookie: Cookie<'static>) {
        let key = JarKey::from_cookie(&cookie);

        if is_expired(&cookie) {
            self.store.remove(&key);
            return;
        }

        self.store.insert(key, cookie.value().to_string());
    }
}

fn is_expired(cookie: &Cookie<'_>) -> bool {
    match cookie.expires() {
        Some(Expiration::DateTime(instant)) => instant <= OffsetDateTime::now_utc(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let jar = MemoryCookieJar::new();
        jar.set(Cookie::build(("session", "abc")).path("/").build());

        assert_eq!(jar.get("session"), Some("abc".to_string()));
        assert_eq!(jar.cookie_names(), vec!["session".to_string()]);
    }

    #[test]
    fn test_expired_set_deletes() {
        let jar = MemoryCookieJar::new();
        jar.seed("_ga", "GA1.1.1.1", "example.com", "/");
        assert!(jar.contains("_ga"));

        jar.set(
            Cookie::build(("_ga", ""))
                .domain(".example.com")
                .path("/")
                .expires(OffsetDateTime::UNIX_EPOCH)
                .build(),
        );

        assert!(!jar.contains("_ga"));
    }

    #[test]
    fn test_deletion_requires_matching_identity() {
        let jar = MemoryCookieJar::new();
        jar.seed("_gid", "1", "example.com", "/");

        // Wrong domain: the original cookie survives.
        jar.set(
            Cookie::build(("_gid", ""))
                .domain(".other.com")
                .path("/")
                .expires(OffsetDateTime::UNIX_EPOCH)
                .build(),
        );

        assert!(jar.contains("_gid"));
    }

    #[test]
    fn test_leading_dot_carries_no_identity() {
        let jar = MemoryCookieJar::new();
        jar.seed("_fbp", "fb.1", ".example.com", "/");

        jar.set(
            Cookie::build(("_fbp", ""))
                .domain("example.com")
                .path("/")
                .expires(OffsetDateTime::UNIX_EPOCH)
                .build(),
        );

        assert!(!jar.contains("_fbp"));
    }

    #[test]
    fn test_same_name_across_domains() {
        let jar = MemoryCookieJar::new();
        jar.seed("_ga", "a", "www.example.com", "/");
        jar.seed("_ga", "b", "example.com", "/");

        assert_eq!(jar.len(), 2);
        assert_eq!(jar.cookie_names(), vec!["_ga".to_string()]);
    }
}
