//! Cookie erasure across domain variants.

use crate::browser::CookieJar;
use cookie::Cookie;
use time::OffsetDateTime;

/// Erases cookies by writing already-expired replacements.
///
/// Erasure is best-effort: a cookie the browser refuses to delete
/// (`HttpOnly`, cross-origin) is silently skipped; the jar write simply
/// has no effect.
pub struct CookieEraser<'a> {
    jar: &'a dyn CookieJar,
    default_domain: &'a str,
    default_path: &'a str,
}

impl<'a> CookieEraser<'a> {
    pub fn new(jar: &'a dyn CookieJar, default_domain: &'a str, default_path: &'a str) -> Self {
        Self {
            jar,
            default_domain,
            default_path,
        }
    }

    /// Erase every named cookie at the matcher's path and domain.
    ///
    /// With no explicit domain the configured domain is used, and when
    /// that is a `www.` subdomain the bare apex is erased as well,
    /// covering cookies set at either form.
    pub fn erase(&self, names: &[String], custom_path: Option<&str>, custom_domain: Option<&str>) {
        if names.is_empty() {
            return;
        }

        let path = custom_path.unwrap_or(self.default_path);

        for name in names {
            match custom_domain {
                Some(domain) => self.erase_at(name, path, domain),
                None => {
                    self.erase_at(name, path, self.default_domain);
                    if let Some(apex) = apex_of_www(self.default_domain) {
                        self.erase_at(name, path, apex);
                    }
                }
            }
            tracing::debug!(cookie = %name, path, "autoclear: deleting cookie");
        }
    }

    fn erase_at(&self, name: &str, path: &str, domain: &str) {
        // Cookie-domain matching is suffix-based; a missing leading dot
        // gets one.
        let domain = if domain.starts_with('.') {
            domain.to_string()
        } else {
            format!(".{domain}")
        };

        self.jar.set(
            Cookie::build((name.to_string(), String::new()))
                .path(path.to_string())
                .domain(domain)
                .expires(OffsetDateTime::UNIX_EPOCH)
                .build(),
        );
    }
}

/// `www.example.com` → `example.com`; anything else → `None`.
fn apex_of_www(domain: &str) -> Option<&str> {
    domain.trim_start_matches('.').strip_prefix("www.")
}
