//! GA4 analytics identifiers, read from the live cookie jar.
//!
//! The client id lives in the `_ga` cookie (`GA1.1.<client>.<ts>`, minus
//! the two version fields), the session id in the third dotted
//! field of any `_ga_*` measurement cookie. Analytics scripts set these
//! asynchronously, so the dispatcher may poll for them within a fixed
//! budget before giving up.

use crate::browser::CookieJar;
use std::time::Duration;

/// Identifier polling budget: probe attempts before sending nulls.
pub const MAX_ID_PROBES: usize = 3;
/// Fixed delay between probe attempts.
pub const ID_PROBE_DELAY: Duration = Duration::from_millis(500);

/// Category-name substrings that make waiting for identifiers worthwhile.
const ANALYTICS_HINTS: [&str; 3] = ["analytics", "marketing", "targeting"];

/// GA4 client id from the `_ga` cookie.
pub fn client_id(jar: &dyn CookieJar) -> Option<String> {
    let value = jar.get("_ga")?;
    let parts: Vec<&str> = value.split('.').collect();
    (parts.len() >= 4).then(|| parts[2..].join("."))
}

/// GA4 session id from the first `_ga_*` measurement cookie.
pub fn session_id(jar: &dyn CookieJar) -> Option<String> {
    for name in jar.cookie_names() {
        if !name.starts_with("_ga_") {
            continue;
        }
        if let Some(value) = jar.get(&name) {
            let parts: Vec<&str> = value.split('.').collect();
            if parts.len() >= 3 {
                return Some(parts[2].to_string());
            }
        }
    }
    None
}

/// Whether any accepted category looks analytics-like.
pub fn should_wait(accepted_categories: &[String]) -> bool {
    accepted_categories.iter().any(|category| {
        let lower = category.to_ascii_lowercase();
        ANALYTICS_HINTS.iter().any(|hint| lower.contains(hint))
    })
}

/// Poll for the identifier pair within the probe budget. Returns as soon
/// as either identifier materializes; after the last probe, nulls.
pub async fn ids_with_retry(
    jar: &dyn CookieJar,
    max_probes: usize,
    delay: Duration,
) -> (Option<String>, Option<String>) {
    for probe in 0..max_probes {
        let client = client_id(jar);
        let session = session_id(jar);

        if client.is_some() || session.is_some() {
            return (client, session);
        }

        if probe + 1 < max_probes {
            tokio::time::sleep(delay).await;
        }
    }

    (None, None)
}
