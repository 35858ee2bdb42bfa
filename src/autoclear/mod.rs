//! Autoclear: purge cookies belonging to disabled categories and services.
//!
//! Two independent passes over the diffed change set:
//!
//! 1. **Service-level**: every changed-and-now-disabled service that
//!    declares matchers erases its cookies, regardless of what happened to
//!    the parent category.
//! 2. **Category-level**: non-read-only categories with an autoclear
//!    descriptor are eligible when disabled on first consent, or freshly
//!    disabled on an update. A descriptor may also demand a page reload;
//!    the flag is raised only when the disable happened on this save.

pub mod eraser;
pub mod matcher;

pub use eraser::CookieEraser;
pub use matcher::{CookieMatcher, MatcherName};

use crate::browser::CookieJar;
use crate::config::ConsentConfig;
use crate::state::ConsentStore;

/// One autoclear run over a freshly diffed store.
pub struct Autoclear<'a> {
    config: &'a ConsentConfig,
    jar: &'a dyn CookieJar,
    /// Effective cookie domain (config domain, or the hostname).
    domain: &'a str,
}

impl<'a> Autoclear<'a> {
    pub fn new(config: &'a ConsentConfig, jar: &'a dyn CookieJar, domain: &'a str) -> Self {
        Self {
            config,
            jar,
            domain,
        }
    }

    pub fn run(&self, store: &mut ConsentStore, is_first_consent: bool) {
        // Snapshot the live names once; matching never observes its own
        // deletions.
        let live = self.jar.cookie_names();
        let eraser = CookieEraser::new(self.jar, self.domain, &self.config.cookie.path);

        self.clear_service_cookies(store, &live, &eraser);
        self.clear_category_cookies(store, &live, is_first_consent, &eraser);
    }

    /// Pass 1: cookies of services that just turned off.
    fn clear_service_cookies(
        &self,
        store: &ConsentStore,
        live: &[String],
        eraser: &CookieEraser<'_>,
    ) {
        for (category, changed) in &store.last_changed_services {
            for service in changed {
                let Some(definition) = self.config.find_service(category, service) else {
                    continue;
                };
                if definition.cookies.is_empty() || store.service_accepted(category, service) {
                    continue;
                }

                for matcher in &definition.cookies {
                    let found = matcher.find_matches(live);
                    eraser.erase(&found, matcher.path.as_deref(), matcher.domain.as_deref());
                }
            }
        }
    }

    /// Pass 2: cookies of categories that are (or just became) disabled.
    fn clear_category_cookies(
        &self,
        store: &mut ConsentStore,
        live: &[String],
        is_first_consent: bool,
        eraser: &CookieEraser<'_>,
    ) {
        let candidates = if is_first_consent {
            self.config.category_names()
        } else {
            store.last_changed_categories.clone()
        };

        for name in candidates {
            let Some(category) = self.config.find_category(&name) else {
                continue;
            };
            if category.read_only {
                continue;
            }
            let Some(auto_clear) = &category.auto_clear else {
                continue;
            };

            let just_changed = store.last_changed_categories.contains(&name);
            let disabled = !store.accepted(&name);
            let just_disabled = just_changed && disabled;

            let should_clear = if is_first_consent {
                disabled
            } else {
                just_disabled
            };
            if !should_clear {
                continue;
            }

            // Reload only when the disabling happened on this save, not
            // merely on first load.
            if auto_clear.reload_page && just_disabled {
                store.reload_page = true;
            }

            for matcher in &auto_clear.cookies {
                let found = matcher.find_matches(live);
                eraser.erase(&found, matcher.path.as_deref(), matcher.domain.as_deref());
            }
        }
    }
}
