//! Operator configuration.
//!
//! Everything the embedding page decides up front: the cookie the decision
//! is stored in, the category/service catalogue with auto-clear rules, the
//! consent mode, and the optional consent-logging endpoint.
//!
//! # Example
//!
//! ```rust
//! use consentkit::config::{CategoryDefinition, ConsentConfig, AutoClear};
//! use consentkit::autoclear::CookieMatcher;
//!
//! let config = ConsentConfig::new()
//!     .revision(1)
//!     .category(CategoryDefinition::new("necessary").enabled(true).read_only(true))
//!     .category(
//!         CategoryDefinition::new("analytics").auto_clear(AutoClear::new(vec![
//!             CookieMatcher::pattern("^_ga"),
//!             CookieMatcher::literal("_gid"),
//!         ])),
//!     );
//! ```

use crate::autoclear::CookieMatcher;
use cookie::SameSite;

/// Consent mode: who wins before the user has decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentMode {
    /// Nothing runs until the user opts in.
    #[default]
    OptIn,
    /// Default-enabled categories run until the user opts out.
    OptOut,
}

/// Options for the consent cookie (or local-storage entry) itself.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Name of the cookie / storage key.
    pub name: String,
    /// Domain attribute. Empty means "use the active hostname".
    pub domain: String,
    /// Path attribute.
    pub path: String,
    /// Validity period in days. `0` produces a session cookie (no
    /// `expires` attribute).
    pub expires_after_days: i64,
    pub same_site: SameSite,
    /// Write `Secure` (only honored under HTTPS).
    pub secure: bool,
    /// Persist to local device storage instead of a cookie.
    pub use_local_storage: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "cc_cookie".to_string(),
            domain: String::new(),
            path: "/".to_string(),
            expires_after_days: 182,
            same_site: SameSite::Lax,
            secure: true,
            use_local_storage: false,
        }
    }
}

/// Auto-clear descriptor: which cookies die with the category/service,
/// and whether disabling it requires a page reload.
#[derive(Debug, Clone, Default)]
pub struct AutoClear {
    pub cookies: Vec<CookieMatcher>,
    pub reload_page: bool,
}

impl AutoClear {
    pub fn new(cookies: Vec<CookieMatcher>) -> Self {
        Self {
            cookies,
            reload_page: false,
        }
    }

    pub fn reload_page(mut self, reload: bool) -> Self {
        self.reload_page = reload;
        self
    }
}

/// A service scoped inside a category (e.g. a specific analytics vendor).
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    /// Cookies to erase when the service is turned off.
    pub cookies: Vec<CookieMatcher>,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cookies: Vec::new(),
        }
    }

    pub fn cookies(mut self, cookies: Vec<CookieMatcher>) -> Self {
        self.cookies = cookies;
        self
    }
}

/// A named grouping of cookies/processing purposes the user accepts or
/// rejects as a unit.
#[derive(Debug, Clone)]
pub struct CategoryDefinition {
    pub name: String,
    /// Part of the default/initial accepted set.
    pub enabled: bool,
    /// Cannot be toggled; always reported accepted.
    pub read_only: bool,
    pub auto_clear: Option<AutoClear>,
    pub services: Vec<ServiceDefinition>,
}

impl CategoryDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            read_only: false,
            auto_clear: None,
            services: Vec::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn auto_clear(mut self, auto_clear: AutoClear) -> Self {
        self.auto_clear = Some(auto_clear);
        self
    }

    pub fn service(mut self, service: ServiceDefinition) -> Self {
        self.services.push(service);
        self
    }

    /// Names of every service defined under this category.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// Consent-logging endpoint configuration. Absent config disables the
/// dispatcher entirely.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// HTTP endpoint receiving the consent event payload.
    pub endpoint: String,
    /// Poll for GA4 identifiers before sending when an analytics-like
    /// category was accepted.
    pub wait_for_ga4: bool,
    /// Push a structured event onto the shared event queue before the
    /// network call.
    pub push_to_data_layer: bool,
    /// Send `Prefer: return=minimal` with the request.
    pub use_prefer_header: bool,
}

impl LoggingConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            wait_for_ga4: true,
            push_to_data_layer: true,
            use_prefer_header: false,
        }
    }

    pub fn wait_for_ga4(mut self, wait: bool) -> Self {
        self.wait_for_ga4 = wait;
        self
    }

    pub fn push_to_data_layer(mut self, push: bool) -> Self {
        self.push_to_data_layer = push;
        self
    }

    pub fn use_prefer_header(mut self, prefer: bool) -> Self {
        self.use_prefer_header = prefer;
        self
    }
}

/// Top-level configuration, built with chainable with-methods.
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    pub mode: ConsentMode,
    /// Operator-defined schema marker. A stored record whose revision
    /// differs is treated as invalid and forces re-consent.
    pub revision: i64,
    pub auto_clear_cookies: bool,
    pub cookie: CookieOptions,
    /// Category catalogue in display order.
    pub categories: Vec<CategoryDefinition>,
    pub language: String,
    pub logging: Option<LoggingConfig>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentConfig {
    pub fn new() -> Self {
        Self {
            mode: ConsentMode::OptIn,
            revision: 0,
            auto_clear_cookies: true,
            cookie: CookieOptions::default(),
            categories: Vec::new(),
            language: "en".to_string(),
            logging: None,
        }
    }

    pub fn mode(mut self, mode: ConsentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn revision(mut self, revision: i64) -> Self {
        self.revision = revision;
        self
    }

    pub fn auto_clear_cookies(mut self, enabled: bool) -> Self {
        self.auto_clear_cookies = enabled;
        self
    }

    pub fn cookie(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn category(mut self, category: CategoryDefinition) -> Self {
        self.categories.push(category);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Look up a category definition by name.
    pub fn find_category(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Look up a service definition.
    pub fn find_service(&self, category: &str, service: &str) -> Option<&ServiceDefinition> {
        self.find_category(category)
            .and_then(|c| c.services.iter().find(|s| s.name == service))
    }

    /// All configured category names, in display order.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Categories in the default/initial accepted set. Read-only
    /// categories are always part of it.
    pub fn default_enabled_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.enabled || c.read_only)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Read-only category names.
    pub fn read_only_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.read_only)
            .map(|c| c.name.clone())
            .collect()
    }
}
