//! # consentkit
//!
//! A client-side consent state engine for cookie banners.
//!
//! `consentkit` tracks which cookie/data-processing categories and
//! third-party services a visitor has approved, persists that decision
//! compactly across sessions, detects what changed between visits, purges
//! disallowed cookies, and reports the decision to an external analytics
//! pipeline without ever blocking the caller.
//!
//! ## Features
//!
//! - **Compact persistence**: short-key codec keeps the record small
//!   enough for a cookie header; cookie or local-storage backend
//! - **Visit-to-visit diffing**: first-consent and update baselines,
//!   per-service change tracking
//! - **Cookie auto-clear**: literal and pattern matchers, domain-variant
//!   erasure with `www.`→apex fallback
//! - **Detached consent logging**: bounded GA4 identifier polling,
//!   fire-and-forget HTTP dispatch on the hyper stack
//! - **UI-free core**: the banner, script gating, and storage backends
//!   stay behind traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use consentkit::config::{CategoryDefinition, ConsentConfig, LoggingConfig};
//! use consentkit::manager::ConsentManager;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConsentConfig::new()
//!         .category(CategoryDefinition::new("necessary").enabled(true).read_only(true))
//!         .category(CategoryDefinition::new("analytics"))
//!         .logging(LoggingConfig::new("http://127.0.0.1:8080/ccdata"));
//!
//!     let mut manager = ConsentManager::builder(config).build();
//!     manager.load();
//!     manager.accept_category("analytics");
//!     let outcome = manager.save_preferences();
//!     println!("first consent: {}", outcome.first_consent);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types and error definitions
//! - [`config`] - Operator configuration and the category catalogue
//! - [`record`] - Consent record model and compact wire codec
//! - [`browser`] - Browser boundary traits and in-memory doubles
//! - [`storage`] - Persistence adapter and expiration handling
//! - [`state`] - In-memory session state
//! - [`diff`] - Change detection between visits
//! - [`autoclear`] - Cookie matching and erasure
//! - [`dispatch`] - Detached consent logging
//! - [`manager`] - Save orchestration
//!
//! ## Failure policy
//!
//! Nothing in this crate throws at the embedding page. Malformed stored
//! records decode to "no decision", blocked storage writes are
//! fire-and-forget, unreachable logging endpoints are traced and dropped,
//! and undeletable cookies are skipped.

pub mod autoclear;
pub mod base;
pub mod browser;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod manager;
pub mod record;
pub mod state;
pub mod storage;
