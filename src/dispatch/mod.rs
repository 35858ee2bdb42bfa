//! Consent logging dispatcher.
//!
//! Reports consent events to a remote endpoint without ever blocking the
//! save path: the dispatch runs on a detached task, failures are traced
//! and dropped, and the only waiting that happens anywhere is the bounded
//! GA4 identifier polling inside the task itself.

pub mod ga4;
pub mod transport;

pub use transport::{HyperTransport, LogTransport};

use crate::base::ConsentError;
use crate::browser::{ConsentBannerEvent, CookieJar, EventSink, LocalStorage, PageContext};
use crate::config::LoggingConfig;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Local-storage key for the device-stable consent id.
pub const CONSENT_ID_STORAGE_KEY: &str = "cc_consent_id";

/// The two reportable consent events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentEventKind {
    FirstConsent,
    ConsentUpdate,
}

impl ConsentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentEventKind::FirstConsent => "first_consent",
            ConsentEventKind::ConsentUpdate => "consent_update",
        }
    }
}

/// Wire payload for the logging endpoint. `event` and `consent_id` are
/// the endpoint's required fields; everything else is nullable context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPayload {
    pub event: String,
    pub consent_id: String,
    pub accept_type: String,
    pub accepted_categories: String,
    pub rejected_categories: String,
    pub ga4_client_id: Option<String>,
    pub ga4_session_id: Option<String>,
    pub user_agent: String,
    pub hostname: String,
    pub page_url: String,
}

/// Immutable view of the decision at dispatch time. Captured on the save
/// path; the detached task never touches the live store.
#[derive(Debug, Clone)]
pub struct ConsentSnapshot {
    pub consent_id: Option<String>,
    pub accept_type: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

/// Asynchronous, best-effort consent event reporter.
#[derive(Clone)]
pub struct ConsentLogger {
    config: LoggingConfig,
    endpoint: Url,
    transport: Arc<dyn LogTransport>,
    jar: Arc<dyn CookieJar>,
    storage: Arc<dyn LocalStorage>,
    events: Option<Arc<dyn EventSink>>,
    page: PageContext,
}

impl ConsentLogger {
    pub fn new(
        config: LoggingConfig,
        transport: Arc<dyn LogTransport>,
        jar: Arc<dyn CookieJar>,
        storage: Arc<dyn LocalStorage>,
        events: Option<Arc<dyn EventSink>>,
        page: PageContext,
    ) -> Result<Self, ConsentError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| ConsentError::invalid_endpoint(&config.endpoint))?;

        Ok(Self {
            config,
            endpoint,
            transport,
            jar,
            storage,
            events,
            page,
        })
    }

    /// Initiate a detached dispatch. Returns immediately; the caller
    /// never awaits the outcome. Without a runtime the event is dropped
    /// with a warning, never a panic on the save path.
    pub fn log_event(&self, kind: ConsentEventKind, snapshot: ConsentSnapshot) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                event = kind.as_str(),
                "no async runtime available, consent event dropped"
            );
            return;
        };

        let logger = self.clone();
        handle.spawn(async move {
            logger.dispatch(kind, snapshot).await;
        });
    }

    /// The dispatch body. Public so tests (and embedders that manage
    /// their own tasks) can await it directly.
    pub async fn dispatch(&self, kind: ConsentEventKind, snapshot: ConsentSnapshot) {
        // The device-stable id wins over the in-memory one.
        let consent_id = self
            .storage
            .get_item(CONSENT_ID_STORAGE_KEY)
            .or_else(|| snapshot.consent_id.clone())
            .unwrap_or_default();

        let (ga4_client_id, ga4_session_id) =
            if self.config.wait_for_ga4 && ga4::should_wait(&snapshot.accepted) {
                ga4::ids_with_retry(self.jar.as_ref(), ga4::MAX_ID_PROBES, ga4::ID_PROBE_DELAY)
                    .await
            } else {
                (
                    ga4::client_id(self.jar.as_ref()),
                    ga4::session_id(self.jar.as_ref()),
                )
            };

        let accepted = snapshot.accepted.join(", ");
        let rejected = snapshot.rejected.join(", ");

        if self.config.push_to_data_layer {
            if let Some(events) = &self.events {
                events.push(ConsentBannerEvent::new(
                    &consent_id,
                    kind.as_str(),
                    &accepted,
                    &rejected,
                ));
            }
        }

        let payload = LogPayload {
            event: kind.as_str().to_string(),
            consent_id,
            accept_type: snapshot.accept_type,
            accepted_categories: accepted,
            rejected_categories: rejected,
            ga4_client_id,
            ga4_session_id,
            user_agent: self.page.user_agent.clone(),
            hostname: self.page.hostname.clone(),
            page_url: self.page.page_url.clone(),
        };

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(event = kind.as_str(), "consent payload serialization failed: {e}");
                return;
            }
        };

        match self
            .transport
            .post_json(self.endpoint.clone(), body, self.config.use_prefer_header)
            .await
        {
            Ok(status) if (200..300).contains(&status) => {
                tracing::debug!(event = kind.as_str(), status, "consent event logged");
            }
            Ok(status) => {
                tracing::warn!(event = kind.as_str(), status, "consent endpoint refused event");
            }
            Err(e) => {
                tracing::warn!(event = kind.as_str(), "consent event dropped: {e}");
            }
        }
    }
}
