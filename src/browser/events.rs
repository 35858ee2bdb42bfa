//! Shared page event queue.
//!
//! The dispatcher can push a structured event for downstream
//! tag-management consumption, the way a page pushes onto its data layer.

use serde::Serialize;
use std::sync::Mutex;

/// Structured consent event for the page's shared event queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentBannerEvent {
    pub event: String,
    pub consent_id: String,
    pub consent_event: String,
    pub accepted_categories: String,
    pub rejected_categories: String,
}

impl ConsentBannerEvent {
    pub fn new(
        consent_id: impl Into<String>,
        consent_event: impl Into<String>,
        accepted_categories: impl Into<String>,
        rejected_categories: impl Into<String>,
    ) -> Self {
        Self {
            event: "cc_info".to_string(),
            consent_id: consent_id.into(),
            consent_event: consent_event.into(),
            accepted_categories: accepted_categories.into(),
            rejected_categories: rejected_categories.into(),
        }
    }
}

/// Consumer side of the shared event queue.
pub trait EventSink: Send + Sync {
    fn push(&self, event: ConsentBannerEvent);
}

/// In-memory [`EventSink`] that records every pushed event.
#[derive(Default)]
pub struct MemoryEventQueue {
    events: Mutex<Vec<ConsentBannerEvent>>,
}

impl MemoryEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything pushed so far.
    pub fn events(&self) -> Vec<ConsentBannerEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemoryEventQueue {
    fn push(&self, event: ConsentBannerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
