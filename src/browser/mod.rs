//! The browser boundary.
//!
//! The engine never touches a DOM. Everything it needs from the page
//! (the live cookie jar, local device storage, page metadata, the shared
//! event queue, and the script-tag toggler) is reached through the traits
//! in this module. In-memory implementations back tests and headless
//! embedders; a real deployment binds them to its host environment.
//!
//! | Browser surface | consentkit trait |
//! |-----------------|------------------|
//! | `document.cookie` | [`CookieJar`] |
//! | `window.localStorage` | [`LocalStorage`] |
//! | `location` / `navigator` | [`PageContext`] |
//! | `window.dataLayer` | [`EventSink`] |
//! | managed `<script>` tags | [`ScriptGate`] |

pub mod events;
pub mod jar;
pub mod page;
pub mod storage;

pub use events::{ConsentBannerEvent, EventSink, MemoryEventQueue};
pub use jar::{CookieJar, MemoryCookieJar};
pub use page::PageContext;
pub use storage::{FileLocalStorage, LocalStorage, MemoryLocalStorage};

use std::collections::HashMap;

/// Script-tag gating collaborator.
///
/// Invoked after every committed save with the new accepted sets; turning
/// third-party script tags on or off is the embedder's business.
pub trait ScriptGate: Send + Sync {
    fn apply(
        &self,
        accepted_categories: &[String],
        accepted_services: &HashMap<String, Vec<String>>,
    );
}
