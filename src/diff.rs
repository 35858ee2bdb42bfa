//! Diff engine: what changed since the last visit.
//!
//! Two baselines, deliberately distinct. A first consent in an opt-out
//! configuration diffs against the operator's default-enabled set (what
//! did the user actively turn off). Every other save diffs against the
//! last persisted record. Service diffs are computed per category,
//! independent of whether the category itself changed.

use crate::config::{ConsentConfig, ConsentMode};
use crate::state::ConsentStore;
use std::collections::HashMap;

/// The change set for one save operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentDiff {
    /// Categories whose acceptance flipped, insertion order preserved.
    pub changed_categories: Vec<String>,
    /// Per-category services whose acceptance flipped.
    pub changed_services: HashMap<String, Vec<String>>,
}

impl ConsentDiff {
    /// Either diff non-empty. Orthogonal to first-consent detection:
    /// accepting exactly the defaults is an empty diff but still a
    /// reportable first consent.
    pub fn state_changed(&self) -> bool {
        !self.changed_categories.is_empty()
            || self.changed_services.values().any(|list| !list.is_empty())
    }
}

/// Elements of `a` absent from `b`, in `a`'s order.
pub fn difference(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .filter(|item| !b.contains(item))
        .cloned()
        .collect()
}

/// Elements in exactly one of `a` and `b`: `a`'s leavers first, then
/// `b`'s, each side in its own order.
pub fn symmetric_diff(a: &[String], b: &[String]) -> Vec<String> {
    let mut diff = difference(a, b);
    diff.extend(difference(b, a));
    diff
}

/// Compute the change set for the store's current decision.
pub fn compute(store: &ConsentStore, config: &ConsentConfig) -> ConsentDiff {
    let changed_categories =
        if config.mode == ConsentMode::OptOut && store.invalid_consent {
            // First consent under opt-out: what the user turned off
            // relative to the operator's defaults.
            difference(
                &config.default_enabled_categories(),
                &store.accepted_categories,
            )
        } else {
            symmetric_diff(
                &store.accepted_categories,
                &store.saved_record.categories,
            )
        };

    let empty: Vec<String> = Vec::new();
    let mut changed_services = HashMap::new();
    for name in config.category_names() {
        let accepted = store.accepted_services.get(&name).unwrap_or(&empty);
        let previous = store.last_enabled_services.get(&name).unwrap_or(&empty);
        changed_services.insert(name, symmetric_diff(accepted, previous));
    }

    ConsentDiff {
        changed_categories,
        changed_services,
    }
}
