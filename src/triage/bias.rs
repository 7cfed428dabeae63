//! Historical per-domain bias.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::triage::types::Disposition;

/// Default minimum number of past actions before history is trusted.
pub const DEFAULT_MIN_SAMPLES: u64 = 3;

/// Raw per-domain action counts, keyed by persisted action name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainHistory {
    counts: BTreeMap<String, u64>,
}

impl DomainHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `action`.
    pub fn add(&mut self, action: impl Into<String>, count: u64) {
        *self.counts.entry(action.into()).or_insert(0) += count;
    }

    /// Count for a single action name (0 if never observed).
    pub fn count(&self, action: &str) -> u64 {
        self.counts.get(action).copied().unwrap_or(0)
    }

    /// Sum of every recorded action, including names outside the three dispositions.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for DomainHistory {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut history = Self::new();
        for (action, count) in iter {
            history.add(action, count);
        }
        history
    }
}

/// Normalized historical action rates for a sender domain.
///
/// Rates are `count / total`, where `total` includes every recorded action,
/// so the three rates need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DomainBias {
    pub trash: f64,
    pub promotional: f64,
    pub skip: f64,
    pub total: u64,
}

impl DomainBias {
    /// Compute bias, or `None` if the history is empty or thinner than `min_samples`.
    pub fn from_history(history: &DomainHistory, min_samples: u64) -> Option<Self> {
        if history.is_empty() {
            return None;
        }
        let total = history.total();
        if total < min_samples || total == 0 {
            return None;
        }

        let rate = |d: Disposition| history.count(d.as_str()) as f64 / total as f64;
        Some(Self {
            trash: rate(Disposition::Trash),
            promotional: rate(Disposition::Promotional),
            skip: rate(Disposition::Keep),
            total,
        })
    }

    /// One-line operator summary with truncated integer percentages.
    pub fn summary(&self) -> String {
        let pct = |r: f64| (r * 100.0) as u64;
        format!(
            "{} past email(s) ({}% spam, {}% promotional, {}% keep)",
            self.total,
            pct(self.trash),
            pct(self.promotional),
            pct(self.skip),
        )
    }
}
