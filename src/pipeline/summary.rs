//! Per-run tallies.

use serde::Serialize;

use crate::store::ActionRecord;
use crate::triage::Disposition;

/// What a run did. Returned even when nothing was pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub kept: usize,
    pub promotional: usize,
    pub trashed: usize,
    /// Messages whose final action differs from the recommendation.
    pub overridden: usize,
}

impl RunSummary {
    pub fn record(&mut self, record: &ActionRecord) {
        self.processed += 1;
        match record.final_action {
            Disposition::Keep => self.kept += 1,
            Disposition::Promotional => self.promotional += 1,
            Disposition::Trash => self.trashed += 1,
        }
        if record.was_overridden() {
            self.overridden += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processed == 0
    }
}
