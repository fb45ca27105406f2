//! Per-source completion tracking for one search session.
//!
//! The tracker starts with every known source pending. Each source reaches
//! a terminal outcome at most once: the first `Ok`/`Failed` report wins and
//! later reports for the same source are ignored, which absorbs duplicate or
//! out-of-order delivery. Sources outside the known universe are registered
//! on first sight.

use std::collections::HashMap;

use tracing::debug;

use crate::frame::Progress;
use crate::models::{SourceDescriptor, SourceId, SourceStatus};

#[derive(Debug, Clone)]
pub struct SourceStatusTracker {
    statuses: Vec<SourceStatus>,
    index: HashMap<SourceId, usize>,
    expected_total: Option<u64>,
}

impl SourceStatusTracker {
    pub fn new(universe: &[SourceDescriptor]) -> Self {
        let mut tracker = Self {
            statuses: Vec::with_capacity(universe.len()),
            index: HashMap::with_capacity(universe.len()),
            expected_total: None,
        };
        for source in universe {
            tracker.register(source.id.clone(), &source.display_name);
        }
        tracker
    }

    fn register(&mut self, id: SourceId, display_name: &str) -> usize {
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        let slot = self.statuses.len();
        self.statuses
            .push(SourceStatus::pending(id.clone(), display_name));
        self.index.insert(id, slot);
        slot
    }

    /// Apply one progress report. Returns `true` if any status changed.
    pub fn record_progress(&mut self, progress: &Progress) -> bool {
        // First non-zero total wins.
        if self.expected_total.is_none() {
            self.expected_total = progress.total.filter(|t| *t > 0);
        }

        let slot = match self.index.get(&progress.source) {
            Some(&slot) => slot,
            None => {
                debug!(source = %progress.source, "registering source outside the known universe");
                self.register(progress.source.clone(), &progress.display_name)
            }
        };

        let status = &mut self.statuses[slot];
        if status.outcome.is_terminal() {
            debug!(source = %progress.source, "ignoring progress for already settled source");
            return false;
        }

        status.outcome = progress.outcome;
        status.result_count = progress.result_count;
        status.elapsed_seconds = progress.elapsed_seconds;
        status.detail = progress.detail.clone();
        true
    }

    pub fn get(&self, source: &SourceId) -> Option<&SourceStatus> {
        self.index.get(source).map(|&slot| &self.statuses[slot])
    }

    /// All sources, pending included: catalog order, then late arrivals.
    pub fn snapshot(&self) -> Vec<SourceStatus> {
        self.statuses.clone()
    }

    /// Sources that reached `Ok` or `Failed`.
    pub fn completed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| s.outcome.is_terminal())
            .count()
    }

    /// Total announced by the backend, or the size of the tracked universe
    /// until one has been announced.
    pub fn expected_total(&self) -> u64 {
        self.expected_total
            .unwrap_or(self.statuses.len() as u64)
    }

    /// Settled sources over expected sources, in `[0, 1]`.
    pub fn progress_fraction(&self) -> f64 {
        let total = self.expected_total();
        if total == 0 {
            return 0.0;
        }
        (self.completed_count() as f64 / total as f64).clamp(0.0, 1.0)
    }
}
