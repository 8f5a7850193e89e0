//! Run-level counters.

use serde::Serialize;

/// Statistics for one run of the orchestrator.
///
/// Owned and mutated only by [`crate::pipeline::Orchestrator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Identifiers returned by the listing.
    pub messages_listed: usize,
    /// Messages whose details loaded and that went through the pipeline.
    pub messages_processed: usize,
    /// Messages excluded entirely by the subject filter.
    pub messages_filtered: usize,
    /// Attachment candidates seen by the walker (before filename filtering).
    pub attachments_found: usize,
    /// Candidates skipped by the filename filter.
    pub attachments_skipped: usize,
    /// Attachments and rendered documents written to disk.
    pub artifacts_produced: usize,
    /// Subset of `artifacts_produced` that are rendered message bodies.
    pub documents_rendered: usize,
    /// Failed detail loads, downloads, and renders.
    pub failures: usize,
    /// The run was stopped by a signal before finishing.
    pub interrupted: bool,
}

/// Outcome of running one message through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    pub filtered: bool,
    pub attachments_found: usize,
    pub attachments_skipped: usize,
    pub artifacts: usize,
    pub document_rendered: bool,
    pub failures: usize,
}

impl RunStats {
    /// Fold one processed message into the totals.
    pub fn record(&mut self, outcome: &MessageOutcome) {
        self.messages_processed += 1;
        if outcome.filtered {
            self.messages_filtered += 1;
        }
        self.attachments_found += outcome.attachments_found;
        self.attachments_skipped += outcome.attachments_skipped;
        self.artifacts_produced += outcome.artifacts;
        if outcome.document_rendered {
            self.documents_rendered += 1;
        }
        self.failures += outcome.failures;
    }
}
