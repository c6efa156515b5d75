//! Diff review controller: buffers a proposed revision stream separately
//! from the live document until a human accepts or rejects it.
//!
//! The controller intercepts diff-mode stream operations. Tokens accumulate
//! in a private buffer; the document and undo stack are untouched until
//! [`DiffReviewController::accept`]. Any new stream (diff or not) observed
//! while a review is pending auto-discards it, so a stale review panel can
//! never outlive the content it was proposed against.

use crate::bus::{BusEvent, StreamMode};
use crate::document::{SharedDocument, SharedHistory};
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};

/// Lifecycle of a review: `Closed → Buffering → Open → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewPhase {
    /// No proposed revision exists.
    #[default]
    Closed,
    /// A diff-mode stream is accumulating tokens.
    Buffering,
    /// The stream ended with content; awaiting Accept/Reject.
    Open,
}

/// Read-only projection of the buffered revision awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffReviewState {
    pub phase: ReviewPhase,
    /// The owning stream operation, `None` when closed.
    pub operation_id: Option<String>,
    /// Document content captured when the diff operation started.
    pub original_text: String,
    /// Tokens received so far, in arrival order.
    pub proposed_text: String,
}

impl DiffReviewState {
    /// Whether the review is open for a decision.
    pub fn is_open(&self) -> bool {
        self.phase == ReviewPhase::Open
    }
}

/// Buffers diff-mode streams and arbitrates Accept/Reject.
pub struct DiffReviewController {
    document: Option<SharedDocument>,
    history: Option<SharedHistory>,
    state: DiffReviewState,
}

impl DiffReviewController {
    /// Create a controller over the given handles. A missing document handle
    /// makes Accept close the review without writing.
    pub fn new(document: Option<SharedDocument>, history: Option<SharedHistory>) -> Self {
        Self {
            document,
            history,
            state: DiffReviewState::default(),
        }
    }

    /// Current review state.
    pub fn state(&self) -> &DiffReviewState {
        &self.state
    }

    /// Process one bus event.
    pub fn on_event(&mut self, event: &BusEvent) {
        match event {
            BusEvent::StreamStart {
                operation_id, mode, ..
            } => self.on_start(operation_id, *mode),
            BusEvent::StreamToken {
                operation_id,
                token,
                ..
            } => self.on_token(operation_id, token),
            BusEvent::StreamEnd {
                operation_id,
                cancelled,
                ..
            } => self.on_end(operation_id, *cancelled),
            // A full replacement invalidates the captured original text.
            BusEvent::DocumentReplaced { .. } => self.discard("document replaced"),
            BusEvent::SelectionChanged { .. } => {}
        }
    }

    fn on_start(&mut self, operation_id: &str, mode: StreamMode) {
        if self.state.phase != ReviewPhase::Closed {
            self.discard("superseded by new stream");
        }
        if !mode.is_diff() {
            // Stream consumer's territory.
            return;
        }

        let original_text = self.document_content().unwrap_or_default();
        self.state = DiffReviewState {
            phase: ReviewPhase::Buffering,
            operation_id: Some(operation_id.to_owned()),
            original_text,
            proposed_text: String::new(),
        };
        debug!(%operation_id, "diff review buffering");
    }

    fn on_token(&mut self, operation_id: &str, token: &str) {
        if self.state.phase != ReviewPhase::Buffering {
            return;
        }
        if self.state.operation_id.as_deref() != Some(operation_id) {
            debug!(%operation_id, "diff token for stale operation, dropped");
            return;
        }
        self.state.proposed_text.push_str(token);
    }

    fn on_end(&mut self, operation_id: &str, cancelled: bool) {
        if self.state.phase != ReviewPhase::Buffering
            || self.state.operation_id.as_deref() != Some(operation_id)
        {
            return;
        }

        if cancelled || self.state.proposed_text.is_empty() {
            self.discard(if cancelled { "cancelled" } else { "empty buffer" });
            return;
        }

        self.state.phase = ReviewPhase::Open;
        info!(
            %operation_id,
            proposed_len = self.state.proposed_text.len(),
            "diff review open"
        );
    }

    /// Apply the reviewed revision to the document.
    ///
    /// `final_text` is written exactly as passed; the reviewer may have
    /// edited it away from the buffered proposal. One history snapshot is
    /// pushed before the write and one after. Tolerates a missing document
    /// handle by closing the review without writing.
    pub fn accept(&mut self, final_text: &str) {
        if self.state.phase != ReviewPhase::Open {
            warn!(phase = ?self.state.phase, "accept called with no open review");
            return;
        }

        if let Some(handle) = &self.document
            && let Ok(mut doc) = handle.lock()
        {
            let before = doc.content();
            self.push_snapshot(&before);
            doc.set_content(final_text);
            self.push_snapshot(final_text);
        }

        info!(final_len = final_text.len(), "diff review accepted");
        self.state = DiffReviewState::default();
    }

    /// Discard the proposed revision without touching the document or the
    /// undo stack.
    pub fn reject(&mut self) {
        if self.state.phase == ReviewPhase::Closed {
            return;
        }
        info!("diff review rejected");
        self.state = DiffReviewState::default();
    }

    /// Unified line diff from the original to the proposed text, for display.
    /// `None` unless the review is open.
    pub fn unified_diff(&self) -> Option<String> {
        if !self.state.is_open() {
            return None;
        }

        let diff = TextDiff::from_lines(&self.state.original_text, &self.state.proposed_text);
        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            out.push(sign);
            out.push_str(&change.to_string());
            if change.missing_newline() {
                out.push('\n');
            }
        }
        Some(out)
    }

    fn discard(&mut self, reason: &str) {
        if self.state.phase == ReviewPhase::Closed {
            return;
        }
        debug!(operation_id = ?self.state.operation_id, reason, "diff review discarded");
        self.state = DiffReviewState::default();
    }

    fn document_content(&self) -> Option<String> {
        let handle = self.document.as_ref()?;
        let doc = handle.lock().ok()?;
        Some(doc.content())
    }

    fn push_snapshot(&self, content: &str) {
        if let Some(handle) = &self.history
            && let Ok(mut history) = handle.lock()
        {
            history.push_snapshot(content);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::document::{Document, History, InMemoryDocument, SnapshotHistory};
    use std::sync::{Arc, Mutex};

    fn start(id: &str, mode: StreamMode) -> BusEvent {
        BusEvent::StreamStart {
            operation_id: id.to_owned(),
            target_position: None,
            mode,
        }
    }

    fn token(id: &str, text: &str, index: u64) -> BusEvent {
        BusEvent::StreamToken {
            operation_id: id.to_owned(),
            token: text.to_owned(),
            index,
        }
    }

    fn end(id: &str, cancelled: bool) -> BusEvent {
        BusEvent::StreamEnd {
            operation_id: id.to_owned(),
            cancelled,
            total_tokens: 0,
        }
    }

    fn controller() -> (
        DiffReviewController,
        Arc<Mutex<InMemoryDocument>>,
        Arc<Mutex<SnapshotHistory>>,
    ) {
        let doc = Arc::new(Mutex::new(InMemoryDocument::with_content("Original content.")));
        let history = Arc::new(Mutex::new(SnapshotHistory::new()));
        let c = DiffReviewController::new(Some(doc.clone()), Some(history.clone()));
        (c, doc, history)
    }

    #[test]
    fn buffers_tokens_and_opens_on_end() {
        let (mut c, doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "Rev", 0));
        c.on_event(&token("op-1", "ised ", 1));
        c.on_event(&token("op-1", "content.", 2));
        c.on_event(&end("op-1", false));

        assert!(c.state().is_open());
        assert_eq!(c.state().proposed_text, "Revised content.");
        assert_eq!(c.state().original_text, "Original content.");
        // Buffering never touched the document.
        assert_eq!(doc.lock().unwrap().content(), "Original content.");
    }

    #[test]
    fn stale_tokens_are_dropped_from_buffer() {
        let (mut c, _doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "mine", 0));
        c.on_event(&token("op-2", "not mine", 0));
        c.on_event(&end("op-1", false));

        assert_eq!(c.state().proposed_text, "mine");
    }

    #[test]
    fn cancelled_stream_discards_without_opening() {
        let (mut c, _doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "partial", 0));
        c.on_event(&end("op-1", true));

        assert_eq!(c.state().phase, ReviewPhase::Closed);
        assert_eq!(c.state().proposed_text, "");
    }

    #[test]
    fn empty_buffer_discards_without_opening() {
        let (mut c, _doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&end("op-1", false));
        assert_eq!(c.state().phase, ReviewPhase::Closed);
    }

    #[test]
    fn new_diff_stream_supersedes_pending_review() {
        let (mut c, doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "old proposal", 0));
        c.on_event(&end("op-1", false));
        assert!(c.state().is_open());

        c.on_event(&start("op-2", StreamMode::Diff));
        assert_eq!(c.state().phase, ReviewPhase::Buffering);
        assert_eq!(c.state().operation_id.as_deref(), Some("op-2"));
        assert_eq!(c.state().proposed_text, "");
        // Discard never mutates the document.
        assert_eq!(doc.lock().unwrap().content(), "Original content.");
    }

    #[test]
    fn non_diff_stream_discards_pending_review() {
        let (mut c, _doc, history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "pending", 0));
        c.on_event(&start("op-2", StreamMode::Insert));

        assert_eq!(c.state().phase, ReviewPhase::Closed);
        assert_eq!(history.lock().unwrap().snapshot_count(), 0);
    }

    #[test]
    fn accept_writes_exactly_the_passed_text() {
        let (mut c, doc, history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "Proposed.", 0));
        c.on_event(&end("op-1", false));

        // Reviewer edited the proposal before accepting.
        c.accept("Reviewer-edited text.");

        assert_eq!(doc.lock().unwrap().content(), "Reviewer-edited text.");
        assert_eq!(c.state().phase, ReviewPhase::Closed);

        let mut h = history.lock().unwrap();
        assert_eq!(h.snapshot_count(), 2);
        assert_eq!(h.undo().as_deref(), Some("Reviewer-edited text."));
        assert_eq!(h.undo().as_deref(), Some("Original content."));
    }

    #[test]
    fn accept_without_open_review_is_noop() {
        let (mut c, doc, history) = controller();
        c.accept("should not apply");
        assert_eq!(doc.lock().unwrap().content(), "Original content.");
        assert_eq!(history.lock().unwrap().snapshot_count(), 0);
    }

    #[test]
    fn accept_with_missing_document_closes_without_writing() {
        let history = Arc::new(Mutex::new(SnapshotHistory::new()));
        let mut c = DiffReviewController::new(None, Some(history.clone()));
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "text", 0));
        c.on_event(&end("op-1", false));

        c.accept("text");
        assert_eq!(c.state().phase, ReviewPhase::Closed);
        assert_eq!(history.lock().unwrap().snapshot_count(), 0);
    }

    #[test]
    fn reject_mutates_nothing() {
        let (mut c, doc, history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "proposal", 0));
        c.on_event(&end("op-1", false));

        c.reject();

        assert_eq!(c.state().phase, ReviewPhase::Closed);
        assert_eq!(doc.lock().unwrap().content(), "Original content.");
        assert_eq!(history.lock().unwrap().snapshot_count(), 0);
    }

    #[test]
    fn document_replaced_discards_pending_review() {
        let (mut c, _doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "proposal", 0));
        c.on_event(&end("op-1", false));

        c.on_event(&BusEvent::DocumentReplaced {
            html: "replacement".to_owned(),
        });
        assert_eq!(c.state().phase, ReviewPhase::Closed);
    }

    #[test]
    fn unified_diff_shows_removed_and_added_lines() {
        let (mut c, _doc, _history) = controller();
        c.on_event(&start("op-1", StreamMode::Diff));
        c.on_event(&token("op-1", "New line.", 0));
        c.on_event(&end("op-1", false));

        let diff = c.unified_diff().unwrap();
        assert!(diff.contains("-Original content."));
        assert!(diff.contains("+New line."));
    }

    #[test]
    fn unified_diff_is_none_when_closed() {
        let (c, _doc, _history) = controller();
        assert_eq!(c.unified_diff(), None);
    }
}
