//! Token-stream consumer: writes non-diff generation output into the live
//! document as it arrives.
//!
//! At most one stream operation is active at a time, regardless of mode; a
//! newly observed start for a different id implicitly supersedes the current
//! one. Tokens carrying any other operation id are stale and dropped.
//! Diff-mode operations are tracked as active too (their tokens belong to
//! the review controller and are never written here), so replacements are
//! rejected while they run. History is snapshotted before the first write
//! and after the stream ends, cancelled or not, so partial content from a
//! cancelled run stays undoable.

use crate::bus::{BusEvent, MessageChannel, StreamMode};
use crate::document::{SharedDocument, SharedHistory};
use tracing::{debug, info, warn};

/// The stream operation currently writing into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStream {
    pub operation_id: String,
    pub mode: StreamMode,
    /// Tokens written so far, monotonically increasing while active.
    pub token_count: u64,
}

/// Consumes stream lifecycle events and mutates the document for non-diff
/// operations. Diff-mode operations are tracked but never written; their
/// tokens belong to the review controller.
pub struct StreamConsumer {
    document: Option<SharedDocument>,
    history: Option<SharedHistory>,
    channel: Option<MessageChannel>,
    active: Option<ActiveStream>,
    /// Operation id the user asked to cancel, awaiting acknowledgment.
    cancel_requested: Option<String>,
}

impl StreamConsumer {
    /// Create a consumer over the given handles. Any handle may be absent;
    /// writes against a missing handle silently no-op.
    pub fn new(
        document: Option<SharedDocument>,
        history: Option<SharedHistory>,
        channel: Option<MessageChannel>,
    ) -> Self {
        Self {
            document,
            history,
            channel,
            active: None,
            cancel_requested: None,
        }
    }

    /// The currently active operation, if any.
    pub fn active(&self) -> Option<&ActiveStream> {
        self.active.as_ref()
    }

    /// Whether a stream is currently writing into the document.
    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Request cancellation of the active stream.
    ///
    /// Advisory only: tokens already written are not retracted. The request
    /// is acknowledged over the message channel when the operation's
    /// `stream-end` arrives. Returns false when no stream is active.
    pub fn request_cancel(&mut self) -> bool {
        match &self.active {
            Some(active) => {
                info!(operation_id = %active.operation_id, "stream cancellation requested");
                self.cancel_requested = Some(active.operation_id.clone());
                true
            }
            None => false,
        }
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
                total_tokens,
            } => self.on_end(operation_id, *cancelled, *total_tokens),
            BusEvent::DocumentReplaced { html } => self.on_replaced(html),
            BusEvent::SelectionChanged { .. } => {}
        }
    }

    fn on_start(&mut self, operation_id: &str, mode: StreamMode) {
        if let Some(active) = &self.active
            && active.operation_id != operation_id
        {
            warn!(
                old = %active.operation_id,
                new = %operation_id,
                "new stream supersedes active operation"
            );
            // A cancel pending for the superseded operation can never be
            // acknowledged now.
            self.cancel_requested = None;
            if !active.mode.is_diff() {
                // Settle the superseded writer's insertion point.
                self.with_document(|doc| doc.end_insert());
            }
            self.active = None;
        }

        if mode.is_diff() {
            // Tokens accumulate in the review controller; the operation is
            // recorded here so stale tokens drop and replacements are
            // rejected while it runs.
            self.active = Some(ActiveStream {
                operation_id: operation_id.to_owned(),
                mode,
                token_count: 0,
            });
            debug!(%operation_id, "diff stream active, buffered elsewhere");
            return;
        }

        // Pre-write snapshot of whatever the document holds now.
        self.snapshot_current();
        self.with_document(|doc| doc.begin_insert());

        self.active = Some(ActiveStream {
            operation_id: operation_id.to_owned(),
            mode,
            token_count: 0,
        });
        debug!(%operation_id, ?mode, "stream started");
    }

    fn on_token(&mut self, operation_id: &str, token: &str) {
        let Some(active) = &mut self.active else {
            debug!(%operation_id, "token with no active stream, dropped");
            return;
        };
        if active.operation_id != operation_id {
            debug!(%operation_id, "token for stale operation, dropped");
            return;
        }
        active.token_count += 1;
        if active.mode.is_diff() {
            return;
        }

        if let Some(handle) = &self.document
            && let Ok(mut doc) = handle.lock()
        {
            doc.append_token(token);
        }
    }

    fn on_end(&mut self, operation_id: &str, cancelled: bool, total_tokens: u64) {
        let Some(active) = &self.active else {
            debug!(%operation_id, "stream-end with no active stream, ignored");
            return;
        };
        if active.operation_id != operation_id {
            debug!(%operation_id, "stream-end for stale operation, ignored");
            return;
        }

        if !active.mode.is_diff() {
            self.with_document(|doc| doc.end_insert());
            // Post-write snapshot, even for cancelled runs: partial content
            // is preserved and must stay undoable.
            self.snapshot_current();
        }
        self.active = None;
        info!(%operation_id, cancelled, total_tokens, "stream ended");

        if self.cancel_requested.as_deref() == Some(operation_id) {
            self.cancel_requested = None;
            if let Some(channel) = &self.channel {
                channel.emit(BusEvent::StreamEnd {
                    operation_id: operation_id.to_owned(),
                    cancelled: true,
                    total_tokens,
                });
            }
        }
    }

    fn on_replaced(&mut self, html: &str) {
        if let Some(active) = &self.active {
            warn!(
                operation_id = %active.operation_id,
                "document-replaced rejected while stream active"
            );
            return;
        }

        self.snapshot_current();
        self.with_document(|doc| doc.set_content(html));
        self.snapshot_current();
        debug!(len = html.len(), "document content replaced");
    }

    /// Push a history snapshot of the document's current content. No-op when
    /// either handle is absent.
    fn snapshot_current(&self) {
        let Some(doc_handle) = &self.document else {
            return;
        };
        let Some(history_handle) = &self.history else {
            return;
        };
        let Ok(doc) = doc_handle.lock() else { return };
        let content = doc.content();
        drop(doc);
        if let Ok(mut history) = history_handle.lock() {
            history.push_snapshot(&content);
        }
    }

    fn with_document(&self, f: impl FnOnce(&mut dyn crate::document::Document)) {
        if let Some(handle) = &self.document
            && let Ok(mut doc) = handle.lock()
        {
            f(&mut *doc);
        }
    }
}
