//! Editable document and history handle contracts.
//!
//! The rendering engine behind the document is external; the coordination
//! core only consumes the minimal read/write contract below. In-memory
//! implementations are provided for hosts without a live surface and for
//! tests.

use std::sync::{Arc, Mutex};

/// Minimal read/write contract of the editable document surface.
pub trait Document: Send {
    /// Current full content of the document.
    fn content(&self) -> String;
    /// Replace the full content.
    fn set_content(&mut self, text: &str);
    /// Prepare the surface for incremental insertion.
    fn begin_insert(&mut self);
    /// Append one streamed token at the insertion point.
    fn append_token(&mut self, token: &str);
    /// Finish the incremental insertion started by [`begin_insert`](Self::begin_insert).
    fn end_insert(&mut self);
}

/// Undo/redo contract of the host history stack.
///
/// Snapshots carry the content explicitly so the stack needs no back
/// reference to the document handle.
pub trait History: Send {
    /// Record a snapshot of the given content.
    fn push_snapshot(&mut self, content: &str);
    /// Step back; returns the restored content if any.
    fn undo(&mut self) -> Option<String>;
    /// Step forward; returns the restored content if any.
    fn redo(&mut self) -> Option<String>;
    fn can_undo(&self) -> bool;
    fn can_redo(&self) -> bool;
}

/// Shared handle to a document surface. `None` at a call site means the
/// surface is detached and writes silently no-op.
pub type SharedDocument = Arc<Mutex<dyn Document>>;

/// Shared handle to a history stack.
pub type SharedHistory = Arc<Mutex<dyn History>>;

/// Plain string-backed document for tests and headless hosts.
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    buffer: String,
    inserting: bool,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial content.
    pub fn with_content(text: impl Into<String>) -> Self {
        Self {
            buffer: text.into(),
            inserting: false,
        }
    }

    /// Wrap in a [`SharedDocument`] handle.
    pub fn shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }
}

impl Document for InMemoryDocument {
    fn content(&self) -> String {
        self.buffer.clone()
    }

    fn set_content(&mut self, text: &str) {
        self.buffer.clear();
        self.buffer.push_str(text);
    }

    fn begin_insert(&mut self) {
        self.inserting = true;
    }

    fn append_token(&mut self, token: &str) {
        self.buffer.push_str(token);
    }

    fn end_insert(&mut self) {
        self.inserting = false;
    }
}

/// Snapshot-stack history for tests and headless hosts.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    undo: Vec<String>,
    redo: Vec<String>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a [`SharedHistory`] handle.
    pub fn shared(self) -> SharedHistory {
        Arc::new(Mutex::new(self))
    }

    /// Number of recorded undo snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.undo.len()
    }
}

impl History for SnapshotHistory {
    fn push_snapshot(&mut self, content: &str) {
        self.undo.push(content.to_owned());
        self.redo.clear();
    }

    fn undo(&mut self) -> Option<String> {
        let snapshot = self.undo.pop()?;
        self.redo.push(snapshot.clone());
        Some(snapshot)
    }

    fn redo(&mut self) -> Option<String> {
        let snapshot = self.redo.pop()?;
        self.undo.push(snapshot.clone());
        Some(snapshot)
    }

    fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn in_memory_document_appends_tokens() {
        let mut doc = InMemoryDocument::new();
        doc.begin_insert();
        doc.append_token("Hello");
        doc.append_token(", world");
        doc.end_insert();
        assert_eq!(doc.content(), "Hello, world");
    }

    #[test]
    fn set_content_replaces_everything() {
        let mut doc = InMemoryDocument::with_content("old");
        doc.set_content("new");
        assert_eq!(doc.content(), "new");
    }

    #[test]
    fn history_undo_redo_round_trip() {
        let mut history = SnapshotHistory::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history.push_snapshot("v1");
        history.push_snapshot("v2");
        assert!(history.can_undo());

        assert_eq!(history.undo().as_deref(), Some("v2"));
        assert!(history.can_redo());
        assert_eq!(history.redo().as_deref(), Some("v2"));
    }

    #[test]
    fn push_snapshot_clears_redo() {
        let mut history = SnapshotHistory::new();
        history.push_snapshot("v1");
        history.undo();
        assert!(history.can_redo());

        history.push_snapshot("v2");
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_on_empty_history_is_none() {
        let mut history = SnapshotHistory::new();
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), None);
    }
}
