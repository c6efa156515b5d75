//! Quill: streaming and review coordination core for a document workspace.
//!
//! Content arrives incrementally from an external generation process while a
//! human may simultaneously edit the same document. This crate coordinates
//! those overlapping, asynchronous, cancellable operations without losing
//! edits, double-saving, or corrupting the undo history:
//!
//! - **Stream consumer**: writes non-diff generation output into the live
//!   document as tokens arrive, snapshotting history around each run
//! - **Diff review**: buffers diff-mode streams separately and arbitrates
//!   Accept/Reject; the document is untouched until a human decides
//! - **Auto-save**: debounced persistence with at-most-one-in-flight
//!   discipline and a last-write-wins pending slot
//! - **Selection broadcast**: debounced, deduplicating emission of selection
//!   change/clear events over the session's message channel
//!
//! The controllers are wired together by [`session::DocumentSession`] over a
//! typed [`bus::MessageChannel`]. The rendering engine, persistence backend,
//! and selection surface stay external behind the [`document::Document`],
//! [`autosave::SaveBackend`], and [`selection::SelectionSource`] contracts.

pub mod autosave;
pub mod bus;
pub mod config;
pub mod debounce;
pub mod document;
pub mod error;
pub mod review;
pub mod selection;
pub mod session;
pub mod stream;

pub use autosave::{AutoSaveHandle, SaveBackend, SaveState};
pub use bus::{BusEvent, MessageChannel, SelectionRect, StreamMode};
pub use config::{AutosaveConfig, SelectionConfig, WorkspaceConfig};
pub use debounce::Debouncer;
pub use document::{Document, History, SharedDocument, SharedHistory};
pub use error::{QuillError, Result};
pub use review::{DiffReviewController, DiffReviewState, ReviewPhase};
pub use selection::{SelectionCapture, SelectionEmitterHandle, SelectionRecord, SelectionSource};
pub use session::DocumentSession;
pub use stream::{ActiveStream, StreamConsumer};
