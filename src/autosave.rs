//! Debounced, concurrency-safe auto-save controller.
//!
//! Content change notifications restart a debounce window; when it expires
//! the latest content is persisted through a [`SaveBackend`]. At most one
//! save is ever in flight. A change arriving mid-save is held in a
//! last-write-wins pending slot and saved immediately after the in-flight
//! save settles, so no edit is ever dropped and no two saves can interleave.
//!
//! The controller runs as a background tokio task; [`AutoSaveHandle`] is the
//! host-facing entry point and publishes [`SaveState`] through a watch
//! channel.

use crate::config::AutosaveConfig;
use crate::debounce::Debouncer;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Backend persistence function for document content.
///
/// Errors should carry a human-readable message; it is retained on the
/// [`SaveState::Error`] state for display.
#[async_trait::async_trait]
pub trait SaveBackend: Send + Sync {
    async fn save(&self, document_id: &str, content: &str) -> anyhow::Result<()>;
}

/// Observable persistence state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing pending or in flight.
    Idle,
    /// A save request is in flight.
    Saving,
    /// The last save succeeded; displayed briefly before returning to idle.
    Saved { at: DateTime<Utc> },
    /// The last save failed. Not retried automatically; the next debounce
    /// cycle or force-save retries.
    Error { message: String },
}

enum Command {
    ContentChanged(String),
    ForceSave,
}

/// Host-facing handle to a spawned auto-save controller.
#[derive(Debug, Clone)]
pub struct AutoSaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SaveState>,
}

impl AutoSaveHandle {
    /// Notify the controller that the document content changed. (Re)starts
    /// the debounce window; only the most recent content survives.
    pub fn notify_content_changed(&self, content: impl Into<String>) {
        let _ = self.tx.send(Command::ContentChanged(content.into()));
    }

    /// Persist any debounced-but-unsaved content immediately, cancelling the
    /// pending window. No-op when nothing is waiting.
    pub fn force_save(&self) {
        let _ = self.tx.send(Command::ForceSave);
    }

    /// Current save state.
    pub fn state(&self) -> SaveState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to save state changes.
    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.state_rx.clone()
    }
}

type InFlight = Pin<Box<dyn Future<Output = std::result::Result<(), String>> + Send>>;

/// Spawn the auto-save controller task.
///
/// A missing `document_id` or `config.enabled = false` yields an inert
/// handle: both entry points become no-ops and the state stays `Idle`.
pub fn spawn(
    config: AutosaveConfig,
    document_id: Option<String>,
    backend: Arc<dyn SaveBackend>,
    cancel: CancellationToken,
) -> AutoSaveHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SaveState::Idle);
    let handle = AutoSaveHandle { tx, state_rx };

    let Some(document_id) = document_id else {
        debug!("auto-save disabled: no document id");
        return handle;
    };
    if !config.enabled {
        debug!("auto-save disabled by config");
        return handle;
    }

    tokio::spawn(run(config, document_id, backend, rx, state_tx, cancel));
    handle
}

async fn run(
    config: AutosaveConfig,
    document_id: String,
    backend: Arc<dyn SaveBackend>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SaveState>,
    cancel: CancellationToken,
) {
    let mut debouncer: Debouncer<String> = Debouncer::new(Duration::from_millis(config.debounce_ms));
    let saved_display = Duration::from_millis(config.saved_display_ms);

    let mut in_flight: Option<InFlight> = None;
    let mut pending_content: Option<String> = None;
    let mut saved_reset: Option<Instant> = None;

    debug!(%document_id, debounce_ms = config.debounce_ms, "auto-save controller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("auto-save controller cancelled");
                break;
            }
            cmd = rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    Command::ContentChanged(content) => debouncer.push(content),
                    Command::ForceSave => {
                        if let Some(content) = debouncer.take() {
                            dispatch(
                                content,
                                &mut in_flight,
                                &mut pending_content,
                                &mut saved_reset,
                                &backend,
                                &document_id,
                                &state_tx,
                            );
                        }
                    }
                }
            }
            () = debouncer.expired(), if debouncer.is_pending() => {
                if let Some(content) = debouncer.take() {
                    dispatch(
                        content,
                        &mut in_flight,
                        &mut pending_content,
                        &mut saved_reset,
                        &backend,
                        &document_id,
                        &state_tx,
                    );
                }
            }
            result = settle(&mut in_flight), if in_flight.is_some() => {
                match result {
                    Ok(()) => {
                        info!(%document_id, "save succeeded");
                        let _ = state_tx.send(SaveState::Saved { at: Utc::now() });
                        saved_reset = Some(Instant::now() + saved_display);
                    }
                    Err(message) => {
                        warn!(%document_id, %message, "save failed");
                        let _ = state_tx.send(SaveState::Error { message });
                    }
                }
                // Content held during the save goes out immediately.
                if let Some(content) = pending_content.take() {
                    dispatch(
                        content,
                        &mut in_flight,
                        &mut pending_content,
                        &mut saved_reset,
                        &backend,
                        &document_id,
                        &state_tx,
                    );
                }
            }
            () = elapsed(&saved_reset), if saved_reset.is_some() => {
                saved_reset = None;
                let _ = state_tx.send(SaveState::Idle);
            }
        }
    }
}

/// Start a save, or queue the content if one is already in flight.
fn dispatch(
    content: String,
    in_flight: &mut Option<InFlight>,
    pending_content: &mut Option<String>,
    saved_reset: &mut Option<Instant>,
    backend: &Arc<dyn SaveBackend>,
    document_id: &str,
    state_tx: &watch::Sender<SaveState>,
) {
    if in_flight.is_some() {
        // Last write wins; an older queued edit is obsolete by definition.
        *pending_content = Some(content);
        return;
    }

    *saved_reset = None;
    let _ = state_tx.send(SaveState::Saving);

    let backend = backend.clone();
    let id = document_id.to_owned();
    *in_flight = Some(Box::pin(async move {
        backend
            .save(&id, &content)
            .await
            .map_err(|e| format!("{e:#}"))
    }));
}

/// Await the in-flight save, clearing the slot once it settles. Pending
/// forever when no save is running.
async fn settle(slot: &mut Option<InFlight>) -> std::result::Result<(), String> {
    match slot {
        Some(fut) => {
            let result = fut.as_mut().await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

/// Await an optional deadline; pending forever when unset.
async fn elapsed(deadline: &Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(*at).await,
        None => std::future::pending().await,
    }
}
