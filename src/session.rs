//! Document session: composes the four controllers over one shared document.
//!
//! A router task subscribes to the session's [`MessageChannel`] and
//! dispatches each event to the diff review controller and the stream
//! consumer (mutually exclusive per operation by mode). Review decisions and
//! stream cancellation arrive as commands so the router stays the single
//! owner of both controllers; everything visible outward is a watch-published
//! projection.

use crate::autosave::{self, AutoSaveHandle, SaveBackend};
use crate::bus::{BusEvent, MessageChannel};
use crate::config::WorkspaceConfig;
use crate::document::{SharedDocument, SharedHistory};
use crate::review::{DiffReviewController, DiffReviewState};
use crate::selection::{self, SelectionEmitterHandle, SelectionSource};
use crate::stream::{ActiveStream, StreamConsumer};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum RouterCommand {
    AcceptDiff { final_text: String },
    RejectDiff,
    CancelActiveStream,
}

/// One document workspace session: stream consumption, diff review,
/// auto-save, and selection broadcast coordinated over a shared document.
pub struct DocumentSession {
    channel: MessageChannel,
    router_tx: mpsc::UnboundedSender<RouterCommand>,
    review_rx: watch::Receiver<DiffReviewState>,
    stream_rx: watch::Receiver<Option<ActiveStream>>,
    autosave: AutoSaveHandle,
    selection: SelectionEmitterHandle,
    cancel: CancellationToken,
    router: JoinHandle<()>,
}

impl DocumentSession {
    /// Spawn a session over the given handles and collaborators.
    ///
    /// `document` / `history` may be absent (headless host); writes then
    /// silently no-op. A `None` `document_id` disables auto-save.
    pub fn new(
        config: WorkspaceConfig,
        document: Option<SharedDocument>,
        history: Option<SharedHistory>,
        channel: MessageChannel,
        document_id: Option<String>,
        save_backend: Arc<dyn SaveBackend>,
        selection_source: Arc<dyn SelectionSource>,
    ) -> Self {
        let cancel = CancellationToken::new();

        let consumer =
            StreamConsumer::new(document.clone(), history.clone(), Some(channel.clone()));
        let review = DiffReviewController::new(document, history);

        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (review_tx, review_rx) = watch::channel(review.state().clone());
        let (stream_tx, stream_rx) = watch::channel(None);

        let bus_rx = channel.subscribe();
        let router = tokio::spawn(route(
            consumer,
            review,
            bus_rx,
            router_rx,
            review_tx,
            stream_tx,
            cancel.clone(),
        ));

        let autosave = autosave::spawn(
            config.autosave.clone(),
            document_id,
            save_backend,
            cancel.child_token(),
        );
        let selection = selection::spawn(
            config.selection.clone(),
            selection_source,
            Some(channel.clone()),
            cancel.child_token(),
        );

        Self {
            channel,
            router_tx,
            review_rx,
            stream_rx,
            autosave,
            selection,
            cancel,
            router,
        }
    }

    /// The session's message channel.
    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    /// Auto-save entry points (`notify_content_changed` / `force_save`).
    pub fn autosave(&self) -> &AutoSaveHandle {
        &self.autosave
    }

    /// Selection broadcast entry point (`notify`).
    pub fn selection(&self) -> &SelectionEmitterHandle {
        &self.selection
    }

    /// Current diff review projection.
    pub fn review_state(&self) -> DiffReviewState {
        self.review_rx.borrow().clone()
    }

    /// Subscribe to diff review state changes.
    pub fn subscribe_review(&self) -> watch::Receiver<DiffReviewState> {
        self.review_rx.clone()
    }

    /// The stream operation currently writing into the document, if any.
    pub fn active_stream(&self) -> Option<ActiveStream> {
        self.stream_rx.borrow().clone()
    }

    /// Subscribe to active stream changes.
    pub fn subscribe_stream(&self) -> watch::Receiver<Option<ActiveStream>> {
        self.stream_rx.clone()
    }

    /// Accept the open diff review, applying exactly `final_text`.
    pub fn accept_diff(&self, final_text: impl Into<String>) {
        let _ = self.router_tx.send(RouterCommand::AcceptDiff {
            final_text: final_text.into(),
        });
    }

    /// Reject the pending diff review without touching the document.
    pub fn reject_diff(&self) {
        let _ = self.router_tx.send(RouterCommand::RejectDiff);
    }

    /// Request advisory cancellation of the active stream.
    pub fn request_cancel(&self) {
        let _ = self.router_tx.send(RouterCommand::CancelActiveStream);
    }

    /// Cancel all session tasks and wait for the router to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.router.await;
    }
}

async fn route(
    mut consumer: StreamConsumer,
    mut review: DiffReviewController,
    mut bus_rx: broadcast::Receiver<BusEvent>,
    mut command_rx: mpsc::UnboundedReceiver<RouterCommand>,
    review_tx: watch::Sender<DiffReviewState>,
    stream_tx: watch::Sender<Option<ActiveStream>>,
    cancel: CancellationToken,
) {
    debug!("session router started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("session router cancelled");
                break;
            }
            event = bus_rx.recv() => match event {
                Ok(event) => {
                    // Review first: a superseding start must discard the
                    // pending proposal before the consumer begins writing.
                    // Exception: a replacement arriving while a stream is
                    // active is rejected outright and must not reach the
                    // review controller, whose captured original stays valid.
                    let rejected_replacement = matches!(event, BusEvent::DocumentReplaced { .. })
                        && consumer.is_streaming();
                    if !rejected_replacement {
                        review.on_event(&event);
                    }
                    consumer.on_event(&event);
                    publish(&review, &consumer, &review_tx, &stream_tx);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session router lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    RouterCommand::AcceptDiff { final_text } => review.accept(&final_text),
                    RouterCommand::RejectDiff => review.reject(),
                    RouterCommand::CancelActiveStream => {
                        consumer.request_cancel();
                    }
                }
                publish(&review, &consumer, &review_tx, &stream_tx);
            }
        }
    }
}

fn publish(
    review: &DiffReviewController,
    consumer: &StreamConsumer,
    review_tx: &watch::Sender<DiffReviewState>,
    stream_tx: &watch::Sender<Option<ActiveStream>>,
) {
    review_tx.send_if_modified(|state| {
        if *state == *review.state() {
            false
        } else {
            *state = review.state().clone();
            true
        }
    });
    stream_tx.send_if_modified(|state| {
        let current = consumer.active().cloned();
        if *state == current {
            false
        } else {
            *state = current;
            true
        }
    });
}
