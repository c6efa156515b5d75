//! Debounced, deduplicating selection broadcast emitter.
//!
//! Native selection-change signals are noisy; the emitter debounces them,
//! reads the selection once per quiet period through a [`SelectionSource`],
//! and broadcasts change/clear events over the message channel. Identical
//! consecutive selections are suppressed; a transition to empty emits a
//! single "cleared" event.

use crate::bus::{BusEvent, CLEARED_CONTEXT, MessageChannel, SelectionRect};
use crate::config::SelectionConfig;
use crate::debounce::Debouncer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A selection read from the editing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRecord {
    pub text: String,
    pub start_offset: u64,
    pub end_offset: u64,
    /// Free-form context label distinguishing where the selection lives.
    pub context: String,
    /// Bounding rectangle in surface coordinates, when known.
    pub rect: Option<SelectionRect>,
}

/// Result of reading the current selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionCapture {
    /// The editing surface is detached or not mounted.
    Unavailable,
    /// The selection falls outside the designated editable region.
    OutsideEditor,
    /// Caret only, no selected text.
    Empty,
    /// An active selection.
    Active(SelectionRecord),
}

/// Reads the current selection from the editing surface.
pub trait SelectionSource: Send + Sync {
    fn capture(&self) -> SelectionCapture;
}

/// Host-facing handle to a spawned selection emitter.
#[derive(Debug, Clone)]
pub struct SelectionEmitterHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl SelectionEmitterHandle {
    /// Mark a native selection-change signal. (Re)starts the debounce
    /// window; the selection is read once when it expires.
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }
}

/// Spawn the selection emitter task.
///
/// A `None` channel leaves the emitter inert (signals are absorbed, nothing
/// is emitted). Cancelling the token tears down the task, its pending timer,
/// and the dedup cache.
pub fn spawn(
    config: SelectionConfig,
    source: Arc<dyn SelectionSource>,
    channel: Option<MessageChannel>,
    cancel: CancellationToken,
) -> SelectionEmitterHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(config, source, channel, rx, cancel));
    SelectionEmitterHandle { tx }
}

async fn run(
    config: SelectionConfig,
    source: Arc<dyn SelectionSource>,
    channel: Option<MessageChannel>,
    mut rx: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
) {
    let mut debouncer: Debouncer<()> = Debouncer::new(Duration::from_millis(config.debounce_ms));
    // Last emitted selection text, used to suppress duplicates and to decide
    // whether an empty selection warrants a "cleared" event.
    let mut last_emitted: Option<String> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("selection emitter cancelled");
                break;
            }
            signal = rx.recv() => {
                if signal.is_none() {
                    break;
                }
                debouncer.push(());
            }
            () = debouncer.expired(), if debouncer.is_pending() => {
                debouncer.take();
                broadcast(&config, source.as_ref(), channel.as_ref(), &mut last_emitted);
            }
        }
    }
}

/// Read the selection once and emit a change/clear event if warranted.
fn broadcast(
    config: &SelectionConfig,
    source: &dyn SelectionSource,
    channel: Option<&MessageChannel>,
    last_emitted: &mut Option<String>,
) {
    let Some(channel) = channel else {
        return;
    };

    match source.capture() {
        SelectionCapture::Unavailable | SelectionCapture::OutsideEditor => {}
        SelectionCapture::Empty => {
            if last_emitted.take().is_some() {
                channel.emit(BusEvent::SelectionChanged {
                    text: String::new(),
                    start_offset: 0,
                    end_offset: 0,
                    context: CLEARED_CONTEXT.to_owned(),
                    rect: None,
                    surface: config.surface.clone(),
                });
                debug!("selection cleared");
            }
        }
        SelectionCapture::Active(record) => {
            if last_emitted.as_deref() == Some(record.text.as_str()) {
                // Same text as last broadcast; suppress the duplicate.
                return;
            }
            *last_emitted = Some(record.text.clone());
            channel.emit(BusEvent::SelectionChanged {
                text: record.text,
                start_offset: record.start_offset,
                end_offset: record.end_offset,
                context: record.context,
                rect: record.rect,
                surface: config.surface.clone(),
            });
        }
    }
}
