//! Typed publish/subscribe message channel scoped to a session.
//!
//! The channel carries a closed, versioned event schema ([`BusEvent`]) rather
//! than ad hoc payload shapes. Delivery uses a tokio broadcast channel; a
//! channel with no subscribers behaves as disconnected and emits are silent
//! no-ops.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Version of the wire event schema. Bump when a payload shape changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Broadcast buffer size. Slow subscribers past this lag are resubscribed.
const CHANNEL_CAPACITY: usize = 256;

/// Stream operation classification carried on `stream-start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamMode {
    /// Tokens are inserted at the target position as they arrive.
    Insert,
    /// Tokens replace existing content as they arrive.
    Replace,
    /// Tokens are buffered for human review, never written live.
    Diff,
}

impl StreamMode {
    /// Parse a wire `operation_type` string. Unknown types yield `None`
    /// and the carrying event must be dropped, not defaulted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(Self::Insert),
            "replace" => Some(Self::Replace),
            "diff" => Some(Self::Diff),
            _ => None,
        }
    }

    /// Whether this mode is routed to the diff review controller.
    pub fn is_diff(self) -> bool {
        matches!(self, Self::Diff)
    }
}

/// Bounding rectangle of a selection, in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Events delivered over the message channel.
///
/// The `event` tag matches the wire event names used by the hosting surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BusEvent {
    /// A generation run began.
    StreamStart {
        operation_id: String,
        /// Character offset the producer targets, if any.
        target_position: Option<u64>,
        #[serde(rename = "operation_type")]
        mode: StreamMode,
    },
    /// One token of an active generation run.
    StreamToken {
        operation_id: String,
        token: String,
        /// Zero-based arrival index assigned by the producer.
        index: u64,
    },
    /// A generation run ended (possibly cancelled).
    StreamEnd {
        operation_id: String,
        cancelled: bool,
        total_tokens: u64,
    },
    /// Full-content replacement of the document.
    DocumentReplaced { html: String },
    /// Selection changed (or cleared, distinguished by `context`).
    SelectionChanged {
        text: String,
        start_offset: u64,
        end_offset: u64,
        /// Free-form context label; [`CLEARED_CONTEXT`] marks a clear.
        context: String,
        rect: Option<SelectionRect>,
        /// Originating surface label.
        surface: String,
    },
}

/// `context` value carried on a selection-cleared emission.
pub const CLEARED_CONTEXT: &str = "cleared";

/// A typed pub/sub bus scoped to one session.
///
/// Cheap to clone; all clones share the same underlying broadcast channel.
#[derive(Debug, Clone)]
pub struct MessageChannel {
    session_id: String,
    tx: broadcast::Sender<BusEvent>,
}

impl MessageChannel {
    /// Create a channel for the given session.
    pub fn new(session_id: impl Into<String>) -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            session_id: session_id.into(),
            tx,
        }
    }

    /// The owning session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers reached; zero means the channel is
    /// effectively disconnected and the event was dropped (not an error).
    pub fn emit(&self, event: BusEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

/// Mint a fresh opaque operation id (producer side).
pub fn new_operation_id() -> String {
    format!("op-{}", uuid::Uuid::new_v4())
}
