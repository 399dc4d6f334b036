//! # Event Bus System
//!
//! Broadcasts player lifecycle notifications to any number of listeners using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The observable `PlaybackState` snapshot published by a session tells a UI
//! *what* the player looks like right now. The event bus complements it with
//! *what happened*: every transition (preparing, ready, error, retry
//! scheduled, backend swapped, surface lost) is emitted once as a
//! [`CoreEvent`]. Analytics, on-screen diagnostics and host listeners
//! subscribe independently.
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Session actor    ├──────────>│           ├──────────────>│ UI overlay │
//! └──────────────────┘           │ EventBus  │               └────────────┘
//! ┌──────────────────┐   emit    │ (broadcast│   subscribe   ┌────────────┐
//! │ Surface binding  ├──────────>│  channel) ├──────────────>│ Analytics  │
//! └──────────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Ready {
//!     session_id: "s-1".to_string(),
//!     backend: "software_tolerant".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(sub.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. Non-fatal; continue receiving.
//! - **`RecvError::Closed`**: the session was released and every sender
//!   dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session playback transitions
    Playback(PlaybackEvent),
    /// Backend hot-swap progress
    Backend(BackendSwitchEvent),
    /// Render target lifecycle
    Surface(SurfaceEvent),
}

impl CoreEvent {
    /// Short human readable summary, suitable for diagnostics overlays.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Backend(e) => e.description(),
            CoreEvent::Surface(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Backend(BackendSwitchEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Interrupted { .. }) => EventSeverity::Warning,
            CoreEvent::Backend(BackendSwitchEvent::FallbackTriggered { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::Ready { .. }) => EventSeverity::Info,
            CoreEvent::Backend(BackendSwitchEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Session the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.session_id(),
            CoreEvent::Backend(e) => e.session_id(),
            CoreEvent::Surface(e) => e.session_id(),
        }
    }
}

/// Event severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Session playback transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A source is being opened on the active backend.
    Preparing {
        session_id: String,
        /// Redacted source locator
        source: String,
        backend: String,
    },
    /// The backend finished opening the source.
    Prepared { session_id: String },
    /// First frame rendered (or source ready, depending on backend).
    Ready { session_id: String, backend: String },
    Started { session_id: String },
    Paused { session_id: String },
    Stopped { session_id: String },
    /// Buffering started (`true`) or ended (`false`).
    Buffering {
        session_id: String,
        is_buffering: bool,
    },
    /// Error surfaced to the user after policy decided not to recover.
    Error {
        session_id: String,
        /// Display form, e.g. `Timeout(-110)`
        message: String,
        category: String,
        native_code: Option<i32>,
    },
    /// A recoverable failure will be retried after `delay_ms`.
    RetryScheduled {
        session_id: String,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
    },
    /// The backend was interrupted by the platform.
    Interrupted { session_id: String },
    /// Session torn down. No further events follow.
    Released { session_id: String },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Preparing { .. } => "Preparing source",
            PlaybackEvent::Prepared { .. } => "Source prepared",
            PlaybackEvent::Ready { .. } => "Playback ready",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Buffering { .. } => "Buffering state changed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::RetryScheduled { .. } => "Retry scheduled",
            PlaybackEvent::Interrupted { .. } => "Playback interrupted",
            PlaybackEvent::Released { .. } => "Session released",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            PlaybackEvent::Preparing { session_id, .. }
            | PlaybackEvent::Prepared { session_id }
            | PlaybackEvent::Ready { session_id, .. }
            | PlaybackEvent::Started { session_id }
            | PlaybackEvent::Paused { session_id }
            | PlaybackEvent::Stopped { session_id }
            | PlaybackEvent::Buffering { session_id, .. }
            | PlaybackEvent::Error { session_id, .. }
            | PlaybackEvent::RetryScheduled { session_id, .. }
            | PlaybackEvent::Interrupted { session_id }
            | PlaybackEvent::Released { session_id } => session_id,
        }
    }
}

// ============================================================================
// Backend Switch Events
// ============================================================================

/// Progress of a backend hot-swap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BackendSwitchEvent {
    Started {
        session_id: String,
        from: String,
        to: String,
    },
    Completed {
        session_id: String,
        backend: String,
        resumed_at_ms: i64,
    },
    Failed {
        session_id: String,
        backend: String,
        message: String,
    },
    /// A backend fault triggered an automatic switch to the fallback.
    FallbackTriggered {
        session_id: String,
        from: String,
        to: String,
    },
}

impl BackendSwitchEvent {
    fn description(&self) -> &str {
        match self {
            BackendSwitchEvent::Started { .. } => "Backend switch started",
            BackendSwitchEvent::Completed { .. } => "Backend switch completed",
            BackendSwitchEvent::Failed { .. } => "Backend switch failed",
            BackendSwitchEvent::FallbackTriggered { .. } => "Falling back to alternate backend",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            BackendSwitchEvent::Started { session_id, .. }
            | BackendSwitchEvent::Completed { session_id, .. }
            | BackendSwitchEvent::Failed { session_id, .. }
            | BackendSwitchEvent::FallbackTriggered { session_id, .. } => session_id,
        }
    }
}

// ============================================================================
// Surface Events
// ============================================================================

/// Render target lifecycle as seen by the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SurfaceEvent {
    Bound { session_id: String, surface_id: u64 },
    Destroyed { session_id: String, surface_id: u64 },
}

impl SurfaceEvent {
    fn description(&self) -> &str {
        match self {
            SurfaceEvent::Bound { .. } => "Render target bound",
            SurfaceEvent::Destroyed { .. } => "Render target destroyed",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            SurfaceEvent::Bound { session_id, .. } | SurfaceEvent::Destroyed { session_id, .. } => {
                session_id
            }
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emits an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is listening. Emitters are free to ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscription to an [`EventBus`], optionally narrowed by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let switches = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Backend(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`. Replaces any earlier filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events belonging to `session_id`.
    pub fn for_session(self, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        self.filter(move |event| event.session_id() == session_id)
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next matching event. `Lagged` reports events dropped because this
    /// subscriber fell behind; the stream stays usable afterwards.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv). `None` when nothing matching is
    /// queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.accepts(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
