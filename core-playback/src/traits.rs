//! # Backend Adapter Contract
//!
//! Every decoder/renderer backend sits behind [`BackendAdapter`]. The session
//! controller drives adapters exclusively through this trait and learns about
//! asynchronous outcomes through the [`EventSink`] handed to
//! [`BackendAdapter::subscribe`].
//!
//! ## Event ordering
//!
//! - `Prepared` always precedes the first `Ready` of a `prepare` call.
//! - `Error` after `Ready` means playback degraded, not that prepare failed.
//! - `IsPlayingChanged` is emitted only on actual transitions.
//!
//! ## Threading
//!
//! Commands are synchronous and must return promptly. Events may be emitted
//! from any thread; the sink marshals them onto the session actor. Once a
//! sink has been severed, nothing emitted through it is ever delivered.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::RenderTarget;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};

// ============================================================================
// Backend selection
// ============================================================================

/// Selects which adapter variant a session instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform hardware decode. Lower CPU, stricter format support.
    HardwarePipeline,
    /// Software decode tuned for lossy, irregular live streams.
    SoftwareTolerant,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::HardwarePipeline, BackendKind::SoftwareTolerant];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::HardwarePipeline => "hardware_pipeline",
            BackendKind::SoftwareTolerant => "software_tolerant",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hardware_pipeline" | "hardware" => Ok(BackendKind::HardwarePipeline),
            "software_tolerant" | "software" => Ok(BackendKind::SoftwareTolerant),
            other => Err(PlaybackError::UnsupportedBackend(other.to_string())),
        }
    }
}

// ============================================================================
// Source
// ============================================================================

/// Opaque stream locator (URL or file path). Immutable and cheap to clone.
///
/// `Debug` and `Serialize` print the redacted form so credentials embedded in
/// stream URLs never reach logs or snapshots.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PlaybackSource(Arc<str>);

impl PlaybackSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self(Arc::from(source.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redacted form suitable for logs.
    pub fn redacted(&self) -> String {
        core_runtime::logging::redact_source_url(&self.0)
    }

    /// Cheap syntactic check performed before handing the source to an engine.
    ///
    /// Rejects empty locators, embedded whitespace or control characters and
    /// URLs whose scheme is empty or not `[A-Za-z][A-Za-z0-9+.-]*`.
    pub fn is_well_formed(&self) -> bool {
        let s = self.as_str();
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return false;
        }
        match s.find("://") {
            Some(idx) => {
                let scheme = &s[..idx];
                let mut chars = scheme.chars();
                let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
                starts_alpha
                    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
                    && s.len() > idx + 3
            }
            None => true,
        }
    }
}

impl From<&str> for PlaybackSource {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlaybackSource {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for PlaybackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlaybackSource").field(&self.redacted()).finish()
    }
}

impl Serialize for PlaybackSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.redacted())
    }
}

// ============================================================================
// Backend errors
// ============================================================================

/// Classification of a failure reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendErrorKind {
    /// Open or read timed out.
    Timeout,
    /// Connection reset or refused by the peer.
    NetworkReset,
    /// Generic I/O failure while reading the stream.
    Io,
    /// Container or codec not supported by this backend.
    UnsupportedFormat,
    /// The locator or the stream itself is malformed.
    MalformedSource,
    /// The server permanently refused the source (403, 404).
    SourceRejected,
    /// The engine itself crashed or wedged.
    BackendFault,
    Unknown,
}

impl BackendErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendErrorKind::Timeout => "Timeout",
            BackendErrorKind::NetworkReset => "NetworkReset",
            BackendErrorKind::Io => "Io",
            BackendErrorKind::UnsupportedFormat => "UnsupportedFormat",
            BackendErrorKind::MalformedSource => "MalformedSource",
            BackendErrorKind::SourceRejected => "SourceRejected",
            BackendErrorKind::BackendFault => "BackendFault",
            BackendErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by a backend through [`BackendEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    /// Engine-specific code, zero when the engine gave none.
    pub native_code: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, native_code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            native_code,
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}): {}", self.kind, self.native_code, self.message)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Asynchronous notifications emitted by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Prepared,
    Ready,
    Error(BackendError),
    Buffering(bool),
    IsPlayingChanged(bool),
    DurationChanged(i64),
    CurrentPositionChanged(i64),
    Resolution { width: i32, height: i32 },
    Metadata(HashMap<String, String>),
    Interrupt,
}

/// An event stamped with the generation of the adapter that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: BackendEvent,
}

/// Delivery handle given to an adapter on subscription.
///
/// Clones share one liveness flag: [`EventSink::sever`] on any clone stops
/// delivery through all of them immediately.
#[derive(Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
    active: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self {
            generation,
            tx,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Sink plus the receiving end, for driving adapters outside a session.
    pub fn channel(generation: u64) -> (Self, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(generation, tx), rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event. Returns `false` when the sink is severed or the
    /// session is gone.
    pub fn emit(&self, event: BackendEvent) -> bool {
        if !self.is_active() {
            return false;
        }
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn sever(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

// ============================================================================
// Adapter traits
// ============================================================================

/// Uniform capability contract over one decode/render engine.
///
/// All commands are non-blocking. Failures are reported as
/// [`BackendEvent::Error`] through the subscribed sink, never returned.
pub trait BackendAdapter: Send {
    fn kind(&self) -> BackendKind;

    /// Route future events to `sink`, replacing any previous subscription.
    fn subscribe(&mut self, sink: EventSink);

    /// Sever the current subscription. No event is delivered afterwards.
    fn unsubscribe(&mut self);

    /// Reset the decode pipeline, bind the current render target and begin
    /// opening `source`. Outcome arrives as `Prepared`/`Ready` or `Error`.
    fn prepare(&mut self, source: &PlaybackSource);

    /// Idempotent. Requested before `Prepared`, playback starts once prepared.
    fn play(&mut self);

    /// Idempotent.
    fn pause(&mut self);

    /// Ignored, without error, when the stream is not seekable (duration <= 0).
    fn seek_to(&mut self, position_ms: i64);

    /// Halt decode and cancel position polling. The adapter stays reusable.
    fn stop(&mut self);

    /// Bind decode output to `target`. Safe before, during and after `prepare`.
    fn set_render_target(&mut self, target: &RenderTarget);

    /// Free every native resource. Terminal.
    fn release(&mut self);
}

/// Builds adapters for a session.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, kind: BackendKind, config: &PlayerConfig) -> Result<Box<dyn BackendAdapter>>;
}
