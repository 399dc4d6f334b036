//! Recording test doubles shared by the session tests.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::{NativeSurface, RenderTarget};
use core_playback::{
    AdapterFactory, BackendAdapter, BackendError, BackendErrorKind, BackendEvent, BackendKind,
    EventSink, PlaybackError, PlaybackSource, PlayerConfig, Result,
};
use core_runtime::events::{CoreEvent, EventStream};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Journal id used for calls made by the host (surface releases).
pub const HOST: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe,
    Unsubscribe,
    Prepare(String),
    Play,
    Pause,
    SeekTo(i64),
    Stop,
    SetRenderTarget(Option<u64>),
    Release,
    SurfaceReleased(u64),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub adapter: usize,
    pub call: Call,
    pub at: Instant,
}

/// Ordered record of every call made to any adapter or surface.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn record(&self, adapter: usize, call: Call) {
        self.0.lock().push(Entry {
            adapter,
            call,
            at: Instant::now(),
        });
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().clone()
    }

    pub fn all(&self) -> Vec<(usize, Call)> {
        self.0
            .lock()
            .iter()
            .map(|e| (e.adapter, e.call.clone()))
            .collect()
    }

    pub fn calls(&self, adapter: usize) -> Vec<Call> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.adapter == adapter)
            .map(|e| e.call.clone())
            .collect()
    }

    pub fn prepare_times(&self) -> Vec<Instant> {
        self.0
            .lock()
            .iter()
            .filter(|e| matches!(e.call, Call::Prepare(_)))
            .map(|e| e.at)
            .collect()
    }

    pub fn position(&self, adapter: usize, call: &Call) -> Option<usize> {
        self.0
            .lock()
            .iter()
            .position(|e| e.adapter == adapter && &e.call == call)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

// ============================================================================
// Adapter double
// ============================================================================

/// Adapter that records commands and answers `prepare` from a script.
///
/// Each `prepare` pops the next scripted outcome; once the script is empty it
/// reports `Prepared` then `Ready`. `play` has no effect until an outcome
/// containing `Prepared` was emitted. `play`/`pause`/`stop` emit
/// `IsPlayingChanged` only on transitions.
pub struct RecordingAdapter {
    id: usize,
    kind: BackendKind,
    shared: Arc<FactoryShared>,
    sink: Option<EventSink>,
    prepared: bool,
    playing: bool,
    leaky: bool,
}

impl RecordingAdapter {
    fn record(&self, call: Call) {
        self.shared.journal.record(self.id, call);
    }

    fn emit(&self, event: BackendEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(BackendEvent::IsPlayingChanged(playing));
        }
    }
}

impl BackendAdapter for RecordingAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn subscribe(&mut self, sink: EventSink) {
        self.record(Call::Subscribe);
        self.shared.sinks.lock().push((self.id, sink.clone()));
        self.sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.record(Call::Unsubscribe);
        if let Some(sink) = self.sink.take() {
            if !self.leaky {
                sink.sever();
            }
        }
    }

    fn prepare(&mut self, source: &PlaybackSource) {
        self.record(Call::Prepare(source.as_str().to_string()));
        self.playing = false;
        let outcome = self
            .shared
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| vec![BackendEvent::Prepared, BackendEvent::Ready]);
        self.prepared = outcome.contains(&BackendEvent::Prepared);
        for event in outcome {
            self.emit(event);
        }
    }

    fn play(&mut self) {
        self.record(Call::Play);
        if self.prepared {
            self.set_playing(true);
        }
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
        self.set_playing(false);
    }

    fn seek_to(&mut self, position_ms: i64) {
        self.record(Call::SeekTo(position_ms));
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
        self.prepared = false;
        self.set_playing(false);
    }

    fn set_render_target(&mut self, target: &RenderTarget) {
        self.record(Call::SetRenderTarget(target.id()));
    }

    fn release(&mut self) {
        self.record(Call::Release);
        self.sink = None;
    }
}

// ============================================================================
// Factory double
// ============================================================================

#[derive(Default)]
struct FactoryShared {
    journal: Journal,
    script: Mutex<VecDeque<Vec<BackendEvent>>>,
    sinks: Mutex<Vec<(usize, EventSink)>>,
}

#[derive(Default)]
pub struct RecordingFactory {
    shared: Arc<FactoryShared>,
    next_id: AtomicUsize,
    failing: Mutex<HashSet<BackendKind>>,
    leaky: AtomicBool,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn journal(&self) -> &Journal {
        &self.shared.journal
    }

    /// Events the next `prepare` (on any adapter) will emit.
    pub fn script_prepare(&self, events: Vec<BackendEvent>) {
        self.shared.script.lock().push_back(events);
    }

    pub fn fail_kind(&self, kind: BackendKind) {
        self.failing.lock().insert(kind);
    }

    /// Adapters created from now on keep delivering after `unsubscribe`.
    pub fn leaky(&self) {
        self.leaky.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Emit `event` through the sink adapter `id` was last subscribed with.
    pub fn emit(&self, id: usize, event: BackendEvent) -> bool {
        let sink = self
            .shared
            .sinks
            .lock()
            .iter()
            .rev()
            .find(|(adapter, _)| *adapter == id)
            .map(|(_, sink)| sink.clone());
        sink.is_some_and(|sink| sink.emit(event))
    }
}

impl AdapterFactory for RecordingFactory {
    fn create(&self, kind: BackendKind, _config: &PlayerConfig) -> Result<Box<dyn BackendAdapter>> {
        if self.failing.lock().contains(&kind) {
            return Err(PlaybackError::UnsupportedBackend(kind.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(RecordingAdapter {
            id,
            kind,
            shared: Arc::clone(&self.shared),
            sink: None,
            prepared: false,
            playing: false,
            leaky: self.leaky.load(Ordering::SeqCst),
        }))
    }
}

// ============================================================================
// Surfaces and helpers
// ============================================================================

pub struct TestSurface {
    id: u64,
    journal: Journal,
}

impl NativeSurface for TestSurface {
    fn id(&self) -> u64 {
        self.id
    }

    fn release(&self) {
        self.journal.record(HOST, Call::SurfaceReleased(self.id));
    }
}

pub fn window(id: u64, journal: &Journal) -> RenderTarget {
    RenderTarget::WindowSurface(Arc::new(TestSurface {
        id,
        journal: journal.clone(),
    }))
}

pub fn timeout() -> BackendEvent {
    BackendEvent::Error(BackendError::new(BackendErrorKind::Timeout, -110, "read timed out"))
}

pub fn fault() -> BackendEvent {
    BackendEvent::Error(BackendError::new(BackendErrorKind::BackendFault, 100, "server died"))
}

pub fn unsupported() -> BackendEvent {
    BackendEvent::Error(BackendError::new(
        BackendErrorKind::UnsupportedFormat,
        -1010,
        "unsupported codec",
    ))
}

/// Everything currently queued on `stream`.
pub fn drain(stream: &mut EventStream) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Some(Ok(event)) = stream.try_recv() {
        events.push(event);
    }
    events
}
