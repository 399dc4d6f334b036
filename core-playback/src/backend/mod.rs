//! # Engine-backed Adapters
//!
//! [`EngineAdapter`] implements the [`BackendAdapter`] contract on top of a
//! host [`MediaEngine`]. The two backend variants share this implementation
//! and differ only in their [`TuningProfile`]: which engine flavor they ask
//! the host for, which options they apply before opening a source and which
//! native signal counts as "ready".
//!
//! Native callbacks arrive on decoder threads. They touch only the small
//! shared block behind a `parking_lot` mutex and forward translated events
//! through the session's [`EventSink`]; engine calls are never made while the
//! lock is held.

mod factory;
mod hardware;
mod software;

pub use factory::EngineAdapterFactory;

use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bridge_traits::{
    codes, BridgeError, EngineFlavor, EngineOption, MediaEngine, NativeEvent, NativeInfo,
    NativeListener, RenderTarget,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::PlayerConfig;
use crate::traits::{
    BackendAdapter, BackendError, BackendErrorKind, BackendEvent, BackendKind, EventSink,
    PlaybackSource,
};

// ============================================================================
// Tuning profiles
// ============================================================================

/// Native signal after which an adapter reports `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    /// First video frame reached the render target.
    FirstFrame,
    /// The engine finished opening the source.
    Prepared,
}

/// Everything that distinguishes one backend variant from another.
#[derive(Debug, Clone)]
pub struct TuningProfile {
    kind: BackendKind,
    flavor: EngineFlavor,
    ready_on: ReadySignal,
    options: Vec<EngineOption>,
}

impl TuningProfile {
    pub fn for_kind(kind: BackendKind, config: &PlayerConfig) -> Self {
        match kind {
            BackendKind::HardwarePipeline => hardware::profile(config),
            BackendKind::SoftwareTolerant => software::profile(config),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn flavor(&self) -> EngineFlavor {
        self.flavor
    }

    pub fn ready_on(&self) -> ReadySignal {
        self.ready_on
    }

    pub fn options(&self) -> &[EngineOption] {
        &self.options
    }

    /// Look up an option by name.
    pub fn option(&self, name: &str) -> Option<&EngineOption> {
        self.options.iter().find(|opt| opt.name == name)
    }
}

// ============================================================================
// Native error mapping
// ============================================================================

/// Map an engine `(what, extra)` error pair onto a [`BackendError`].
///
/// `extra` carries the precise cause on ffmpeg-based engines and is consulted
/// first; the reported code is `extra` when non-zero, `what` otherwise.
pub fn classify_native_error(what: i32, extra: i32) -> BackendError {
    use BackendErrorKind::*;

    let kind = match (what, extra) {
        (_, codes::MEDIA_ERROR_TIMED_OUT) | (codes::MEDIA_ERROR_TIMED_OUT, _) => Timeout,
        (_, codes::ERROR_CONNECTION_RESET | codes::ERROR_CONNECTION_REFUSED) => NetworkReset,
        (_, codes::ERROR_HTTP_FORBIDDEN | codes::ERROR_HTTP_NOT_FOUND) => SourceRejected,
        (_, codes::MEDIA_ERROR_MALFORMED) | (codes::MEDIA_ERROR_MALFORMED, _) => MalformedSource,
        (_, codes::MEDIA_ERROR_UNSUPPORTED) | (codes::MEDIA_ERROR_UNSUPPORTED, _) => {
            UnsupportedFormat
        }
        (_, codes::MEDIA_ERROR_IO) | (codes::MEDIA_ERROR_IO, _) => Io,
        (codes::MEDIA_ERROR_SERVER_DIED, _) => BackendFault,
        _ => Unknown,
    };

    let code = if extra != 0 { extra } else { what };
    BackendError::new(kind, code, format!("native error what={} extra={}", what, extra))
}

fn bridge_failure(err: BridgeError) -> BackendError {
    match err {
        BridgeError::Rejected(msg) => BackendError::new(BackendErrorKind::SourceRejected, 0, msg),
        other => BackendError::new(
            BackendErrorKind::BackendFault,
            codes::MEDIA_ERROR_UNKNOWN,
            other.to_string(),
        ),
    }
}

// ============================================================================
// Shared callback state
// ============================================================================

#[derive(Default)]
struct Shared {
    sink: Option<EventSink>,
    prepared: bool,
    playing: bool,
    ready_reported: bool,
    play_when_ready: bool,
    pending_seek: Option<i64>,
    poll_token: Option<CancellationToken>,
}

/// State reachable from both the adapter and the native listener.
struct NativeBridge {
    engine: Weak<dyn MediaEngine>,
    shared: Mutex<Shared>,
    ready_on: ReadySignal,
    runtime: Option<Handle>,
    poll_interval: Duration,
}

impl NativeBridge {
    fn emit(&self, event: BackendEvent) {
        if let Some(sink) = self.shared.lock().sink.as_ref() {
            sink.emit(event);
        }
    }

    fn on_native_event(self: &Arc<Self>, event: NativeEvent) {
        trace!(?event, "native engine event");
        match event {
            NativeEvent::Prepared => self.on_prepared(),
            NativeEvent::Info(NativeInfo::VideoRenderingStart) => {
                if self.ready_on == ReadySignal::FirstFrame {
                    self.report_ready();
                }
            }
            NativeEvent::Info(NativeInfo::BufferingStart) => self.emit(BackendEvent::Buffering(true)),
            NativeEvent::Info(NativeInfo::BufferingEnd) => self.emit(BackendEvent::Buffering(false)),
            NativeEvent::Info(NativeInfo::Other(code)) => trace!(code, "unhandled engine info"),
            NativeEvent::Error { what, extra } => {
                self.stop_polling();
                {
                    let mut shared = self.shared.lock();
                    shared.prepared = false;
                    shared.playing = false;
                }
                let error = classify_native_error(what, extra);
                debug!(kind = %error.kind, code = error.native_code, "engine reported error");
                self.emit(BackendEvent::Error(error));
            }
            NativeEvent::VideoSizeChanged { width, height } => {
                self.emit(BackendEvent::Resolution { width, height })
            }
            NativeEvent::Metadata(metadata) => self.emit(BackendEvent::Metadata(metadata)),
            NativeEvent::Completion => {
                let was_playing = mem::replace(&mut self.shared.lock().playing, false);
                if was_playing {
                    self.emit(BackendEvent::IsPlayingChanged(false));
                }
            }
            NativeEvent::Interrupted => self.emit(BackendEvent::Interrupt),
        }
    }

    fn on_prepared(self: &Arc<Self>) {
        let (start, seek) = {
            let mut shared = self.shared.lock();
            shared.prepared = true;
            (
                mem::take(&mut shared.play_when_ready),
                shared.pending_seek.take(),
            )
        };

        self.emit(BackendEvent::Prepared);
        self.start_polling();
        if self.ready_on == ReadySignal::Prepared {
            self.report_ready();
        }

        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if let Some(position) = seek {
            seek_if_seekable(engine.as_ref(), position);
        }
        if start {
            self.start_engine(engine.as_ref());
        }
    }

    fn report_ready(&self) {
        let first = !mem::replace(&mut self.shared.lock().ready_reported, true);
        if first {
            self.emit(BackendEvent::Ready);
        }
    }

    fn start_engine(&self, engine: &dyn MediaEngine) {
        match engine.start() {
            Ok(()) => {
                let changed = !mem::replace(&mut self.shared.lock().playing, true);
                if changed {
                    self.emit(BackendEvent::IsPlayingChanged(true));
                }
            }
            Err(err) => self.emit(BackendEvent::Error(bridge_failure(err))),
        }
    }

    fn start_polling(self: &Arc<Self>) {
        let Some(runtime) = self.runtime.as_ref() else {
            warn!("no tokio runtime captured; position polling disabled");
            return;
        };

        let token = CancellationToken::new();
        if let Some(previous) = self.shared.lock().poll_token.replace(token.clone()) {
            previous.cancel();
        }

        let bridge = Arc::downgrade(self);
        let interval = self.poll_interval;
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let delivered = bridge
                            .upgrade()
                            .is_some_and(|bridge| bridge.report_progress(&token));
                        if !delivered {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// One poll tick. Returns `false` once polling should end.
    fn report_progress(&self, token: &CancellationToken) -> bool {
        let Some(engine) = self.engine.upgrade() else {
            return false;
        };
        let position = engine.current_position();
        let duration = engine.duration();

        let shared = self.shared.lock();
        if token.is_cancelled() {
            return false;
        }
        if let Some(sink) = shared.sink.as_ref() {
            sink.emit(BackendEvent::CurrentPositionChanged(position.max(0)));
            sink.emit(BackendEvent::DurationChanged(duration));
        }
        true
    }

    /// Cancellation happens under the shared lock, which the poll task also
    /// takes before emitting, so no poll is delivered once this returns.
    fn stop_polling(&self) {
        if let Some(token) = self.shared.lock().poll_token.take() {
            token.cancel();
        }
    }
}

fn seek_if_seekable(engine: &dyn MediaEngine, position_ms: i64) {
    let duration = engine.duration();
    if duration <= 0 {
        debug!(position_ms, "ignoring seek on non-seekable source");
        return;
    }
    if let Err(err) = engine.seek_to(position_ms.clamp(0, duration)) {
        warn!(error = %err, "engine seek failed");
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// [`BackendAdapter`] over a host [`MediaEngine`].
pub struct EngineAdapter {
    profile: TuningProfile,
    engine: Arc<dyn MediaEngine>,
    bridge: Arc<NativeBridge>,
    target: RenderTarget,
    released: bool,
}

impl EngineAdapter {
    /// Wrap `engine` and register the native listener.
    ///
    /// Position polling runs on the tokio runtime current at construction.
    pub fn new(profile: TuningProfile, engine: Arc<dyn MediaEngine>, poll_interval: Duration) -> Self {
        let bridge = Arc::new(NativeBridge {
            engine: Arc::downgrade(&engine),
            shared: Mutex::new(Shared::default()),
            ready_on: profile.ready_on,
            runtime: Handle::try_current().ok(),
            poll_interval,
        });

        let weak = Arc::downgrade(&bridge);
        let listener: NativeListener = Arc::new(move |event| {
            if let Some(bridge) = weak.upgrade() {
                bridge.on_native_event(event);
            }
        });
        engine.set_listener(Some(listener));

        Self {
            profile,
            engine,
            bridge,
            target: RenderTarget::None,
            released: false,
        }
    }

    pub fn profile(&self) -> &TuningProfile {
        &self.profile
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl BackendAdapter for EngineAdapter {
    fn kind(&self) -> BackendKind {
        self.profile.kind
    }

    fn subscribe(&mut self, sink: EventSink) {
        if let Some(previous) = self.bridge.shared.lock().sink.replace(sink) {
            previous.sever();
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(sink) = self.bridge.shared.lock().sink.take() {
            sink.sever();
        }
    }

    fn prepare(&mut self, source: &PlaybackSource) {
        if self.released {
            warn!(backend = %self.kind(), "prepare on released adapter ignored");
            return;
        }

        self.bridge.stop_polling();
        {
            let mut shared = self.bridge.shared.lock();
            shared.prepared = false;
            shared.playing = false;
            shared.ready_reported = false;
            shared.play_when_ready = false;
            shared.pending_seek = None;
        }
        self.engine.reset();

        if !source.is_well_formed() {
            self.bridge.emit(BackendEvent::Error(BackendError::new(
                BackendErrorKind::MalformedSource,
                codes::MEDIA_ERROR_MALFORMED,
                "source locator is malformed",
            )));
            return;
        }

        for option in &self.profile.options {
            if let Err(err) = self.engine.set_option(option.clone()) {
                warn!(option = %option.name, error = %err, "engine rejected option");
            }
        }

        if !self.target.is_none() {
            if let Err(err) = self.engine.set_surface(Some(&self.target)) {
                warn!(error = %err, "failed to bind render target before prepare");
            }
        }

        debug!(backend = %self.kind(), source = %source.redacted(), "opening source");
        let opened = self
            .engine
            .set_data_source(source.as_str())
            .and_then(|_| self.engine.prepare_async());
        if let Err(err) = opened {
            self.bridge.emit(BackendEvent::Error(bridge_failure(err)));
        }
    }

    fn play(&mut self) {
        if self.released {
            return;
        }
        let start_now = {
            let mut shared = self.bridge.shared.lock();
            if shared.playing {
                false
            } else if !shared.prepared {
                shared.play_when_ready = true;
                false
            } else {
                true
            }
        };
        if start_now {
            self.bridge.start_engine(self.engine.as_ref());
        }
    }

    fn pause(&mut self) {
        if self.released {
            return;
        }
        {
            let mut shared = self.bridge.shared.lock();
            shared.play_when_ready = false;
            if !shared.prepared || !shared.playing {
                return;
            }
        }
        match self.engine.pause() {
            Ok(()) => {
                let changed = mem::replace(&mut self.bridge.shared.lock().playing, false);
                if changed {
                    self.bridge.emit(BackendEvent::IsPlayingChanged(false));
                }
            }
            Err(err) => self.bridge.emit(BackendEvent::Error(bridge_failure(err))),
        }
    }

    fn seek_to(&mut self, position_ms: i64) {
        if self.released {
            return;
        }
        {
            let mut shared = self.bridge.shared.lock();
            if !shared.prepared {
                shared.pending_seek = Some(position_ms);
                return;
            }
        }
        seek_if_seekable(self.engine.as_ref(), position_ms);
    }

    fn stop(&mut self) {
        if self.released {
            return;
        }
        self.bridge.stop_polling();
        let was_playing = {
            let mut shared = self.bridge.shared.lock();
            shared.prepared = false;
            shared.play_when_ready = false;
            shared.pending_seek = None;
            mem::replace(&mut shared.playing, false)
        };
        if let Err(err) = self.engine.stop() {
            warn!(error = %err, "engine stop failed");
        }
        if was_playing {
            self.bridge.emit(BackendEvent::IsPlayingChanged(false));
        }
    }

    fn set_render_target(&mut self, target: &RenderTarget) {
        self.target = target.clone();
        if self.released {
            return;
        }
        let surface = if target.is_none() { None } else { Some(target) };
        if let Err(err) = self.engine.set_surface(surface) {
            warn!(error = %err, ?target, "failed to bind render target");
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.bridge.stop_polling();
        self.unsubscribe();
        self.engine.set_listener(None);
        if !mem::take(&mut self.target).is_none() {
            if let Err(err) = self.engine.set_surface(None) {
                debug!(error = %err, "detaching render target on release failed");
            }
        }
        self.engine.release();
        debug!(backend = %self.kind(), "adapter released");
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        self.release();
    }
}
