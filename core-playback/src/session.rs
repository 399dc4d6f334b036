//! # Playback Session Controller
//!
//! One tokio task per session owns the current [`BackendAdapter`], the
//! [`SurfaceBinding`], the [`RetryState`] and the authoritative
//! [`PlaybackState`]. Everything that can change that state arrives as a
//! message:
//!
//! - UI commands from [`PlayerHandle`];
//! - backend events, stamped with the generation of the adapter that emitted
//!   them;
//! - retry timer expirations.
//!
//! A single `select!` loop drains all three, so state mutations are
//! serialised and a backend hot-swap runs to completion before the next
//! command is looked at. Backend events are polled first: a command never
//! observes state older than the events already queued before it.
//!
//! Snapshots are published through a `watch` channel after every message;
//! domain events go out on the session [`EventBus`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{LifecycleObserver, LifecycleState, MediaEngineProvider, RenderTarget};
use core_runtime::events::{
    BackendSwitchEvent, CoreEvent, EventBus, EventStream, PlaybackEvent, SurfaceEvent,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::backend::EngineAdapterFactory;
use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::retry::{RetryDecision, RetryState};
use crate::state::{
    DisplayMode, ErrorCategory, PlaybackErrorDescriptor, PlaybackState, SessionPhase,
};
use crate::surface::SurfaceBinding;
use crate::traits::{
    AdapterFactory, BackendAdapter, BackendError, BackendErrorKind, BackendEvent, BackendKind,
    EventSink, PlaybackSource, TaggedEvent,
};

// ============================================================================
// Session identity
// ============================================================================

/// Unique identifier of one player session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
enum Command {
    Prepare(PlaybackSource),
    Play,
    Pause,
    SeekTo(i64),
    Stop,
    SwitchBackend(BackendKind),
    SetRenderTarget(RenderTarget),
    SurfaceDestroyed,
    SetDisplayMode(DisplayMode),
    Lifecycle(LifecycleState),
    Settle(oneshot::Sender<()>),
    Release(oneshot::Sender<()>),
}

// ============================================================================
// Controller
// ============================================================================

struct SessionController {
    id: SessionId,
    config: PlayerConfig,
    factory: Arc<dyn AdapterFactory>,

    adapter: Option<Box<dyn BackendAdapter>>,
    backend: BackendKind,
    generation: u64,
    event_tx: mpsc::UnboundedSender<TaggedEvent>,

    surface: SurfaceBinding,

    retry: RetryState,
    retry_timer: Option<CancellationToken>,
    retry_epoch: u64,
    retry_tx: mpsc::UnboundedSender<u64>,

    /// Last play/pause intent expressed by the caller.
    play_intent: bool,
    /// The current prepare reached `Ready`.
    ready: bool,
    /// The adapter was stopped by `stop` or a surfaced error. Its events are
    /// dropped until the next prepare.
    halted: bool,

    state: PlaybackState,
    state_tx: watch::Sender<PlaybackState>,
    bus: EventBus,
    released: bool,
}

impl SessionController {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<TaggedEvent>,
        mut retries: mpsc::UnboundedReceiver<u64>,
    ) {
        debug!(session = %self.id, backend = %self.backend, "session started");

        loop {
            tokio::select! {
                biased;
                Some(tagged) = events.recv() => self.on_backend_event(tagged),
                Some(epoch) = retries.recv() => self.on_retry_timer(epoch),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => self.release(),
                },
            }

            if self.released {
                break;
            }
            self.publish();
        }

        debug!(session = %self.id, "session task finished");
    }

    #[instrument(skip(self), fields(session = %self.id, backend = %self.backend))]
    fn handle(&mut self, command: Command) {
        match command {
            Command::Prepare(source) => self.prepare(source),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::SeekTo(position_ms) => self.seek_to(position_ms),
            Command::Stop => self.stop(),
            Command::SwitchBackend(kind) => self.switch_backend(kind),
            Command::SetRenderTarget(target) => self.set_render_target(target),
            Command::SurfaceDestroyed => self.surface_destroyed(),
            Command::SetDisplayMode(mode) => self.state.display_mode = mode,
            Command::Lifecycle(LifecycleState::Foreground) => self.play(),
            Command::Lifecycle(LifecycleState::Background | LifecycleState::Suspended) => {
                self.pause()
            }
            Command::Settle(reply) => {
                self.publish();
                let _ = reply.send(());
            }
            Command::Release(reply) => {
                self.release();
                let _ = reply.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn prepare(&mut self, source: PlaybackSource) {
        info!(source = %source.redacted(), "preparing source");

        self.cancel_retry_timer();
        self.retry.reset_for(source.clone());
        self.play_intent = false;
        self.ready = false;
        self.halted = false;
        self.surface.cancel_deferred_play();

        self.state.source = Some(source.clone());
        self.state.error = None;
        self.state.phase = SessionPhase::Preparing;
        self.state.is_buffering = true;
        self.state.is_playing = false;
        self.state.duration_ms = 0;
        self.state.current_position_ms = 0;
        self.state.resolution = None;
        self.state.metadata.clear();
        self.state.retry_attempt = 0;

        self.emit(CoreEvent::Playback(PlaybackEvent::Preparing {
            session_id: self.id.to_string(),
            source: source.redacted(),
            backend: self.backend.to_string(),
        }));

        if self.adapter.is_none() && !self.recreate_adapter() {
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.prepare(&source);
        }
    }

    fn play(&mut self) {
        self.play_intent = true;
        if self.surface.is_suspended() {
            debug!("no render target; play deferred until a surface is created");
            self.surface.defer_play();
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.play();
        }
    }

    fn pause(&mut self) {
        self.play_intent = false;
        self.surface.cancel_deferred_play();
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.pause();
        }
    }

    fn seek_to(&mut self, position_ms: i64) {
        if self.state.is_live() {
            debug!(position_ms, "ignoring seek on live source");
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.seek_to(position_ms);
        }
    }

    fn stop(&mut self) {
        self.cancel_retry_timer();
        self.play_intent = false;
        self.ready = false;
        self.surface.cancel_deferred_play();
        self.halt_adapter();

        self.state.phase = SessionPhase::Stopped;
        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.state.retry_attempt = 0;
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            session_id: self.id.to_string(),
        }));
    }

    /// Snapshot, release the old adapter, build the new one, replay.
    ///
    /// The old adapter is severed and released before the factory is asked
    /// for the new one, so no event or command crosses between the two.
    fn switch_backend(&mut self, kind: BackendKind) {
        let from = self.backend;
        let source = self.retry.last_source().cloned();
        let position_ms = self.state.current_position_ms;
        let was_playing = self.play_intent || self.state.is_playing;

        info!(%from, to = %kind, position_ms, was_playing, "switching backend");
        self.emit(CoreEvent::Backend(BackendSwitchEvent::Started {
            session_id: self.id.to_string(),
            from: from.to_string(),
            to: kind.to_string(),
        }));

        self.cancel_retry_timer();
        self.teardown_adapter();
        self.backend = kind;
        self.state.backend = kind;
        self.ready = false;
        self.state.is_playing = false;

        if !self.recreate_adapter() {
            return;
        }

        self.play_intent = was_playing;
        if let Some(source) = source {
            self.retry.reset_for(source.clone());
            self.halted = false;
            self.state.error = None;
            self.state.phase = SessionPhase::Preparing;
            self.state.is_buffering = true;
            self.state.retry_attempt = 0;

            let suspended = self.surface.is_suspended();
            if let Some(adapter) = self.adapter.as_mut() {
                adapter.prepare(&source);
                adapter.seek_to(position_ms);
                if was_playing && !suspended {
                    adapter.play();
                }
            }
            if was_playing && suspended {
                self.surface.defer_play();
            }
        }

        self.emit(CoreEvent::Backend(BackendSwitchEvent::Completed {
            session_id: self.id.to_string(),
            backend: kind.to_string(),
            resumed_at_ms: position_ms,
        }));
    }

    fn set_render_target(&mut self, target: RenderTarget) {
        let surface_id = target.id();
        let resumed = self.surface.attach(target, self.adapter.as_deref_mut());
        debug!(?surface_id, resumed, "render target bound");

        if let Some(surface_id) = surface_id {
            self.emit(CoreEvent::Surface(SurfaceEvent::Bound {
                session_id: self.id.to_string(),
                surface_id,
            }));
        }
    }

    fn surface_destroyed(&mut self) {
        let surface_id = self.surface.target().id();
        let was_playing = self.play_intent;
        self.surface.detach(was_playing, self.adapter.as_deref_mut());

        if let Some(surface_id) = surface_id {
            self.emit(CoreEvent::Surface(SurfaceEvent::Destroyed {
                session_id: self.id.to_string(),
                surface_id,
            }));
        }
    }

    /// Terminal. Nothing is published or emitted afterwards except the final
    /// `Released` snapshot and event.
    fn release(&mut self) {
        if self.released {
            return;
        }
        info!(session = %self.id, "releasing session");

        self.cancel_retry_timer();
        self.teardown_adapter();
        self.surface.clear();
        self.play_intent = false;

        self.state.phase = SessionPhase::Released;
        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.publish();
        self.emit(CoreEvent::Playback(PlaybackEvent::Released {
            session_id: self.id.to_string(),
        }));
        self.released = true;
    }

    // ------------------------------------------------------------------------
    // Backend events
    // ------------------------------------------------------------------------

    fn on_backend_event(&mut self, tagged: TaggedEvent) {
        if self.released {
            return;
        }
        if tagged.generation != self.generation {
            trace!(
                generation = tagged.generation,
                current = self.generation,
                "dropping event from replaced adapter"
            );
            return;
        }
        if self.halted {
            trace!(
                event = ?tagged.event,
                phase = ?self.state.phase,
                "dropping event from stopped adapter"
            );
            return;
        }

        let session_id = self.id.to_string();
        match tagged.event {
            BackendEvent::Prepared => {
                self.emit(CoreEvent::Playback(PlaybackEvent::Prepared { session_id }));
            }
            BackendEvent::Ready => self.on_ready(),
            BackendEvent::Error(error) => self.on_backend_error(error),
            BackendEvent::Buffering(is_buffering) => {
                self.state.is_buffering = is_buffering;
                if is_buffering {
                    self.state.error = None;
                }
                self.emit(CoreEvent::Playback(PlaybackEvent::Buffering {
                    session_id,
                    is_buffering,
                }));
            }
            BackendEvent::IsPlayingChanged(playing) => {
                self.state.is_playing = playing;
                let event = if playing {
                    self.state.error = None;
                    PlaybackEvent::Started { session_id }
                } else {
                    PlaybackEvent::Paused { session_id }
                };
                self.emit(CoreEvent::Playback(event));
            }
            BackendEvent::DurationChanged(duration_ms) => self.state.duration_ms = duration_ms,
            BackendEvent::CurrentPositionChanged(position_ms) => {
                self.state.current_position_ms = position_ms.max(0)
            }
            BackendEvent::Resolution { width, height } => {
                if !self.state.apply_resolution(width, height) {
                    debug!(width, height, "ignoring non-positive video size");
                }
            }
            BackendEvent::Metadata(metadata) => self.state.metadata.extend(metadata),
            BackendEvent::Interrupt => {
                warn!("backend interrupted");
                self.emit(CoreEvent::Playback(PlaybackEvent::Interrupted { session_id }));
            }
        }

        self.refresh_phase();
    }

    fn on_ready(&mut self) {
        info!("stream ready");
        self.ready = true;
        self.retry.on_recovered();

        self.state.error = None;
        self.state.display_mode = self.config.default_display_mode;
        self.state.is_buffering = false;
        self.state.retry_attempt = 0;
        if matches!(self.state.phase, SessionPhase::Preparing | SessionPhase::Error) {
            self.state.phase = SessionPhase::Paused;
        }

        self.emit(CoreEvent::Playback(PlaybackEvent::Ready {
            session_id: self.id.to_string(),
            backend: self.backend.to_string(),
        }));
    }

    fn on_backend_error(&mut self, error: BackendError) {
        match self.retry.on_failure(&self.config.retry, &error) {
            RetryDecision::Retry { attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    attempt,
                    max_attempts = self.config.retry.max_attempts,
                    delay_ms,
                    kind = %error.kind,
                    native_code = error.native_code,
                    "transient backend error, retrying"
                );

                self.ready = false;
                self.state.phase = SessionPhase::Preparing;
                self.state.is_buffering = true;
                self.state.is_playing = false;
                self.state.retry_attempt = attempt;
                self.schedule_retry(delay);

                self.emit(CoreEvent::Playback(PlaybackEvent::RetryScheduled {
                    session_id: self.id.to_string(),
                    attempt,
                    max_attempts: self.config.retry.max_attempts,
                    delay_ms,
                }));
            }
            RetryDecision::Fallback => {
                let fallback = self
                    .config
                    .fallback_backend
                    .filter(|kind| *kind != self.backend);
                match fallback {
                    Some(to) => {
                        warn!(from = %self.backend, %to, %error, "backend fault, falling back");
                        self.emit(CoreEvent::Backend(BackendSwitchEvent::FallbackTriggered {
                            session_id: self.id.to_string(),
                            from: self.backend.to_string(),
                            to: to.to_string(),
                        }));
                        self.switch_backend(to);
                    }
                    None => self.give_up(error),
                }
            }
            RetryDecision::GiveUp { exhausted } => {
                if exhausted {
                    warn!(attempts = self.retry.attempt(), "retry budget exhausted");
                }
                self.give_up(error);
            }
        }
    }

    fn give_up(&mut self, error: BackendError) {
        let category = if error.kind == BackendErrorKind::BackendFault {
            ErrorCategory::BackendFault
        } else if self.ready {
            ErrorCategory::PlaybackFailure
        } else {
            ErrorCategory::PrepareFailure
        };
        let descriptor = PlaybackErrorDescriptor::from_backend(category, &error);
        warn!(error = %descriptor, category = category.as_str(), "surfacing playback error");

        self.cancel_retry_timer();
        self.ready = false;
        self.halt_adapter();

        self.state.phase = SessionPhase::Error;
        self.state.is_playing = false;
        self.state.is_buffering = false;
        self.state.retry_attempt = 0;
        self.state.error = Some(descriptor);

        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            session_id: self.id.to_string(),
            message: error.message,
            category: category.as_str().to_string(),
            native_code: Some(error.native_code),
        }));
    }

    // ------------------------------------------------------------------------
    // Retry timer
    // ------------------------------------------------------------------------

    fn schedule_retry(&mut self, delay: Duration) {
        self.cancel_retry_timer();

        let token = CancellationToken::new();
        let epoch = self.retry_epoch;
        let tx = self.retry_tx.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(epoch);
                }
            }
        });
        self.retry_timer = Some(token);
    }

    /// Also invalidates an expiry that already fired but is still queued.
    fn cancel_retry_timer(&mut self) {
        if let Some(token) = self.retry_timer.take() {
            token.cancel();
        }
        self.retry_epoch += 1;
    }

    fn on_retry_timer(&mut self, epoch: u64) {
        if self.released || epoch != self.retry_epoch || self.retry_timer.take().is_none() {
            return;
        }
        let Some(source) = self.retry.last_source().cloned() else {
            return;
        };

        info!(attempt = self.retry.attempt(), source = %source.redacted(), "retrying source");
        let play = self.play_intent && !self.surface.is_suspended();
        if self.adapter.is_none() && !self.recreate_adapter() {
            return;
        }
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.prepare(&source);
            if play {
                adapter.play();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Adapter ownership
    // ------------------------------------------------------------------------

    fn install(&mut self, mut adapter: Box<dyn BackendAdapter>) {
        self.generation += 1;
        adapter.subscribe(EventSink::new(self.generation, self.event_tx.clone()));
        self.surface.rebind(adapter.as_mut());
        self.adapter = Some(adapter);
    }

    fn halt_adapter(&mut self) {
        self.halted = true;
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.stop();
        }
    }

    fn teardown_adapter(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.unsubscribe();
            adapter.release();
        }
        self.generation += 1;
    }

    /// Build an adapter for the current backend kind. A failure is surfaced
    /// as a backend fault.
    fn recreate_adapter(&mut self) -> bool {
        match self.factory.create(self.backend, &self.config) {
            Ok(adapter) => {
                self.install(adapter);
                true
            }
            Err(err) => {
                warn!(backend = %self.backend, error = %err, "failed to create backend adapter");
                self.emit(CoreEvent::Backend(BackendSwitchEvent::Failed {
                    session_id: self.id.to_string(),
                    backend: self.backend.to_string(),
                    message: err.to_string(),
                }));
                self.give_up(BackendError::new(
                    BackendErrorKind::BackendFault,
                    0,
                    err.to_string(),
                ));
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------------

    fn refresh_phase(&mut self) {
        let phase = match self.state.phase {
            SessionPhase::Idle
            | SessionPhase::Stopped
            | SessionPhase::Error
            | SessionPhase::Released => return,
            _ if !self.ready => SessionPhase::Preparing,
            _ if self.state.is_buffering => SessionPhase::Buffering,
            _ if self.state.is_playing => SessionPhase::Playing,
            _ => SessionPhase::Paused,
        };
        self.state.phase = phase;
    }

    fn publish(&self) {
        let current = &self.state;
        self.state_tx.send_if_modified(|published| {
            if published == current {
                return false;
            }
            *published = current.clone();
            true
        });
    }

    fn emit(&self, event: CoreEvent) {
        if let Err(err) = self.bus.emit(event) {
            trace!(event = ?err.0, "no session event subscribers");
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Caller-facing handle to a running session.
///
/// Commands are queued to the session task and never block. They fail only
/// with [`PlaybackError::SessionReleased`] once the session is gone.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use bridge_traits::MediaEngineProvider;
/// # async fn demo(provider: Arc<dyn MediaEngineProvider>) -> core_playback::Result<()> {
/// use core_playback::{PlayerConfig, PlayerHandle};
///
/// let player = PlayerHandle::with_engine_provider(PlayerConfig::hardware_with_fallback(), provider)?;
/// player.prepare("rtsp://cam1/live")?;
/// player.play()?;
///
/// let mut states = player.subscribe_state();
/// while states.changed().await.is_ok() {
///     let state = states.borrow().clone();
///     if state.error.is_some() {
///         break;
///     }
/// }
/// player.release().await
/// # }
/// ```
#[derive(Clone)]
pub struct PlayerHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlaybackState>,
    bus: EventBus,
    released: Arc<AtomicBool>,
}

impl PlayerHandle {
    /// Validate `config`, build the initial adapter and start the session
    /// task on the current tokio runtime.
    pub fn spawn(config: PlayerConfig, factory: Arc<dyn AdapterFactory>) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let id = SessionId::new();
        let backend = config.backend_kind;
        let adapter = factory.create(backend, &config)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let state = PlaybackState::new(backend, config.default_display_mode);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let bus = EventBus::new(config.event_buffer);

        let mut controller = SessionController {
            id,
            config,
            factory,
            adapter: None,
            backend,
            generation: 0,
            event_tx,
            surface: SurfaceBinding::new(),
            retry: RetryState::new(),
            retry_timer: None,
            retry_epoch: 0,
            retry_tx,
            play_intent: false,
            ready: false,
            halted: false,
            state,
            state_tx,
            bus: bus.clone(),
            released: false,
        };
        controller.install(adapter);

        info!(session = %id, %backend, "spawning playback session");
        tokio::spawn(controller.run(command_rx, event_rx, retry_rx));

        Ok(Self {
            id,
            commands: command_tx,
            state: state_rx,
            bus,
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Session over host engines, using the built-in engine adapters.
    pub fn with_engine_provider(
        config: PlayerConfig,
        provider: Arc<dyn MediaEngineProvider>,
    ) -> Result<Self> {
        Self::spawn(config, Arc::new(EngineAdapterFactory::new(provider)))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Open `source`. Clears any surfaced error and resets the retry budget.
    pub fn prepare(&self, source: impl Into<PlaybackSource>) -> Result<()> {
        self.send(Command::Prepare(source.into()))
    }

    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    /// Ignored on live sources.
    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.send(Command::SeekTo(position_ms))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Hot-swap the backend, resuming source, position and play state.
    pub fn switch_backend(&self, kind: BackendKind) -> Result<()> {
        self.send(Command::SwitchBackend(kind))
    }

    /// Host created (or replaced) the drawing surface.
    pub fn set_render_target(&self, target: RenderTarget) -> Result<()> {
        self.send(Command::SetRenderTarget(target))
    }

    /// Host is destroying the current drawing surface.
    pub fn surface_destroyed(&self) -> Result<()> {
        self.send(Command::SurfaceDestroyed)
    }

    pub fn set_display_mode(&self, mode: DisplayMode) -> Result<()> {
        self.send(Command::SetDisplayMode(mode))
    }

    /// Foreground resumes playback, background and suspension pause it.
    pub fn on_lifecycle(&self, state: LifecycleState) -> Result<()> {
        self.send(Command::Lifecycle(state))
    }

    /// Forward host lifecycle transitions until the observer's stream ends
    /// or the session is released.
    pub async fn follow_lifecycle(
        &self,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<JoinHandle<()>> {
        let mut changes = observer.subscribe_changes().await?;
        let handle = self.clone();
        Ok(tokio::spawn(async move {
            while let Some(state) = changes.next().await {
                debug!(session = %handle.id, ?state, "host lifecycle changed");
                if handle.on_lifecycle(state).is_err() {
                    break;
                }
            }
        }))
    }

    /// Latest published snapshot.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Session event stream.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.bus.subscribe())
    }

    /// Read-after-write barrier for hosts.
    ///
    /// Resolves once every command sent before it, and every backend event
    /// queued by then, has been applied and published. A host that needs
    /// [`state`](Self::state) to reflect its own earlier commands awaits this
    /// first.
    pub async fn settled(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Settle(tx))?;
        rx.await.map_err(|_| PlaybackError::SessionReleased)
    }

    /// Tear the session down. Idempotent; later commands fail with
    /// [`PlaybackError::SessionReleased`].
    pub async fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Release(tx)).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire) || self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(PlaybackError::SessionReleased);
        }
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::SessionReleased)
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}
