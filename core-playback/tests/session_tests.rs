mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    LifecycleChangeStream, LifecycleObserver, LifecycleState, NativeSurface, RenderTarget,
};
use common::{drain, fault, timeout, unsupported, window, Call, RecordingFactory, HOST};
use core_playback::{
    BackendEvent, BackendErrorKind, BackendKind, DisplayMode, ErrorCategory, PlaybackError,
    PlayerConfig, PlayerHandle, RetryPolicy, SessionPhase,
};
use core_runtime::events::{BackendSwitchEvent, CoreEvent, PlaybackEvent};
use tokio::sync::mpsc;

fn spawn(config: PlayerConfig) -> (PlayerHandle, Arc<RecordingFactory>) {
    let factory = RecordingFactory::new();
    let player = PlayerHandle::spawn(config, factory.clone()).unwrap();
    (player, factory)
}

fn count(events: &[CoreEvent], predicate: impl Fn(&CoreEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

#[tokio::test]
async fn test_repeated_play_emits_single_transition() {
    let (player, _factory) = spawn(PlayerConfig::default());
    let mut events = player.events();

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.play().unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();

    let state = player.state();
    assert!(state.is_playing);
    assert_eq!(state.phase, SessionPhase::Playing);

    player.pause().unwrap();
    player.pause().unwrap();
    player.settled().await.unwrap();
    assert!(!player.state().is_playing);
    assert_eq!(player.state().phase, SessionPhase::Paused);

    let events = drain(&mut events);
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::Started { .. }))),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::Paused { .. }))),
        1
    );
}

#[tokio::test]
async fn test_seek_on_live_source_is_ignored() {
    let (player, factory) = spawn(PlayerConfig::default());

    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    assert!(player.state().is_live());

    player.seek_to(5_000).unwrap();
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.current_position_ms, 0);
    assert!(state.error.is_none());
    assert!(!factory.journal().calls(1).contains(&Call::SeekTo(5_000)));

    factory.emit(1, BackendEvent::DurationChanged(60_000));
    player.seek_to(5_000).unwrap();
    player.settled().await.unwrap();
    assert!(factory.journal().calls(1).contains(&Call::SeekTo(5_000)));
}

#[tokio::test]
async fn test_switch_backend_replays_snapshot_on_new_adapter() {
    let (player, factory) = spawn(PlayerConfig::default());
    let journal = factory.journal().clone();
    let mut events = player.events();

    player.set_render_target(window(7, &journal)).unwrap();
    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    factory.emit(1, BackendEvent::CurrentPositionChanged(42_000));
    player.settled().await.unwrap();
    assert_eq!(player.state().current_position_ms, 42_000);

    let before_swap = journal.calls(1).len();
    player.switch_backend(BackendKind::HardwarePipeline).unwrap();
    player.pause().unwrap();
    player.settled().await.unwrap();

    // Old adapter only sees its own teardown.
    assert_eq!(
        journal.calls(1)[before_swap..].to_vec(),
        vec![Call::Unsubscribe, Call::Release]
    );
    assert_eq!(
        journal.calls(2),
        vec![
            Call::Subscribe,
            Call::SetRenderTarget(Some(7)),
            Call::Prepare("rtsp://cam1".into()),
            Call::SeekTo(42_000),
            Call::Play,
            Call::Pause,
        ]
    );
    let released = journal.position(1, &Call::Release).unwrap();
    let subscribed = journal.position(2, &Call::Subscribe).unwrap();
    assert!(released < subscribed);

    let state = player.state();
    assert_eq!(state.backend, BackendKind::HardwarePipeline);
    assert!(!state.is_playing);
    assert!(state.error.is_none());

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::Backend(BackendSwitchEvent::Completed { resumed_at_ms: 42_000, .. })
    )));
}

#[tokio::test]
async fn test_switch_backend_failure_surfaces_fault() {
    let (player, factory) = spawn(PlayerConfig::default());
    factory.fail_kind(BackendKind::HardwarePipeline);

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.switch_backend(BackendKind::HardwarePipeline).unwrap();
    player.settled().await.unwrap();

    let state = player.state();
    let error = state.error.expect("fault surfaced");
    assert_eq!(error.category, ErrorCategory::BackendFault);
    assert_eq!(state.phase, SessionPhase::Error);
    assert!(!state.is_playing);

    // Switching to an available backend recovers.
    player.switch_backend(BackendKind::SoftwareTolerant).unwrap();
    player.settled().await.unwrap();
    assert!(player.state().error.is_none());
    assert!(player.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_with_increasing_delays() {
    let (player, factory) = spawn(PlayerConfig::default());
    for _ in 0..4 {
        factory.script_prepare(vec![timeout()]);
    }
    let mut events = player.events();

    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    assert!(player.state().error.is_none());
    assert!(player.state().is_buffering);

    tokio::time::sleep(Duration::from_secs(30)).await;
    player.settled().await.unwrap();

    let times = factory.journal().prepare_times();
    assert_eq!(times.len(), 4, "initial prepare plus three retries");
    let delays: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(delays.windows(2).all(|w| w[1] > w[0]), "delays {:?}", delays);
    assert_eq!(delays[0], Duration::from_secs(1));

    let state = player.state();
    let error = state.error.clone().expect("error surfaced after exhaustion");
    assert_eq!(error.kind, BackendErrorKind::Timeout);
    assert_eq!(error.to_string(), "Timeout(-110)");
    assert_eq!(error.category, ErrorCategory::PrepareFailure);
    assert!(!state.is_playing);
    assert_eq!(state.phase, SessionPhase::Error);
    assert!(factory.journal().calls(1).contains(&Call::Stop));

    let events = drain(&mut events);
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. }))),
        3
    );
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::Error { .. }))),
        1
    );

    // No silent retry after surfacing.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(factory.journal().prepare_times().len(), 4);

    // A manual prepare starts a fresh budget.
    factory.script_prepare(vec![timeout()]);
    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    let state = player.state();
    assert!(state.error.is_none());
    assert_eq!(state.retry_attempt, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_timeouts_recover_silently() {
    let (player, factory) = spawn(PlayerConfig::default());
    factory.script_prepare(vec![timeout()]);
    factory.script_prepare(vec![timeout()]);
    let mut events = player.events();

    player.prepare("rtsp://cam1").unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    player.settled().await.unwrap();

    let state = player.state();
    assert!(!state.is_buffering);
    assert!(state.error.is_none());
    assert_eq!(state.retry_attempt, 0);

    player.play().unwrap();
    player.settled().await.unwrap();
    let state = player.state();
    assert!(state.is_playing);
    assert_eq!(state.phase, SessionPhase::Playing);

    assert_eq!(factory.journal().prepare_times().len(), 3);
    let events = drain(&mut events);
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. }))),
        2
    );
    assert_eq!(
        count(&events, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::Error { .. }))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_resumes_playback_intent() {
    let (player, factory) = spawn(PlayerConfig::default().with_retry(
        RetryPolicy::new(2).with_base_delay(Duration::from_millis(200)),
    ));

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    assert!(player.state().is_playing);

    factory.emit(1, timeout());
    player.settled().await.unwrap();
    assert!(!player.state().is_playing);
    assert!(player.state().is_buffering);

    tokio::time::sleep(Duration::from_secs(1)).await;
    player.settled().await.unwrap();
    let state = player.state();
    assert!(state.is_playing);
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let (player, factory) = spawn(PlayerConfig::default());
    factory.script_prepare(vec![timeout()]);

    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    player.stop().unwrap();
    player.settled().await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    player.settled().await.unwrap();
    assert_eq!(factory.journal().prepare_times().len(), 1);
    assert_eq!(player.state().phase, SessionPhase::Stopped);
}

#[tokio::test]
async fn test_fatal_error_is_surfaced_immediately() {
    let (player, factory) = spawn(PlayerConfig::default());
    factory.script_prepare(vec![unsupported()]);
    let mut events = player.events();

    player.prepare("http://host/live.flv").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();

    let state = player.state();
    let error = state.error.expect("fatal error surfaced");
    assert_eq!(error.to_string(), "UnsupportedFormat(-1010)");
    assert!(!state.is_playing);
    assert!(count(&drain(&mut events), |e| matches!(
        e,
        CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. })
    )) == 0);
}

#[tokio::test]
async fn test_fault_falls_back_to_configured_backend() {
    let (player, factory) = spawn(PlayerConfig::hardware_with_fallback());
    let mut events = player.events();

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    assert_eq!(player.state().backend, BackendKind::HardwarePipeline);

    factory.emit(1, fault());
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.backend, BackendKind::SoftwareTolerant);
    assert!(state.error.is_none());
    assert!(state.is_playing);
    assert_eq!(factory.created(), 2);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        CoreEvent::Backend(BackendSwitchEvent::FallbackTriggered { .. })
    )));

    // The fallback itself faulting is not retried again.
    factory.emit(2, fault());
    player.settled().await.unwrap();
    let state = player.state();
    assert_eq!(state.error.unwrap().category, ErrorCategory::BackendFault);
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn test_fault_without_fallback_is_fatal() {
    let (player, factory) = spawn(PlayerConfig::default());

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    factory.emit(1, fault());
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.error.unwrap().category, ErrorCategory::BackendFault);
    assert_eq!(state.phase, SessionPhase::Error);
    assert!(!state.is_playing);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_events_from_replaced_adapter_are_dropped() {
    let factory = RecordingFactory::new();
    factory.leaky();
    let player = PlayerHandle::spawn(PlayerConfig::default(), factory.clone()).unwrap();

    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    player.switch_backend(BackendKind::HardwarePipeline).unwrap();
    player.settled().await.unwrap();

    assert!(factory.emit(1, BackendEvent::IsPlayingChanged(true)));
    assert!(factory.emit(1, unsupported()));
    player.settled().await.unwrap();

    let state = player.state();
    assert!(!state.is_playing);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_surfaced_error_survives_late_adapter_events() {
    let (player, factory) = spawn(PlayerConfig::default());
    factory.script_prepare(vec![unsupported()]);
    let mut events = player.events();

    player.prepare("http://host/live.flv").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    assert_eq!(player.state().phase, SessionPhase::Error);

    factory.emit(1, BackendEvent::Buffering(true));
    factory.emit(1, BackendEvent::Ready);
    factory.emit(1, BackendEvent::IsPlayingChanged(true));
    factory.emit(1, unsupported());
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.phase, SessionPhase::Error);
    assert_eq!(state.error.unwrap().to_string(), "UnsupportedFormat(-1010)");
    assert!(!state.is_playing);
    assert!(!state.is_buffering);

    let emitted = drain(&mut events);
    assert_eq!(
        count(&emitted, |e| matches!(e, CoreEvent::Playback(PlaybackEvent::Error { .. }))),
        1
    );
    assert_eq!(
        count(&emitted, |e| matches!(
            e,
            CoreEvent::Playback(PlaybackEvent::Ready { .. } | PlaybackEvent::Started { .. })
        )),
        0
    );

    // A new prepare on the same adapter is listened to again.
    player.prepare("http://host/live.flv").unwrap();
    player.settled().await.unwrap();
    let state = player.state();
    assert!(state.error.is_none());
    assert_eq!(state.phase, SessionPhase::Paused);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_stopped_snapshot_ignores_late_adapter_events() {
    let (player, factory) = spawn(PlayerConfig::default());

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    assert!(player.state().is_playing);

    player.stop().unwrap();
    player.settled().await.unwrap();
    factory.emit(1, BackendEvent::IsPlayingChanged(true));
    factory.emit(1, BackendEvent::Buffering(true));
    factory.emit(1, BackendEvent::Ready);
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.phase, SessionPhase::Stopped);
    assert!(!state.is_playing);
    assert!(!state.is_buffering);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_surface_destroy_and_recreate_ordering() {
    let (player, factory) = spawn(PlayerConfig::default());
    let journal = factory.journal().clone();

    player.set_render_target(window(7, &journal)).unwrap();
    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();

    let start = journal.all().len();
    player.surface_destroyed().unwrap();
    player.settled().await.unwrap();
    assert!(!player.state().is_playing);

    player.set_render_target(window(8, &journal)).unwrap();
    player.settled().await.unwrap();
    assert!(player.state().is_playing);

    assert_eq!(
        journal.all()[start..].to_vec(),
        vec![
            (1, Call::Pause),
            (1, Call::SetRenderTarget(None)),
            (HOST, Call::SurfaceReleased(7)),
            (1, Call::SetRenderTarget(Some(8))),
            (1, Call::Play),
        ]
    );
}

#[tokio::test]
async fn test_play_without_surface_waits_for_recreation() {
    let (player, factory) = spawn(PlayerConfig::default());
    let journal = factory.journal().clone();

    player.set_render_target(window(3, &journal)).unwrap();
    player.prepare("rtsp://cam1").unwrap();
    player.surface_destroyed().unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    assert!(!journal.calls(1).contains(&Call::Play));

    player.set_render_target(window(4, &journal)).unwrap();
    player.settled().await.unwrap();
    let calls = journal.calls(1);
    assert_eq!(
        calls[calls.len() - 2..].to_vec(),
        vec![Call::SetRenderTarget(Some(4)), Call::Play]
    );
    assert!(player.state().is_playing);
}

mockall::mock! {
    Surface {}

    impl NativeSurface for Surface {
        fn id(&self) -> u64;
        fn release(&self);
    }
}

#[tokio::test]
async fn test_destroyed_surface_released_once() {
    let (player, _factory) = spawn(PlayerConfig::default());

    let mut surface = MockSurface::new();
    surface.expect_id().return_const(11u64);
    surface.expect_release().times(1).return_const(());

    player
        .set_render_target(RenderTarget::OffscreenTexture(Arc::new(surface)))
        .unwrap();
    player.surface_destroyed().unwrap();
    player.surface_destroyed().unwrap();
    player.settled().await.unwrap();
    player.release().await.unwrap();
}

#[tokio::test]
async fn test_release_is_terminal() {
    let (player, factory) = spawn(PlayerConfig::default());
    let mut events = player.events();

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();

    player.release().await.unwrap();
    let state = player.state();
    assert_eq!(state.phase, SessionPhase::Released);
    assert!(!state.is_playing);

    assert!(matches!(player.play(), Err(PlaybackError::SessionReleased)));
    assert!(matches!(player.prepare("rtsp://cam2"), Err(PlaybackError::SessionReleased)));
    assert!(matches!(
        player.settled().await,
        Err(PlaybackError::SessionReleased)
    ));
    assert!(player.release().await.is_ok());
    assert!(player.is_released());

    let calls = factory.journal().calls(1);
    assert_eq!(
        calls[calls.len() - 2..].to_vec(),
        vec![Call::Unsubscribe, Call::Release]
    );

    assert!(!factory.emit(1, BackendEvent::Buffering(true)));
    tokio::task::yield_now().await;
    assert_eq!(player.state(), state);

    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        CoreEvent::Playback(PlaybackEvent::Released { .. })
    )));
}

#[tokio::test]
async fn test_ready_resets_display_mode_and_resolution_sets_ratio() {
    let config = PlayerConfig::default().with_default_display_mode(DisplayMode::Fill);
    let (player, factory) = spawn(config);

    player.prepare("rtsp://cam1").unwrap();
    player.settled().await.unwrap();
    player.set_display_mode(DisplayMode::WideCinema).unwrap();
    factory.emit(1, BackendEvent::Resolution { width: 720, height: 576 });
    factory.emit(1, BackendEvent::Resolution { width: 0, height: 0 });
    player.settled().await.unwrap();

    let state = player.state();
    assert_eq!(state.display_mode, DisplayMode::WideCinema);
    assert_eq!(state.resolution, Some((720, 576)));
    assert!((state.aspect_ratio - 1.25).abs() < 1e-6);

    factory.emit(1, BackendEvent::Ready);
    player.settled().await.unwrap();
    assert_eq!(player.state().display_mode, DisplayMode::Fill);
}

#[tokio::test]
async fn test_buffering_phase_transitions() {
    let (player, factory) = spawn(PlayerConfig::default());

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();
    factory.emit(1, BackendEvent::Buffering(true));
    player.settled().await.unwrap();
    assert_eq!(player.state().phase, SessionPhase::Buffering);

    factory.emit(1, BackendEvent::Buffering(false));
    player.settled().await.unwrap();
    assert_eq!(player.state().phase, SessionPhase::Playing);
}

struct ChannelLifecycle {
    rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<LifecycleState>>>,
}

struct ChannelStream(mpsc::UnboundedReceiver<LifecycleState>);

#[async_trait]
impl LifecycleChangeStream for ChannelStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.0.recv().await
    }
}

#[async_trait]
impl LifecycleObserver for ChannelLifecycle {
    async fn get_state(&self) -> bridge_traits::error::Result<LifecycleState> {
        Ok(LifecycleState::Foreground)
    }

    async fn subscribe_changes(
        &self,
    ) -> bridge_traits::error::Result<Box<dyn LifecycleChangeStream>> {
        let rx = self.rx.lock().take().ok_or_else(|| {
            bridge_traits::BridgeError::NotAvailable("already subscribed".into())
        })?;
        Ok(Box::new(ChannelStream(rx)))
    }
}

#[tokio::test]
async fn test_lifecycle_forwarding() {
    let (player, factory) = spawn(PlayerConfig::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = Arc::new(ChannelLifecycle {
        rx: parking_lot::Mutex::new(Some(rx)),
    });
    let task = player.follow_lifecycle(observer).await.unwrap();

    player.prepare("rtsp://cam1").unwrap();
    player.play().unwrap();
    player.settled().await.unwrap();

    tx.send(LifecycleState::Background).unwrap();
    drop(tx);
    task.await.unwrap();
    player.settled().await.unwrap();
    assert!(!player.state().is_playing);

    player.on_lifecycle(LifecycleState::Foreground).unwrap();
    player.settled().await.unwrap();
    assert!(player.state().is_playing);

    let calls = factory.journal().calls(1);
    assert_eq!(calls[calls.len() - 2..].to_vec(), vec![Call::Pause, Call::Play]);
}
