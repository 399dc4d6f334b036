//! Native media engine bridge.
//!
//! A [`MediaEngine`] is one host-owned decoder/renderer instance (an
//! ijkplayer, an ExoPlayer, a GStreamer pipeline...). Every call is
//! synchronous and must return promptly; asynchronous outcomes come back
//! through the registered [`NativeListener`], possibly on a decoder-internal
//! thread.
//!
//! The core never talks to an engine directly. Backend adapters in
//! `core-playback` wrap an engine, apply a tuning profile through
//! [`MediaEngine::set_option`], and translate [`NativeEvent`]s into the
//! uniform backend event contract.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{error::Result, platform::PlatformSendSync, surface::RenderTarget};

/// Option namespaces understood by ffmpeg-derived engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionCategory {
    /// Player behaviour (decoder selection, frame dropping, start policy).
    Player,
    /// Demuxer / protocol options (timeouts, probing, transport).
    Format,
    /// Codec options (loop filter, threads).
    Codec,
}

/// Value of a single engine option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Str(v) => f.write_str(v),
        }
    }
}

/// A named tuning option applied to an engine before a source is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOption {
    pub category: OptionCategory,
    pub name: String,
    pub value: OptionValue,
}

impl EngineOption {
    /// Integer-valued option.
    pub fn int(category: OptionCategory, name: impl Into<String>, value: i64) -> Self {
        Self {
            category,
            name: name.into(),
            value: OptionValue::Int(value),
        }
    }

    /// String-valued option.
    pub fn string(
        category: OptionCategory,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            value: OptionValue::Str(value.into()),
        }
    }
}

/// Informational signals raised by the engine while a source is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeInfo {
    BufferingStart,
    BufferingEnd,
    /// The first video frame reached the render target.
    VideoRenderingStart,
    /// Any other engine-specific info code.
    Other(i32),
}

/// Raw callbacks delivered by a native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// The source finished opening (`prepareAsync` completed).
    Prepared,
    Info(NativeInfo),
    /// Engine failure. `what` is the engine's error class, `extra` the
    /// detailed (often ffmpeg) code, zero when absent.
    Error { what: i32, extra: i32 },
    VideoSizeChanged { width: i32, height: i32 },
    /// Track / stream metadata became available.
    Metadata(HashMap<String, String>),
    /// End of stream reached.
    Completion,
    /// The engine was interrupted by the platform (audio focus loss, ...).
    Interrupted,
}

/// Callback registered on an engine. May be invoked from any thread.
pub type NativeListener = Arc<dyn Fn(NativeEvent) + Send + Sync>;

/// Native error codes reported by ffmpeg-based engines.
///
/// `what` values follow the Android `MediaPlayer` constants; `extra` values
/// are negated errno / ffmpeg error tags.
pub mod codes {
    pub const MEDIA_ERROR_UNKNOWN: i32 = 1;
    pub const MEDIA_ERROR_SERVER_DIED: i32 = 100;
    pub const MEDIA_ERROR_IO: i32 = -1004;
    pub const MEDIA_ERROR_MALFORMED: i32 = -1007;
    pub const MEDIA_ERROR_UNSUPPORTED: i32 = -1010;
    pub const MEDIA_ERROR_TIMED_OUT: i32 = -110;
    pub const ERROR_CONNECTION_RESET: i32 = -104;
    pub const ERROR_CONNECTION_REFUSED: i32 = -111;
    pub const ERROR_HTTP_FORBIDDEN: i32 = -858_797_304;
    pub const ERROR_HTTP_NOT_FOUND: i32 = -875_574_520;
}

/// Which kind of native engine a backend wants the host to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineFlavor {
    /// Engine able to drive the platform hardware decode pipeline.
    HardwareAccelerated,
    /// Pure software (ffmpeg) engine.
    Software,
}

/// Host-provided decoder/renderer instance.
///
/// Implementations must tolerate any call order the adapters issue, including
/// `set_surface` before, during and after `prepare_async`. After
/// [`MediaEngine::release`] every other call may fail with
/// [`BridgeError::Released`](crate::error::BridgeError::Released).
pub trait MediaEngine: PlatformSendSync {
    /// Apply a tuning option. Takes effect on the next `prepare_async`.
    fn set_option(&self, option: EngineOption) -> Result<()>;

    /// Register (or clear) the callback receiving [`NativeEvent`]s.
    fn set_listener(&self, listener: Option<NativeListener>);

    /// Drop the current source and return to the idle state.
    fn reset(&self);

    /// Point the engine at a stream URL or file path.
    fn set_data_source(&self, url: &str) -> Result<()>;

    /// Begin opening the data source. Outcome arrives as `Prepared` or `Error`.
    fn prepare_async(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn seek_to(&self, position_ms: i64) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Bind decode output to a render target, or detach with `None`.
    fn set_surface(&self, target: Option<&RenderTarget>) -> Result<()>;

    /// Current playback position in milliseconds.
    fn current_position(&self) -> i64;

    /// Stream duration in milliseconds; zero or negative for live streams.
    fn duration(&self) -> i64;

    fn is_playing(&self) -> bool;

    /// Free every native resource. Terminal.
    fn release(&self);
}

/// Constructs native engines on demand.
pub trait MediaEngineProvider: PlatformSendSync {
    fn create_engine(&self, flavor: EngineFlavor) -> Result<Arc<dyn MediaEngine>>;
}
