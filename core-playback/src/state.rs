//! # Observable Playback State
//!
//! The snapshot a UI renders from. Only the session actor mutates it; callers
//! read it through [`PlayerHandle::state`](crate::session::PlayerHandle::state)
//! or watch it for changes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::traits::{BackendError, BackendErrorKind, BackendKind, PlaybackSource};

/// Default aspect ratio before the stream reports a resolution.
pub const DEFAULT_ASPECT_RATIO: f32 = 16.0 / 9.0;

// ============================================================================
// Display mode
// ============================================================================

/// How the video frame is fitted into the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Native aspect ratio, letterboxed.
    #[default]
    Original,
    /// Stretch to the target.
    Fill,
    /// Fill the target, cropping overflow.
    Crop,
    FourThree,
    SixteenNine,
    /// 2.35:1 cinema.
    WideCinema,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 6] = [
        DisplayMode::Original,
        DisplayMode::Fill,
        DisplayMode::Crop,
        DisplayMode::FourThree,
        DisplayMode::SixteenNine,
        DisplayMode::WideCinema,
    ];

    /// Stable integer code used by persisted settings.
    pub fn value(&self) -> i32 {
        match self {
            DisplayMode::Original => 0,
            DisplayMode::Fill => 1,
            DisplayMode::Crop => 2,
            DisplayMode::FourThree => 3,
            DisplayMode::SixteenNine => 4,
            DisplayMode::WideCinema => 5,
        }
    }

    /// Unknown codes fall back to [`DisplayMode::Original`].
    pub fn from_value(value: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|mode| mode.value() == value)
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayMode::Original => "Original",
            DisplayMode::Fill => "Fill",
            DisplayMode::Crop => "Crop",
            DisplayMode::FourThree => "4:3",
            DisplayMode::SixteenNine => "16:9",
            DisplayMode::WideCinema => "2.35:1",
        }
    }

    /// Fixed frame ratio imposed by the mode, if any.
    pub fn forced_ratio(&self) -> Option<f32> {
        match self {
            DisplayMode::FourThree => Some(4.0 / 3.0),
            DisplayMode::SixteenNine => Some(16.0 / 9.0),
            DisplayMode::WideCinema => Some(2.35),
            _ => None,
        }
    }
}

// ============================================================================
// Session phase
// ============================================================================

/// Coarse session state machine.
///
/// ```text
/// Idle -> Preparing -> Playing <-> Buffering
///                        |  ^
///                        v  |
///                       Paused
/// any -> Stopped, any (but Idle/Stopped) -> Error -> Preparing (retry)
/// any -> Released (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Preparing,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Error,
    Released,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Released)
    }
}

// ============================================================================
// Error descriptor
// ============================================================================

/// Where in the session lifecycle a surfaced failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The source could not be opened.
    PrepareFailure,
    /// Failure during active playback.
    PlaybackFailure,
    /// The engine itself crashed.
    BackendFault,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::PrepareFailure => "prepare_failure",
            ErrorCategory::PlaybackFailure => "playback_failure",
            ErrorCategory::BackendFault => "backend_fault",
        }
    }
}

/// Terminal error exposed to the UI. Displays as `Kind(code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackErrorDescriptor {
    pub category: ErrorCategory,
    pub kind: BackendErrorKind,
    pub native_code: i32,
    pub message: String,
}

impl PlaybackErrorDescriptor {
    pub fn from_backend(category: ErrorCategory, error: &BackendError) -> Self {
        Self {
            category,
            kind: error.kind,
            native_code: error.native_code,
            message: error.message.clone(),
        }
    }
}

impl fmt::Display for PlaybackErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.native_code)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Externally readable playback snapshot.
///
/// `error.is_some()` implies `!is_playing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub phase: SessionPhase,
    pub backend: BackendKind,
    pub source: Option<PlaybackSource>,
    pub display_mode: DisplayMode,
    /// Width over height, always positive.
    pub aspect_ratio: f32,
    pub error: Option<PlaybackErrorDescriptor>,
    pub is_buffering: bool,
    pub is_playing: bool,
    /// Milliseconds. Zero or negative for live, non-seekable streams.
    pub duration_ms: i64,
    pub current_position_ms: i64,
    pub resolution: Option<(u32, u32)>,
    pub metadata: HashMap<String, String>,
    /// Automatic retry currently in flight, zero when healthy.
    pub retry_attempt: u32,
}

impl PlaybackState {
    pub fn new(backend: BackendKind, display_mode: DisplayMode) -> Self {
        Self {
            phase: SessionPhase::Idle,
            backend,
            source: None,
            display_mode,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            error: None,
            is_buffering: false,
            is_playing: false,
            duration_ms: 0,
            current_position_ms: 0,
            resolution: None,
            metadata: HashMap::new(),
            retry_attempt: 0,
        }
    }

    /// Live streams report no usable duration.
    pub fn is_live(&self) -> bool {
        self.duration_ms <= 0
    }

    pub fn is_seekable(&self) -> bool {
        !self.is_live()
    }

    /// Apply a reported video size. Non-positive dimensions are ignored.
    pub fn apply_resolution(&mut self, width: i32, height: i32) -> bool {
        if width <= 0 || height <= 0 {
            return false;
        }
        self.resolution = Some((width as u32, height as u32));
        self.aspect_ratio = width as f32 / height as f32;
        true
    }

    /// Ratio the UI should lay the frame out with.
    pub fn effective_aspect_ratio(&self) -> f32 {
        self.display_mode
            .forced_ratio()
            .unwrap_or(self.aspect_ratio)
    }
}
