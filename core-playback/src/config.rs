//! # Player Configuration
//!
//! Inputs the host hands to a session: backend selection, network timeouts,
//! decode policy, display defaults and retry tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::state::DisplayMode;
use crate::traits::BackendKind;

/// Session configuration.
///
/// ```
/// use core_playback::{BackendKind, PlayerConfig};
///
/// let config: PlayerConfig = serde_json::from_str(r#"{"backend_kind":"hardware_pipeline"}"#).unwrap();
/// assert_eq!(config.backend_kind, BackendKind::HardwarePipeline);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Adapter variant a new session starts with.
    ///
    /// Default: `SoftwareTolerant`, the most forgiving engine for live feeds.
    #[serde(default = "default_backend_kind")]
    pub backend_kind: BackendKind,

    /// Backend to switch to when the active one faults. `None` surfaces the
    /// fault as an error instead.
    #[serde(default)]
    pub fallback_backend: Option<BackendKind>,

    /// Network open/read timeout passed to the engine.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: Duration,

    /// Disable hardware decoding even on the hardware pipeline.
    #[serde(default)]
    pub force_software_decode: bool,

    /// Display mode applied initially and whenever the stream becomes ready.
    #[serde(default)]
    pub default_display_mode: DisplayMode,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// How often prepared adapters report position and duration.
    ///
    /// Default: 1 second.
    #[serde(default = "default_position_poll_interval")]
    pub position_poll_interval: Duration,

    /// Capacity of the session event bus.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend_kind: default_backend_kind(),
            fallback_backend: None,
            load_timeout: default_load_timeout(),
            force_software_decode: false,
            default_display_mode: DisplayMode::default(),
            retry: RetryPolicy::default(),
            position_poll_interval: default_position_poll_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PlayerConfig {
    /// Hardware decode first, falling back to the software engine on faults.
    pub fn hardware_with_fallback() -> Self {
        Self {
            backend_kind: BackendKind::HardwarePipeline,
            fallback_backend: Some(BackendKind::SoftwareTolerant),
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend_kind = kind;
        self
    }

    pub fn with_fallback(mut self, kind: BackendKind) -> Self {
        self.fallback_backend = Some(kind);
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_force_software_decode(mut self, force: bool) -> Self {
        self.force_software_decode = force;
        self
    }

    pub fn with_default_display_mode(mut self, mode: DisplayMode) -> Self {
        self.default_display_mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = interval;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.load_timeout.is_zero() {
            return Err("load_timeout must be > 0".to_string());
        }

        if self.position_poll_interval.is_zero() {
            return Err("position_poll_interval must be > 0".to_string());
        }

        if self.event_buffer == 0 {
            return Err("event_buffer must be > 0".to_string());
        }

        if self.fallback_backend == Some(self.backend_kind) {
            return Err("fallback_backend must differ from backend_kind".to_string());
        }

        self.retry.validate()
    }

    /// Load timeout in microseconds, as ffmpeg protocol options expect.
    pub fn load_timeout_micros(&self) -> i64 {
        i64::try_from(self.load_timeout.as_micros()).unwrap_or(i64::MAX)
    }
}

fn default_backend_kind() -> BackendKind {
    BackendKind::SoftwareTolerant
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_position_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_event_buffer() -> usize {
    core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE
}
