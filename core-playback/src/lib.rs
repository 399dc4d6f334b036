//! # Adaptive Playback Engine
//!
//! Drives live video playback without the caller knowing which decoder
//! backend is active.
//!
//! ## Overview
//!
//! This module handles:
//! - The backend adapter contract and the engine-backed adapters
//! - The per-session controller actor and its [`PlayerHandle`]
//! - Runtime backend hot-swap with position and play-state continuity
//! - Render target binding across host surface destroy/recreate cycles
//! - Bounded retry of transient stream failures
//! - The observable [`PlaybackState`] snapshot

pub mod backend;
pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod state;
pub mod surface;
pub mod traits;

pub use backend::{EngineAdapter, EngineAdapterFactory, TuningProfile};
pub use config::PlayerConfig;
pub use error::{PlaybackError, Result};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use session::{PlayerHandle, SessionId};
pub use state::{DisplayMode, ErrorCategory, PlaybackErrorDescriptor, PlaybackState, SessionPhase};
pub use traits::{
    AdapterFactory, BackendAdapter, BackendError, BackendErrorKind, BackendEvent, BackendKind,
    EventSink, PlaybackSource,
};
