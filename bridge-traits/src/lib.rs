//! # Host Bridge Traits
//!
//! Platform abstraction traits implemented by each host embedding the live
//! TV player core.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform-specific native pieces it drives: decoder engines, drawing
//! surfaces, lifecycle notifications and log sinks. Each trait represents a
//! capability the core requires but that must be implemented differently per
//! platform.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaEngine`](engine::MediaEngine) - One native decoder/renderer instance
//! - [`MediaEngineProvider`](engine::MediaEngineProvider) - Constructs engines per flavor
//! - [`NativeSurface`](surface::NativeSurface) - Host drawing surface behind a [`RenderTarget`]
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - Screen foreground/background transitions
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing, e.g. a [`MediaEngineProvider`] that cannot build the requested
//! [`EngineFlavor`] returns [`BridgeError::NotAvailable`] and playback setup
//! is aborted instead of silently degrading.
//!
//! ## Thread Safety
//!
//! Native engines call back on decoder-internal threads. All bridge traits
//! therefore require `Send + Sync` through [`PlatformSendSync`](platform::PlatformSendSync).

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod platform;
pub mod surface;

pub use error::BridgeError;

// Re-export commonly used types
pub use engine::{
    codes, EngineFlavor, EngineOption, MediaEngine, MediaEngineProvider, NativeEvent, NativeInfo,
    NativeListener, OptionCategory, OptionValue,
};
pub use lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use surface::{NativeSurface, RenderTarget};
