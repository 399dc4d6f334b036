//! Workspace facade crate.
//!
//! Host applications depend on `livetv-workspace` to pull in the playback
//! engine together with the runtime and bridge crates it is built on, without
//! wiring each crate individually.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{
    BackendKind, DisplayMode, PlaybackSource, PlaybackState, PlayerConfig, PlayerHandle,
};
