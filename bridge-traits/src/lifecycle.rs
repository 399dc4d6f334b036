//! Host application lifecycle.

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Visibility state of the host screen hosting the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Screen is visible and interactive
    Foreground,
    /// Screen is hidden (home button, another activity on top)
    Background,
    /// Process is being suspended by the platform
    Suspended,
}

/// Notifies the core about lifecycle transitions of the screen hosting a
/// player.
///
/// # Platform Support
///
/// - **Android**: Activity `onResume` / `onStop`
/// - **iOS**: scene foreground / background notifications
/// - **Desktop**: window minimize / restore
#[async_trait::async_trait]
pub trait LifecycleObserver: PlatformSendSync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait::async_trait]
pub trait LifecycleChangeStream: PlatformSend {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}
