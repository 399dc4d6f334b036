//! # Playback Error Types
//!
//! Errors returned across the player API boundary.
//!
//! Failures reported by a backend while a source is opening or playing are
//! not Rust errors: they travel as [`BackendError`](crate::traits::BackendError)
//! values through the event contract and end up, when not recovered, in
//! [`PlaybackState::error`](crate::state::PlaybackState::error).

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur when constructing or commanding a player session.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Configuration failed validation.
    #[error("Invalid player configuration: {0}")]
    InvalidConfig(String),

    /// The requested backend kind is unknown or cannot be built on this host.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// A command was issued after `release()`.
    #[error("Playback session already released")]
    SessionReleased,

    /// A host bridge call failed.
    #[error("Native engine error: {0}")]
    Engine(#[from] BridgeError),
}

impl PlaybackError {
    /// `true` when retrying the same call can never succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackError::SessionReleased | PlaybackError::InvalidConfig(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
