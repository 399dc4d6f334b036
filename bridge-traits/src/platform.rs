//! Marker traits that keep bridge trait bounds aligned with the threading
//! guarantees of the host.
//!
//! Native engines deliver callbacks on decoder-internal threads, so every
//! bridge object handed to the core must be shareable across threads. The
//! helpers below spell that bound once instead of on every trait.

/// Marker trait applying `Send + Sync` to bridge implementations.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait equivalent to `Send`.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
