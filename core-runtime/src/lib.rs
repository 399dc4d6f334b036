//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the live TV player core:
//! - Logging and tracing infrastructure
//! - Event bus for session lifecycle notifications
//! - Shared runtime error type
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback crates depend on.
//! It establishes the logging conventions (including stream URL redaction)
//! and the event broadcasting mechanism used by every player session.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventSeverity, EventStream};
