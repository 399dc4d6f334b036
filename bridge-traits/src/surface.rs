//! Render targets owned by the host UI.
//!
//! The host view hierarchy creates and destroys drawing surfaces on its own
//! schedule. The core only ever sees them through [`RenderTarget`], which is
//! cheap to clone and compares by native identity.

use std::fmt;
use std::sync::Arc;

use crate::platform::PlatformSendSync;

/// Host drawing surface (an Android `Surface`, a `CAMetalLayer`, a GL
/// texture...).
#[cfg_attr(test, mockall::automock)]
pub trait NativeSurface: PlatformSendSync {
    /// Stable identity of the underlying native object.
    fn id(&self) -> u64;

    /// Return the native object to the host. Called at most once per surface
    /// by the core, after decode output has been detached from it.
    fn release(&self);
}

/// Where decoded frames should be drawn.
#[derive(Clone, Default)]
pub enum RenderTarget {
    /// A window-backed surface (SurfaceView and friends).
    WindowSurface(Arc<dyn NativeSurface>),
    /// An offscreen texture composited by the host (TextureView).
    OffscreenTexture(Arc<dyn NativeSurface>),
    /// No output bound.
    #[default]
    None,
}

impl RenderTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, RenderTarget::None)
    }

    pub fn surface(&self) -> Option<&Arc<dyn NativeSurface>> {
        match self {
            RenderTarget::WindowSurface(s) | RenderTarget::OffscreenTexture(s) => Some(s),
            RenderTarget::None => None,
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.surface().map(|s| s.id())
    }

    /// Release the wrapped native surface, if any.
    pub fn release_native(&self) {
        if let Some(surface) = self.surface() {
            surface.release();
        }
    }
}

impl fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTarget::WindowSurface(s) => write!(f, "WindowSurface(#{})", s.id()),
            RenderTarget::OffscreenTexture(s) => write!(f, "OffscreenTexture(#{})", s.id()),
            RenderTarget::None => f.write_str("None"),
        }
    }
}

impl PartialEq for RenderTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RenderTarget::WindowSurface(a), RenderTarget::WindowSurface(b))
            | (RenderTarget::OffscreenTexture(a), RenderTarget::OffscreenTexture(b)) => {
                a.id() == b.id()
            }
            (RenderTarget::None, RenderTarget::None) => true,
            _ => false,
        }
    }
}

impl Eq for RenderTarget {}
