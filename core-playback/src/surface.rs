//! # Surface Binding Manager
//!
//! Owns the session's [`RenderTarget`] and keeps the active adapter bound to
//! it while the host creates and destroys drawing surfaces underneath.
//!
//! Ordering is fixed:
//!
//! - destruction: `pause()`, then `set_render_target(None)`, then the native
//!   surface is released;
//! - creation: `set_render_target(target)`, then `play()` if playback was
//!   interrupted by the destruction.
//!
//! While no surface exists, play requests are parked here and replayed when
//! the next surface arrives.

use bridge_traits::RenderTarget;
use tracing::debug;

use crate::traits::BackendAdapter;

#[derive(Debug, Default)]
pub struct SurfaceBinding {
    target: RenderTarget,
    suspended: bool,
    resume_on_create: bool,
}

impl SurfaceBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// The host destroyed the last surface and has not created a new one.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn has_deferred_play(&self) -> bool {
        self.resume_on_create
    }

    /// Store `target` and bind the adapter to it. Passing
    /// [`RenderTarget::None`] only detaches output.
    ///
    /// Returns `true` when a parked play request was replayed.
    pub fn attach(
        &mut self,
        target: RenderTarget,
        adapter: Option<&mut (dyn BackendAdapter + 'static)>,
    ) -> bool {
        debug!(?target, "binding render target");
        self.target = target;

        let Some(adapter) = adapter else {
            if !self.target.is_none() {
                self.suspended = false;
            }
            return false;
        };

        adapter.set_render_target(&self.target);
        if self.target.is_none() {
            return false;
        }

        let resume = std::mem::take(&mut self.resume_on_create);
        self.suspended = false;
        if resume {
            adapter.play();
        }
        resume
    }

    /// Host destroyed the current surface.
    pub fn detach(
        &mut self,
        was_playing: bool,
        adapter: Option<&mut (dyn BackendAdapter + 'static)>,
    ) {
        let target = std::mem::take(&mut self.target);
        debug!(?target, was_playing, "render target destroyed");

        if let Some(adapter) = adapter {
            adapter.pause();
            adapter.set_render_target(&RenderTarget::None);
        }
        target.release_native();

        self.suspended = true;
        self.resume_on_create |= was_playing;
    }

    /// Remember a play request that arrived while no surface exists.
    pub fn defer_play(&mut self) {
        self.resume_on_create = true;
    }

    pub fn cancel_deferred_play(&mut self) {
        self.resume_on_create = false;
    }

    /// Bind a freshly created adapter to the stored target, if any.
    pub fn rebind(&self, adapter: &mut dyn BackendAdapter) {
        if !self.target.is_none() {
            adapter.set_render_target(&self.target);
        }
    }

    /// Forget the target without releasing it. The host still owns it.
    pub fn clear(&mut self) {
        self.target = RenderTarget::None;
        self.suspended = false;
        self.resume_on_create = false;
    }
}
