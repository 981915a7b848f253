//! Capability interfaces implemented by window consumers
//!
//! Each trait covers one independent aspect of a consumer, so callers can
//! depend on exactly the capability they drive.

use ash::vk;

use super::camera::Camera;
use crate::instance::InstanceLock;
use crate::present::PresentResult;
use crate::scheduler::UpdateId;
use crate::video::{VideoMode, VideoModeCompatibility};

/// Open/close lifecycle
pub trait Lifecycle {
    /// Create the window and its presentation surface
    ///
    /// Slow construction runs with the instance lock released; the lock is
    /// held again when this returns.
    fn open(&mut self, lock: &mut InstanceLock<'_>) -> PresentResult<()>;

    /// Stop updates and destroy the window and surface
    fn close(&mut self, lock: &mut InstanceLock<'_>);

    /// Whether a window currently exists
    fn is_open(&self) -> bool;
}

/// Video mode negotiation
pub trait VideoConsumer {
    /// Families of modes this consumer can present right now
    fn video_mode_compatibility(&self) -> &[VideoModeCompatibility];

    /// Take the flag raised whenever the compatibility list changes
    fn poll_compatibility_change(&mut self) -> bool;

    /// Negotiated mode, if any
    fn video_mode(&self) -> Option<&VideoMode>;

    /// Apply a negotiated mode, or `None` to stop presenting
    fn set_video_mode(&mut self, lock: &mut InstanceLock<'_>, mode: Option<VideoMode>) -> PresentResult<()>;
}

/// Rendering target settings
pub trait RendererTarget {
    /// Camera used for layer content
    fn camera(&self) -> &Camera;

    /// Replace the camera
    fn set_camera(&mut self, lock: &mut InstanceLock<'_>, camera: Camera) -> PresentResult<()>;

    /// Depth/stencil attachment format, `UNDEFINED` for none
    fn depth_stencil_format(&self) -> vk::Format;

    /// Change the depth/stencil attachment format
    fn set_depth_stencil_format(&mut self, lock: &mut InstanceLock<'_>, format: vk::Format) -> PresentResult<()>;
}

/// Participation in the instance's periodic update scheduler
pub trait PeriodicUpdate {
    /// Scheduler registration id
    fn update_id(&self) -> UpdateId;

    /// Redraw if anything changed
    fn update(&mut self) -> PresentResult<()>;
}
