//! The GPU side of a presentation surface
//!
//! [`PresentationSurface`](super::PresentationSurface) decides *what* to
//! rebuild and when; a [`GraphicsBackend`] owns the objects and knows *how*.

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use super::geometry::QuadVertex;
use super::params::{ReconfigureParams, SurfaceVariant};
use super::PresentResult;
use crate::video::format::ColorTransfer;
use crate::video::Layer;
use crate::window::WindowHandle;

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image ready to render into
    Ready(u32),
    /// Swapchain still works but no longer matches the surface
    Suboptimal,
    /// Swapchain unusable until recreated
    OutOfDate,
}

/// What to draw inside the render pass
#[derive(Clone, Copy)]
pub enum DrawContent<'a> {
    /// Nothing: the cleared image is presented
    Empty,
    /// The scaler quad sampling this descriptor set
    Quad {
        /// Frame descriptor set (set 1)
        descriptor_set: vk::DescriptorSet,
    },
    /// Externally rendered layers, in order
    Layers(&'a [Arc<dyn Layer>]),
}

impl DrawContent<'_> {
    /// Whether any draw command will be recorded
    pub fn draws(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Quad { .. } => true,
            Self::Layers(layers) => !layers.is_empty(),
        }
    }
}

impl std::fmt::Debug for DrawContent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Quad { descriptor_set } => f.debug_struct("Quad").field("descriptor_set", descriptor_set).finish(),
            Self::Layers(layers) => write!(f, "Layers({})", layers.len()),
        }
    }
}

/// GPU objects of one presentation surface
///
/// Methods are only called by the surface, in the order its rebuild table
/// dictates and with the previous frame's fence already waited.
pub trait GraphicsBackend {
    /// Format/colour-space pairs the surface can present
    fn supported_surface_formats(&self) -> PresentResult<Vec<vk::SurfaceFormatKHR>>;

    /// Block until the in-flight frame has finished on the GPU
    fn wait_for_frame(&mut self) -> PresentResult<()>;

    /// Recreate swapchain and image views, returning the extent actually used
    fn recreate_swapchain(&mut self, params: &ReconfigureParams) -> PresentResult<vk::Extent2D>;

    /// Recreate the render pass
    fn recreate_render_pass(&mut self, params: &ReconfigureParams) -> PresentResult<()>;

    /// Recreate depth buffers and framebuffers
    fn recreate_framebuffers(&mut self, params: &ReconfigureParams) -> PresentResult<()>;

    /// Recreate the graphics pipeline
    fn recreate_pipeline(&mut self, params: &ReconfigureParams) -> PresentResult<()>;

    /// Upload viewport size and projection
    fn update_viewport(&mut self, extent: vk::Extent2D, projection: &Matrix4<f32>) -> PresentResult<()>;

    /// Upload transfer function handling
    fn update_color_transfer(&mut self, transfer: ColorTransfer) -> PresentResult<()>;

    /// Upload the quad vertices
    fn update_geometry(&mut self, vertices: &[QuadVertex; 4]) -> PresentResult<()>;

    /// Destroy swapchain, render pass and framebuffers, keeping the rest
    fn release_targets(&mut self);

    /// Acquire the next swapchain image
    fn acquire_image(&mut self) -> PresentResult<AcquireOutcome>;

    /// Record the frame's command buffer
    fn record(&mut self, image_index: u32, clear_values: &[vk::ClearValue], content: DrawContent<'_>)
        -> PresentResult<()>;

    /// Submit the recorded commands and queue the image for presentation
    fn submit_and_present(&mut self, image_index: u32) -> PresentResult<()>;
}

/// Creates backends for freshly opened windows
pub trait BackendFactory {
    /// Backend type produced
    type Backend: GraphicsBackend;

    /// Create the long-lived objects (surface, command pool, buffers,
    /// descriptors, sync primitives) for `window`
    fn create(&self, window: &WindowHandle, variant: SurfaceVariant) -> PresentResult<Self::Backend>;
}
