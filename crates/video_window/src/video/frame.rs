//! Interfaces to the frame-producing side of the pipeline

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use super::{AspectRatio, Resolution};
use crate::present::geometry::ScalingFilter;

/// A decoded video frame resident on the GPU
///
/// Frames are shared and read-only. The presentation surface keeps the last
/// drawn frame alive until the GPU has finished with it.
pub trait Frame: Send + Sync {
    /// Size in pixels
    fn resolution(&self) -> Resolution;

    /// Shape of one pixel
    fn pixel_aspect_ratio(&self) -> AspectRatio {
        AspectRatio::SQUARE
    }

    /// Descriptor set (set 1) sampling this frame with `filter`
    fn descriptor_set(&self, filter: ScalingFilter) -> vk::DescriptorSet;
}

/// Upstream supplier of frames
pub trait FrameSource: Send {
    /// Whether a frame newer than the last pulled one is available
    fn has_changed(&self) -> bool;

    /// Most recent frame, if any
    fn pull(&mut self) -> Option<Arc<dyn Frame>>;
}

/// What a layer gets to record its draw commands
#[derive(Debug, Clone, Copy)]
pub struct LayerContext {
    /// Command buffer inside the presentation render pass
    pub command_buffer: vk::CommandBuffer,
    /// Render pass being recorded
    pub render_pass: vk::RenderPass,
    /// Target extent
    pub extent: vk::Extent2D,
    /// Camera projection
    pub projection: Matrix4<f32>,
}

/// Externally rendered content drawn by the layer renderer
pub trait Layer: Send + Sync {
    /// Whether the layer needs to be redrawn
    fn has_changed(&self) -> bool;

    /// Record draw commands
    fn record(&self, context: &LayerContext);
}
