//! Presentation surfaces
//!
//! A [`PresentationSurface`] is the open state of a window consumer: the
//! native window plus every GPU object needed to show frames in it. The GPU
//! side sits behind the [`GraphicsBackend`] trait; [`vulkan`] provides the
//! real implementation.

pub mod backend;
pub mod geometry;
pub mod params;
pub mod surface;
pub mod swapchain;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

use ash::vk;
use thiserror::Error;

use crate::toolkit::ToolkitError;

pub use backend::{AcquireOutcome, BackendFactory, DrawContent, GraphicsBackend};
pub use geometry::{ScalingFilter, ScalingMode};
pub use params::{Modifications, ReconfigureParams, SurfaceVariant};
pub use surface::PresentationSurface;

/// Presentation errors
#[derive(Error, Debug)]
pub enum PresentError {
    /// Vulkan API error
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Device or instance setup failed
    #[error("Vulkan initialization failed: {0}")]
    Initialization(String),

    /// The window could not get a Vulkan surface
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The graphics queue cannot present to this surface
    #[error("Surface is not supported by the presentation queue family")]
    SurfaceUnsupported,

    /// The surface does not offer the requested format/colour-space pair
    #[error("Surface format {format:?} with colour space {color_space:?} is not supported")]
    UnsupportedFormat {
        /// Requested format
        format: vk::Format,
        /// Requested colour space
        color_space: vk::ColorSpaceKHR,
    },

    /// Neither mailbox nor FIFO presentation is available
    #[error("No compatible present mode")]
    NoPresentMode,

    /// No memory type satisfies a buffer's requirements
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader file missing or invalid
    #[error("Shader loading failed: {0}")]
    Shader(String),

    /// Image acquisition kept reporting a stale swapchain
    #[error("Swapchain image acquisition still failing after {0} swapchain recreations")]
    AcquisitionFailed(u32),

    /// Toolkit failure while creating the window or surface
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
}

impl From<vk::Result> for PresentError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for presentation operations
pub type PresentResult<T> = Result<T, PresentError>;
