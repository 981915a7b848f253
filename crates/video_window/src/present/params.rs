//! Reconfiguration parameters and the rebuild dependency table
//!
//! Comparing two [`ReconfigureParams`] yields a [`Modifications`] set; the
//! set is closed under the cascade rules and then executed step by step in
//! [`REBUILD_ORDER`].

use ash::vk;
use bitflags::bitflags;

use crate::video::format::ColorTransfer;

/// What kind of content a surface draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceVariant {
    /// Fixed pipeline drawing one scaled frame
    Scaler,
    /// External layers draw into the render pass
    Layers,
}

/// Everything that decides the shape of the presentation objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconfigureParams {
    /// Swapchain extent
    pub extent: vk::Extent2D,
    /// Swapchain image format
    pub color_format: vk::Format,
    /// Swapchain colour space
    pub color_space: vk::ColorSpaceKHR,
    /// Transfer function handling
    pub color_transfer: ColorTransfer,
    /// Depth/stencil attachment format, `UNDEFINED` for none
    pub depth_stencil_format: vk::Format,
}

impl ReconfigureParams {
    /// No mode negotiated
    pub fn unset() -> Self {
        Self {
            extent: vk::Extent2D { width: 0, height: 0 },
            color_format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            color_transfer: ColorTransfer::default(),
            depth_stencil_format: vk::Format::UNDEFINED,
        }
    }

    /// Whether these parameters describe no drawable surface
    pub fn is_unset(&self) -> bool {
        self.extent.width == 0 || self.extent.height == 0 || self.color_format == vk::Format::UNDEFINED
    }

    /// Whether a depth/stencil attachment is requested
    pub fn has_depth_stencil(&self) -> bool {
        self.depth_stencil_format != vk::Format::UNDEFINED
    }
}

impl Default for ReconfigureParams {
    fn default() -> Self {
        Self::unset()
    }
}

bitflags! {
    /// Pending rebuild steps
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifications: u32 {
        /// Recreate the swapchain and its image views
        const SWAPCHAIN = 1 << 0;
        /// Recreate the render pass
        const RENDER_PASS = 1 << 1;
        /// Recreate framebuffers and depth buffers
        const FRAMEBUFFERS = 1 << 2;
        /// Recreate the graphics pipeline
        const PIPELINE = 1 << 3;
        /// Rebuild the clear value list
        const CLEAR_VALUES = 1 << 4;
        /// Update viewport size and projection
        const VIEWPORT = 1 << 5;
        /// Update the colour transfer uniform
        const COLOR_TRANSFER = 1 << 6;
    }
}

/// One rebuild step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RebuildStep {
    /// Swapchain and image views
    Swapchain,
    /// Render pass
    RenderPass,
    /// Depth buffers and framebuffers
    Framebuffers,
    /// Graphics pipeline
    Pipeline,
    /// Clear values
    ClearValues,
    /// Viewport uniforms
    Viewport,
    /// Transfer uniforms
    ColorTransfer,
}

/// Steps in execution order, with the flag that triggers each
pub const REBUILD_ORDER: [(Modifications, RebuildStep); 7] = [
    (Modifications::SWAPCHAIN, RebuildStep::Swapchain),
    (Modifications::RENDER_PASS, RebuildStep::RenderPass),
    (Modifications::FRAMEBUFFERS, RebuildStep::Framebuffers),
    (Modifications::PIPELINE, RebuildStep::Pipeline),
    (Modifications::CLEAR_VALUES, RebuildStep::ClearValues),
    (Modifications::VIEWPORT, RebuildStep::Viewport),
    (Modifications::COLOR_TRANSFER, RebuildStep::ColorTransfer),
];

impl SurfaceVariant {
    /// Flags raised by an extent change
    ///
    /// The scaler bakes the viewport into its pipeline, so its render pass
    /// family is rebuilt as well.
    pub fn extent_modifications(self) -> Modifications {
        match self {
            Self::Scaler => Modifications::SWAPCHAIN | Modifications::RENDER_PASS | Modifications::VIEWPORT,
            Self::Layers => Modifications::SWAPCHAIN | Modifications::VIEWPORT,
        }
    }

    /// Flags raised by a colour transfer change
    pub fn color_transfer_modifications(self) -> Modifications {
        match self {
            Self::Scaler => Modifications::COLOR_TRANSFER,
            Self::Layers => Modifications::RENDER_PASS,
        }
    }

    /// Direct consequences of changing from `old` to `new`
    pub fn modifications(self, old: &ReconfigureParams, new: &ReconfigureParams) -> Modifications {
        let mut flags = Modifications::empty();
        if old.extent != new.extent {
            flags |= self.extent_modifications();
        }
        if old.color_format != new.color_format {
            flags |= Modifications::SWAPCHAIN | Modifications::RENDER_PASS;
        }
        if old.color_space != new.color_space {
            flags |= Modifications::SWAPCHAIN;
        }
        if old.color_transfer != new.color_transfer {
            flags |= self.color_transfer_modifications();
        }
        if old.depth_stencil_format != new.depth_stencil_format {
            flags |= Modifications::RENDER_PASS | Modifications::CLEAR_VALUES;
        }
        flags
    }
}

/// Close `flags` under the object dependencies
///
/// New image views need new framebuffers; a new render pass invalidates
/// framebuffers and the pipeline built against it.
pub fn cascade(mut flags: Modifications) -> Modifications {
    if flags.contains(Modifications::SWAPCHAIN) {
        flags |= Modifications::FRAMEBUFFERS;
    }
    if flags.contains(Modifications::RENDER_PASS) {
        flags |= Modifications::FRAMEBUFFERS | Modifications::PIPELINE;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::ColorTransferFunction;

    fn base() -> ReconfigureParams {
        ReconfigureParams {
            extent: vk::Extent2D { width: 1280, height: 720 },
            color_format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            color_transfer: ColorTransfer::default(),
            depth_stencil_format: vk::Format::UNDEFINED,
        }
    }

    #[test]
    fn test_identical_params_need_nothing() {
        assert!(SurfaceVariant::Scaler.modifications(&base(), &base()).is_empty());
        assert!(SurfaceVariant::Layers.modifications(&base(), &base()).is_empty());
    }

    #[test]
    fn test_color_space_only_rebuilds_swapchain() {
        let mut new = base();
        new.color_space = vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT;
        let flags = cascade(SurfaceVariant::Scaler.modifications(&base(), &new));
        assert_eq!(flags, Modifications::SWAPCHAIN | Modifications::FRAMEBUFFERS);
        assert!(!flags.contains(Modifications::RENDER_PASS));
        assert!(!flags.contains(Modifications::PIPELINE));
    }

    #[test]
    fn test_dependency_table() {
        let transfer = ColorTransfer { function: ColorTransferFunction::Srgb, encode_in_shader: true };
        let cases: [(fn(&mut ReconfigureParams), Modifications, Modifications); 5] = [
            (
                |p| p.extent = vk::Extent2D { width: 1920, height: 1080 },
                Modifications::SWAPCHAIN | Modifications::RENDER_PASS | Modifications::VIEWPORT,
                Modifications::SWAPCHAIN | Modifications::VIEWPORT,
            ),
            (
                |p| p.color_format = vk::Format::R8G8B8A8_SRGB,
                Modifications::SWAPCHAIN | Modifications::RENDER_PASS,
                Modifications::SWAPCHAIN | Modifications::RENDER_PASS,
            ),
            (
                |p| p.color_space = vk::ColorSpaceKHR::HDR10_ST2084_EXT,
                Modifications::SWAPCHAIN,
                Modifications::SWAPCHAIN,
            ),
            (
                |p| p.color_transfer.encode_in_shader = true,
                Modifications::COLOR_TRANSFER,
                Modifications::RENDER_PASS,
            ),
            (
                |p| p.depth_stencil_format = vk::Format::D32_SFLOAT,
                Modifications::RENDER_PASS | Modifications::CLEAR_VALUES,
                Modifications::RENDER_PASS | Modifications::CLEAR_VALUES,
            ),
        ];

        for (change, scaler, layers) in cases {
            let mut new = base();
            change(&mut new);
            assert_eq!(SurfaceVariant::Scaler.modifications(&base(), &new), scaler);
            assert_eq!(SurfaceVariant::Layers.modifications(&base(), &new), layers);
        }

        let mut all = base();
        all.extent = vk::Extent2D { width: 640, height: 480 };
        all.color_format = vk::Format::R8G8B8A8_UNORM;
        all.color_space = vk::ColorSpaceKHR::BT709_NONLINEAR_EXT;
        all.color_transfer = transfer;
        all.depth_stencil_format = vk::Format::D24_UNORM_S8_UINT;
        assert_eq!(cascade(SurfaceVariant::Scaler.modifications(&base(), &all)), Modifications::all());
    }

    #[test]
    fn test_cascade_rules() {
        assert_eq!(
            cascade(Modifications::RENDER_PASS),
            Modifications::RENDER_PASS | Modifications::FRAMEBUFFERS | Modifications::PIPELINE
        );
        assert_eq!(cascade(Modifications::VIEWPORT), Modifications::VIEWPORT);
    }

    #[test]
    fn test_unset_detection() {
        assert!(ReconfigureParams::unset().is_unset());
        assert!(!base().is_unset());
        let mut zero = base();
        zero.extent.height = 0;
        assert!(zero.is_unset());
    }

    #[test]
    fn test_rebuild_order_covers_every_flag() {
        let covered = REBUILD_ORDER
            .iter()
            .fold(Modifications::empty(), |acc, (flag, _)| acc | *flag);
        assert_eq!(covered, Modifications::all());
    }
}
