//! Swapchain parameter selection
//!
//! Pure functions over surface capabilities, kept apart from the Vulkan
//! calls so the selection rules can be tested without a device.

use ash::vk;

use super::{PresentError, PresentResult};

/// Extent value meaning "whatever the surface currently is"
pub const EXTENT_DONT_CARE: u32 = u32::MAX;

/// Clamp `requested` into the surface's supported range
///
/// A requested dimension of [`EXTENT_DONT_CARE`] takes the surface's current
/// extent instead.
pub fn choose_extent(requested: vk::Extent2D, caps: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    let requested = vk::Extent2D {
        width: if requested.width == EXTENT_DONT_CARE { caps.current_extent.width } else { requested.width },
        height: if requested.height == EXTENT_DONT_CARE { caps.current_extent.height } else { requested.height },
    };
    vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width.max(caps.min_image_extent.width)),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height.max(caps.min_image_extent.height)),
    }
}

/// One image more than the minimum, bounded by the maximum (0 = unbounded)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Require the exact `(format, color_space)` pair
pub fn choose_surface_format(
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    supported: &[vk::SurfaceFormatKHR],
) -> PresentResult<vk::SurfaceFormatKHR> {
    supported
        .iter()
        .copied()
        .find(|candidate| candidate.format == format && candidate.color_space == color_space)
        .ok_or(PresentError::UnsupportedFormat { format, color_space })
}

/// Mailbox if available, otherwise FIFO
pub fn choose_present_mode(supported: &[vk::PresentModeKHR]) -> PresentResult<vk::PresentModeKHR> {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO]
        .into_iter()
        .find(|mode| supported.contains(mode))
        .ok_or(PresentError::NoPresentMode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D { width: 1024, height: 768 },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2160 },
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_is_clamped() {
        let extent = choose_extent(vk::Extent2D { width: 8000, height: 8 }, &caps());
        assert_eq!(extent, vk::Extent2D { width: 4096, height: 16 });

        let extent = choose_extent(vk::Extent2D { width: 1280, height: 720 }, &caps());
        assert_eq!(extent, vk::Extent2D { width: 1280, height: 720 });
    }

    #[test]
    fn test_dont_care_uses_current_extent() {
        let requested = vk::Extent2D { width: EXTENT_DONT_CARE, height: EXTENT_DONT_CARE };
        assert_eq!(choose_extent(requested, &caps()), vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&caps()), 3);

        let mut tight = caps();
        tight.max_image_count = 2;
        assert_eq!(choose_image_count(&tight), 2);

        let mut unbounded = caps();
        unbounded.max_image_count = 0;
        assert_eq!(choose_image_count(&unbounded), 3);
    }

    #[test]
    fn test_surface_format_requires_exact_pair() {
        let supported = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert!(choose_surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR, &supported).is_ok());

        let mismatch = choose_surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::HDR10_ST2084_EXT, &supported);
        assert!(matches!(mismatch, Err(PresentError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_present_mode_preference() {
        let all = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&all).unwrap(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]).unwrap(), vk::PresentModeKHR::FIFO);
        assert!(matches!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            Err(PresentError::NoPresentMode)
        ));
    }
}
