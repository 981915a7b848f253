//! Mapping between video modes and presentable surface formats
//!
//! Given what the surface supports, pick the `(vk::Format,
//! vk::ColorSpaceKHR)` pair that shows a [`VideoMode`] correctly and work out
//! whether the transfer function is applied by the hardware (`*_SRGB`
//! formats) or must be encoded in the fragment shader.

use ash::vk;

use super::{
    AspectRatio, ColorFormat, ColorModel, ColorPrimaries, ColorRange, ColorSubsampling, ColorTransferFunction, Limit,
    Resolution, VideoMode, VideoModeCompatibility,
};

/// How the presentation shader treats the transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorTransfer {
    /// Transfer function of the surface colour space
    pub function: ColorTransferFunction,
    /// Whether the shader must encode `function` itself
    pub encode_in_shader: bool,
}

/// Result of matching a video mode against the supported surface formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizedFormat {
    /// Swapchain image format
    pub format: vk::Format,
    /// Swapchain colour space
    pub color_space: vk::ColorSpaceKHR,
    /// Shader-side transfer handling
    pub transfer: ColorTransfer,
}

/// Vulkan formats able to hold `format`, hardware-encoded variants first
fn candidate_formats(format: ColorFormat) -> &'static [vk::Format] {
    match format {
        ColorFormat::R8G8B8A8 => &[vk::Format::R8G8B8A8_SRGB, vk::Format::R8G8B8A8_UNORM],
        ColorFormat::B8G8R8A8 => &[vk::Format::B8G8R8A8_SRGB, vk::Format::B8G8R8A8_UNORM],
        ColorFormat::A2B10G10R10 => &[vk::Format::A2B10G10R10_UNORM_PACK32],
        ColorFormat::R16G16B16A16 => &[vk::Format::R16G16B16A16_UNORM],
        ColorFormat::R16G16B16A16Sfloat => &[vk::Format::R16G16B16A16_SFLOAT],
    }
}

/// Whether the hardware applies the sRGB curve when writing `format`
fn is_srgb_format(format: vk::Format) -> bool {
    matches!(format, vk::Format::R8G8B8A8_SRGB | vk::Format::B8G8R8A8_SRGB)
}

/// Describe a Vulkan surface format in video terms
pub fn describe_format(format: vk::Format) -> Option<ColorFormat> {
    match format {
        vk::Format::R8G8B8A8_SRGB | vk::Format::R8G8B8A8_UNORM => Some(ColorFormat::R8G8B8A8),
        vk::Format::B8G8R8A8_SRGB | vk::Format::B8G8R8A8_UNORM => Some(ColorFormat::B8G8R8A8),
        vk::Format::A2B10G10R10_UNORM_PACK32 => Some(ColorFormat::A2B10G10R10),
        vk::Format::R16G16B16A16_UNORM => Some(ColorFormat::R16G16B16A16),
        vk::Format::R16G16B16A16_SFLOAT => Some(ColorFormat::R16G16B16A16Sfloat),
        _ => None,
    }
}

/// Colour space presenting `primaries` with `transfer`
pub fn color_space_for(primaries: ColorPrimaries, transfer: ColorTransferFunction) -> Option<vk::ColorSpaceKHR> {
    use ColorPrimaries as P;
    use ColorTransferFunction as T;

    match (primaries, transfer) {
        (P::Bt709, T::Srgb) => Some(vk::ColorSpaceKHR::SRGB_NONLINEAR),
        (P::Bt709, T::Linear) => Some(vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        (P::Bt709, T::Bt1886) => Some(vk::ColorSpaceKHR::BT709_NONLINEAR_EXT),
        (P::Bt2020, T::Linear) => Some(vk::ColorSpaceKHR::BT2020_LINEAR_EXT),
        (P::Bt2020, T::Pq) => Some(vk::ColorSpaceKHR::HDR10_ST2084_EXT),
        (P::DisplayP3, T::Srgb) => Some(vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        (P::DisplayP3, T::Linear) => Some(vk::ColorSpaceKHR::DISPLAY_P3_LINEAR_EXT),
        (P::AdobeRgb, T::Linear) => Some(vk::ColorSpaceKHR::ADOBERGB_LINEAR_EXT),
        _ => None,
    }
}

/// Inverse of [`color_space_for`]
pub fn describe_color_space(color_space: vk::ColorSpaceKHR) -> Option<(ColorPrimaries, ColorTransferFunction)> {
    use ColorPrimaries as P;
    use ColorTransferFunction as T;

    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some((P::Bt709, T::Srgb)),
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => Some((P::Bt709, T::Linear)),
        vk::ColorSpaceKHR::BT709_NONLINEAR_EXT => Some((P::Bt709, T::Bt1886)),
        vk::ColorSpaceKHR::BT2020_LINEAR_EXT => Some((P::Bt2020, T::Linear)),
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => Some((P::Bt2020, T::Pq)),
        vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT => Some((P::DisplayP3, T::Srgb)),
        vk::ColorSpaceKHR::DISPLAY_P3_LINEAR_EXT => Some((P::DisplayP3, T::Linear)),
        vk::ColorSpaceKHR::ADOBERGB_LINEAR_EXT => Some((P::AdobeRgb, T::Linear)),
        _ => None,
    }
}

/// Choose the surface format for `mode` among `supported`
///
/// Hardware sRGB encoding is preferred over shader encoding. Returns `None`
/// when the surface cannot present the mode's primaries/transfer pair in a
/// format holding its pixel layout.
pub fn optimize(mode: &VideoMode, supported: &[vk::SurfaceFormatKHR]) -> Option<OptimizedFormat> {
    let color_space = color_space_for(mode.color_primaries, mode.color_transfer_function)?;

    candidate_formats(mode.color_format)
        .iter()
        .copied()
        .find(|candidate| {
            supported
                .iter()
                .any(|s| s.format == *candidate && s.color_space == color_space)
        })
        .map(|format| {
            let function = mode.color_transfer_function;
            let hardware = is_srgb_format(format) && function == ColorTransferFunction::Srgb;
            OptimizedFormat {
                format,
                color_space,
                transfer: ColorTransfer {
                    function,
                    encode_in_shader: !hardware && function != ColorTransferFunction::Linear,
                },
            }
        })
}

/// Modes presentable on a surface with `supported` formats at `resolution`
///
/// Empty when the resolution is degenerate (e.g. a minimized window) or no
/// supported format is understood.
pub fn compatibility_list(supported: &[vk::SurfaceFormatKHR], resolution: Resolution) -> Vec<VideoModeCompatibility> {
    if resolution.is_empty() {
        return Vec::new();
    }

    let mut list: Vec<VideoModeCompatibility> = Vec::new();
    for surface_format in supported {
        let (Some(format), Some((primaries, transfer))) = (
            describe_format(surface_format.format),
            describe_color_space(surface_format.color_space),
        ) else {
            continue;
        };

        let compat = VideoModeCompatibility {
            frame_rate: Limit::Any,
            resolution: Limit::Fixed(resolution),
            pixel_aspect_ratio: Limit::Fixed(AspectRatio::SQUARE),
            color_primaries: Limit::Fixed(primaries),
            color_model: Limit::Fixed(ColorModel::Rgb),
            color_transfer_function: Limit::Fixed(transfer),
            color_subsampling: Limit::Fixed(ColorSubsampling::Rb444),
            color_range: Limit::Fixed(ColorRange::Full),
            color_format: Limit::Fixed(format),
        };
        if !list.contains(&compat) {
            list.push(compat);
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::Rate;

    fn surface(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn srgb_mode(color_format: ColorFormat) -> VideoMode {
        VideoMode {
            frame_rate: Rate::new(60, 1),
            resolution: Resolution::new(1280, 720),
            pixel_aspect_ratio: AspectRatio::SQUARE,
            color_primaries: ColorPrimaries::Bt709,
            color_model: ColorModel::Rgb,
            color_transfer_function: ColorTransferFunction::Srgb,
            color_subsampling: ColorSubsampling::Rb444,
            color_range: ColorRange::Full,
            color_format,
        }
    }

    #[test]
    fn test_prefers_hardware_srgb() {
        let supported = [
            surface(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let optimized = optimize(&srgb_mode(ColorFormat::B8G8R8A8), &supported).unwrap();
        assert_eq!(optimized.format, vk::Format::B8G8R8A8_SRGB);
        assert!(!optimized.transfer.encode_in_shader);
    }

    #[test]
    fn test_unorm_falls_back_to_shader_encoding() {
        let supported = [surface(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let optimized = optimize(&srgb_mode(ColorFormat::B8G8R8A8), &supported).unwrap();
        assert_eq!(optimized.format, vk::Format::B8G8R8A8_UNORM);
        assert!(optimized.transfer.encode_in_shader);
        assert_eq!(optimized.transfer.function, ColorTransferFunction::Srgb);
    }

    #[test]
    fn test_unsupported_pair_yields_none() {
        let supported = [surface(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        assert!(optimize(&srgb_mode(ColorFormat::R8G8B8A8), &supported).is_none());
    }

    #[test]
    fn test_compatibility_list_deduplicates_and_skips_unknown() {
        let supported = [
            surface(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface(vk::Format::R5G6B5_UNORM_PACK16, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let list = compatibility_list(&supported, Resolution::new(800, 600));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].resolution, Limit::Fixed(Resolution::new(800, 600)));

        assert!(compatibility_list(&supported, Resolution::new(0, 600)).is_empty());
    }

    #[test]
    fn test_color_space_round_trip() {
        for space in [
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
            vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        ] {
            let (primaries, transfer) = describe_color_space(space).unwrap();
            assert_eq!(color_space_for(primaries, transfer), Some(space));
        }
    }
}
