//! Placement of frames on the presentation surface
//!
//! Quad vertices are in pixels relative to the centre of the viewport; the
//! vertex shader divides by half the viewport size to reach clip space.

use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::video::format::ColorTransfer;
use crate::video::{AspectRatio, Resolution};

/// How a frame is fitted into the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Fill the viewport, ignoring aspect ratio
    Stretch,
    /// Fit entirely inside, letterboxing as needed
    #[default]
    Box,
    /// Cover the viewport, cropping as needed
    Crop,
    /// Match the viewport width
    ClampHorizontally,
    /// Match the viewport height
    ClampVertically,
}

/// Texture sampling filter used when scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalingFilter {
    /// Nearest neighbour
    Nearest,
    /// Bilinear
    #[default]
    Linear,
}

/// Vertex of the presentation quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in pixels from the viewport centre
    pub position: [f32; 2],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

/// Vertices in the fixed triangle-strip quad
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Uniform block shared by both presentation shaders (set 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WindowUniforms {
    /// Camera projection, used by layer content
    pub projection: [[f32; 4]; 4],
    /// Viewport size in pixels
    pub viewport_size: [f32; 2],
    /// Transfer function index
    pub transfer_function: i32,
    /// Non-zero when the shader must encode the transfer function
    pub encode_in_shader: i32,
}

impl WindowUniforms {
    /// Uniforms for a viewport
    pub fn new(projection: &Matrix4<f32>, viewport: (u32, u32), transfer: ColorTransfer) -> Self {
        Self {
            projection: (*projection).into(),
            viewport_size: [viewport.0 as f32, viewport.1 as f32],
            transfer_function: transfer.function.shader_index(),
            encode_in_shader: i32::from(transfer.encode_in_shader),
        }
    }
}

/// On-screen size of a frame scaled into `viewport`
pub fn scaled_size(
    frame: Resolution,
    pixel_aspect: AspectRatio,
    viewport: (u32, u32),
    mode: ScalingMode,
) -> (f32, f32) {
    let (vw, vh) = (viewport.0 as f32, viewport.1 as f32);
    let fw = frame.width as f32 * pixel_aspect.as_f32();
    let fh = frame.height as f32;
    if fw <= 0.0 || fh <= 0.0 {
        return (0.0, 0.0);
    }

    let sx = vw / fw;
    let sy = vh / fh;
    match mode {
        ScalingMode::Stretch => (vw, vh),
        ScalingMode::Box => {
            let s = sx.min(sy);
            (fw * s, fh * s)
        }
        ScalingMode::Crop => {
            let s = sx.max(sy);
            (fw * s, fh * s)
        }
        ScalingMode::ClampHorizontally => (fw * sx, fh * sx),
        ScalingMode::ClampVertically => (fw * sy, fh * sy),
    }
}

/// Triangle-strip quad placing a frame in the viewport
pub fn quad_vertices(
    frame: Resolution,
    pixel_aspect: AspectRatio,
    viewport: (u32, u32),
    mode: ScalingMode,
) -> [QuadVertex; 4] {
    let (w, h) = scaled_size(frame, pixel_aspect, viewport, mode);
    let (hw, hh) = (w / 2.0, h / 2.0);
    [
        QuadVertex { position: [-hw, -hh], tex_coord: [0.0, 0.0] },
        QuadVertex { position: [hw, -hh], tex_coord: [1.0, 0.0] },
        QuadVertex { position: [-hw, hh], tex_coord: [0.0, 1.0] },
        QuadVertex { position: [hw, hh], tex_coord: [1.0, 1.0] },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HD: Resolution = Resolution::new(1920, 1080);

    #[test]
    fn test_box_letterboxes() {
        let (w, h) = scaled_size(HD, AspectRatio::SQUARE, (800, 800), ScalingMode::Box);
        assert_relative_eq!(w, 800.0);
        assert_relative_eq!(h, 450.0);
    }

    #[test]
    fn test_crop_covers() {
        let (w, h) = scaled_size(HD, AspectRatio::SQUARE, (800, 800), ScalingMode::Crop);
        assert_relative_eq!(h, 800.0);
        assert_relative_eq!(w, 1422.2222, epsilon = 1e-3);
    }

    #[test]
    fn test_clamp_modes() {
        let (w, _) = scaled_size(HD, AspectRatio::SQUARE, (640, 100), ScalingMode::ClampHorizontally);
        assert_relative_eq!(w, 640.0);
        let (_, h) = scaled_size(HD, AspectRatio::SQUARE, (640, 100), ScalingMode::ClampVertically);
        assert_relative_eq!(h, 100.0);
        assert_eq!(scaled_size(HD, AspectRatio::SQUARE, (640, 100), ScalingMode::Stretch), (640.0, 100.0));
    }

    #[test]
    fn test_pixel_aspect_widens_frame() {
        let anamorphic = AspectRatio { num: 2, den: 1 };
        let (w, h) = scaled_size(Resolution::new(500, 500), anamorphic, (1000, 1000), ScalingMode::Box);
        assert_relative_eq!(w, 1000.0);
        assert_relative_eq!(h, 500.0);
    }

    #[test]
    fn test_quad_is_centred() {
        let quad = quad_vertices(HD, AspectRatio::SQUARE, (1920, 1080), ScalingMode::Box);
        assert_eq!(quad[0].position, [-960.0, -540.0]);
        assert_eq!(quad[3].position, [960.0, 540.0]);
        assert_eq!(quad[3].tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn test_empty_frame_collapses() {
        let (w, h) = scaled_size(Resolution::new(0, 0), AspectRatio::SQUARE, (640, 480), ScalingMode::Box);
        assert_eq!((w, h), (0.0, 0.0));
    }
}
