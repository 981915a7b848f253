//! # Camera
//!
//! Projection used by the layer renderer. The default camera is a pixel-space
//! orthographic projection: one world unit is one pixel, the origin is the
//! viewport centre and +Y points down, matching the scaler quad.
//!
//! Matrices target Vulkan clip space (Y down, depth in `[0, 1]`).

use nalgebra::{Matrix4, Orthographic3, Perspective3, Point3, Vector3};

/// Projection kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Orthographic, one unit per pixel
    Orthographic,
    /// Perspective with a vertical field of view in radians
    Perspective {
        /// Vertical field of view (radians)
        fov: f32,
    },
}

/// Camera for layer content
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Point3<f32>,
    /// Point the camera looks at
    pub target: Point3<f32>,
    /// Up vector
    pub up: Vector3<f32>,
    /// Projection kind
    pub projection: Projection,
    /// Near clipping plane distance
    pub near: f32,
    /// Far clipping plane distance
    pub far: f32,
}

/// Maps OpenGL depth `[-1, 1]` to Vulkan depth `[0, 1]`
#[rustfmt::skip]
fn depth_correction() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

impl Camera {
    /// Pixel-space orthographic camera
    pub fn pixel_space() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 1.0),
            target: Point3::origin(),
            up: Vector3::new(0.0, 1.0, 0.0),
            projection: Projection::Orthographic,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Perspective camera at `position` looking at the origin
    pub fn perspective(position: Point3<f32>, fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Point3::origin(),
            up: Vector3::new(0.0, 1.0, 0.0),
            projection: Projection::Perspective { fov: fov_degrees.to_radians() },
            near,
            far,
        }
    }

    /// Builder: look at `target`
    pub fn with_target(mut self, target: Point3<f32>) -> Self {
        self.target = target;
        self
    }

    /// World to view transform
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// View to clip transform for a viewport of `extent` pixels
    pub fn projection_matrix(&self, extent: (u32, u32)) -> Matrix4<f32> {
        let width = extent.0.max(1) as f32;
        let height = extent.1.max(1) as f32;
        match self.projection {
            // Orthographic3 maps bottom to -1, which is the top row in Vulkan,
            // so pixel rows grow downwards without an explicit flip
            Projection::Orthographic => {
                let ortho = Orthographic3::new(-width / 2.0, width / 2.0, -height / 2.0, height / 2.0, self.near, self.far);
                depth_correction() * ortho.to_homogeneous()
            }
            Projection::Perspective { fov } => {
                let perspective = Perspective3::new(width / height, fov, self.near, self.far);
                let flip_y = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0));
                depth_correction() * flip_y * perspective.to_homogeneous()
            }
        }
    }

    /// Combined world to clip transform
    pub fn matrix(&self, extent: (u32, u32)) -> Matrix4<f32> {
        self.projection_matrix(extent) * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::pixel_space()
    }
}
