//! # Presentation Surface
//!
//! The open state of a window consumer. Owns the native window and a
//! [`GraphicsBackend`] holding every GPU object, and implements:
//!
//! - **Reconfiguration**: diff the new [`ReconfigureParams`] against the
//!   current ones, close the resulting [`Modifications`] under the dependency
//!   cascade and run the rebuild steps in [`REBUILD_ORDER`]. Identical
//!   parameters do nothing; unset parameters tear the targets down.
//! - **Draw/present**: one frame in flight. Wait the fence, acquire (recreating
//!   the swapchain while it reports stale), refresh the quad if the frame's
//!   geometry changed, record, submit and present.

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use super::backend::{AcquireOutcome, DrawContent, GraphicsBackend};
use super::geometry::{quad_vertices, ScalingFilter, ScalingMode};
use super::params::{cascade, Modifications, RebuildStep, ReconfigureParams, SurfaceVariant, REBUILD_ORDER};
use super::{PresentError, PresentResult};
use crate::consumer::camera::Camera;
use crate::video::{AspectRatio, Frame, Layer, Resolution};
use crate::window::WindowHandle;

/// Swapchain recreations tolerated while acquiring one image
pub const MAX_ACQUIRE_RETRIES: u32 = 8;

/// Inputs the current quad was computed from
#[derive(Debug, Clone, Copy, PartialEq)]
struct QuadKey {
    resolution: Resolution,
    pixel_aspect: AspectRatio,
    extent: vk::Extent2D,
    mode: ScalingMode,
}

/// Window plus GPU objects for presenting into it
pub struct PresentationSurface<B: GraphicsBackend> {
    // Declared before the window so GPU objects die before the native window
    backend: B,
    window: WindowHandle,
    variant: SurfaceVariant,
    params: ReconfigureParams,
    extent: vk::Extent2D,
    camera: Camera,
    projection: Matrix4<f32>,
    clear_color: [f32; 4],
    clear_values: Vec<vk::ClearValue>,
    scaling_mode: ScalingMode,
    scaling_filter: ScalingFilter,
    quad: Option<QuadKey>,
    in_flight: Option<Arc<dyn Frame>>,
}

impl<B: GraphicsBackend> PresentationSurface<B> {
    /// Bind `backend` to `window`; nothing is drawable until
    /// [`reconfigure`](Self::reconfigure) receives set parameters
    pub fn new(backend: B, window: WindowHandle, variant: SurfaceVariant) -> Self {
        Self {
            backend,
            window,
            variant,
            params: ReconfigureParams::unset(),
            extent: vk::Extent2D { width: 0, height: 0 },
            camera: Camera::default(),
            projection: Matrix4::identity(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_values: Vec::new(),
            scaling_mode: ScalingMode::default(),
            scaling_filter: ScalingFilter::default(),
            quad: None,
            in_flight: None,
        }
    }

    /// The native window
    pub fn window(&self) -> &WindowHandle {
        &self.window
    }

    /// The native window, mutably
    pub fn window_mut(&mut self) -> &mut WindowHandle {
        &mut self.window
    }

    /// The GPU backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Variant this surface was built for
    pub fn variant(&self) -> SurfaceVariant {
        self.variant
    }

    /// Parameters currently applied
    pub fn params(&self) -> &ReconfigureParams {
        &self.params
    }

    /// Extent of the live swapchain, zero when unset
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Whether there is anything to draw into
    pub fn is_configured(&self) -> bool {
        !self.params.is_unset()
    }

    /// Format/colour-space pairs the surface supports
    pub fn supported_surface_formats(&self) -> PresentResult<Vec<vk::SurfaceFormatKHR>> {
        self.backend.supported_surface_formats()
    }

    /// Apply new parameters, rebuilding only what they invalidate
    ///
    /// Returns the rebuild steps that ran. On failure the targets are torn
    /// down and the surface is left unset, so the next call rebuilds from
    /// scratch.
    pub fn reconfigure(&mut self, params: ReconfigureParams) -> PresentResult<Modifications> {
        if params.is_unset() {
            return self.teardown(params);
        }

        let flags = if self.params.is_unset() {
            Modifications::all()
        } else {
            self.variant.modifications(&self.params, &params)
        };
        if flags.is_empty() {
            return Ok(flags);
        }

        log::debug!("Reconfiguring surface: {:?} -> {:?}", flags, params);
        self.wait_idle()?;
        match self.rebuild(flags, params) {
            Ok(done) => {
                self.params = params;
                Ok(done)
            }
            Err(e) => {
                log::error!("Surface reconfiguration failed: {}", e);
                self.backend.release_targets();
                self.params = ReconfigureParams::unset();
                self.extent = vk::Extent2D { width: 0, height: 0 };
                Err(e)
            }
        }
    }

    fn teardown(&mut self, params: ReconfigureParams) -> PresentResult<Modifications> {
        if self.params.is_unset() {
            self.params = params;
            return Ok(Modifications::empty());
        }

        log::debug!("No video mode; releasing swapchain targets");
        self.wait_idle()?;
        self.backend.release_targets();
        self.params = params;
        self.extent = vk::Extent2D { width: 0, height: 0 };
        self.clear_values.clear();
        self.quad = None;
        Ok(Modifications::SWAPCHAIN | Modifications::RENDER_PASS | Modifications::FRAMEBUFFERS)
    }

    fn wait_idle(&mut self) -> PresentResult<()> {
        self.backend.wait_for_frame()?;
        self.in_flight = None;
        Ok(())
    }

    /// Run the rebuild table; the fence must already be waited
    fn rebuild(&mut self, flags: Modifications, params: ReconfigureParams) -> PresentResult<Modifications> {
        let mut pending = cascade(flags);
        let mut done = Modifications::empty();

        for (flag, step) in REBUILD_ORDER {
            if !pending.contains(flag) {
                continue;
            }

            match step {
                RebuildStep::Swapchain => {
                    let actual = self.backend.recreate_swapchain(&params)?;
                    if actual != self.extent {
                        if actual != params.extent {
                            log::debug!("Surface imposed extent {}x{}", actual.width, actual.height);
                        }
                        pending |= cascade(self.variant.extent_modifications() - Modifications::SWAPCHAIN);
                        self.extent = actual;
                    }
                }
                RebuildStep::RenderPass => self.backend.recreate_render_pass(&params)?,
                RebuildStep::Framebuffers => self.backend.recreate_framebuffers(&params)?,
                RebuildStep::Pipeline => self.backend.recreate_pipeline(&params)?,
                RebuildStep::ClearValues => self.clear_values = self.build_clear_values(&params),
                RebuildStep::Viewport => {
                    self.projection = self.camera.matrix((self.extent.width, self.extent.height));
                    self.backend.update_viewport(self.extent, &self.projection)?;
                    self.quad = None;
                }
                RebuildStep::ColorTransfer => self.backend.update_color_transfer(params.color_transfer)?,
            }
            done |= flag;
        }

        Ok(done)
    }

    fn build_clear_values(&self, params: &ReconfigureParams) -> Vec<vk::ClearValue> {
        let mut values = vec![vk::ClearValue {
            color: vk::ClearColorValue { float32: self.clear_color },
        }];
        if params.has_depth_stencil() {
            values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        }
        values
    }

    /// Change the background colour
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        if self.is_configured() {
            self.clear_values = self.build_clear_values(&self.params);
        }
    }

    /// Change the projection used for layer content
    pub fn set_camera(&mut self, camera: Camera) -> PresentResult<()> {
        if camera == self.camera {
            return Ok(());
        }
        self.camera = camera;
        if self.is_configured() {
            self.wait_idle()?;
            self.rebuild(Modifications::VIEWPORT, self.params)?;
        }
        Ok(())
    }

    /// Change how frames are fitted into the window
    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        self.scaling_mode = mode;
    }

    /// Change the sampling filter
    pub fn set_scaling_filter(&mut self, filter: ScalingFilter) {
        self.scaling_filter = filter;
    }

    /// Draw one frame with the scaler, or a cleared image when `frame` is `None`
    ///
    /// Does nothing while no mode is negotiated.
    pub fn draw_frame(&mut self, frame: Option<Arc<dyn Frame>>) -> PresentResult<()> {
        if !self.is_configured() {
            return Ok(());
        }

        self.wait_idle()?;
        let image_index = self.acquire()?;

        let content = match &frame {
            Some(frame) => {
                self.refresh_quad(frame.as_ref())?;
                DrawContent::Quad {
                    descriptor_set: frame.descriptor_set(self.scaling_filter),
                }
            }
            None => DrawContent::Empty,
        };

        self.backend.record(image_index, &self.clear_values, content)?;
        self.backend.submit_and_present(image_index)?;
        self.in_flight = frame;
        Ok(())
    }

    /// Draw external layers in order
    ///
    /// Does nothing while no mode is negotiated.
    pub fn draw_layers(&mut self, layers: &[Arc<dyn Layer>]) -> PresentResult<()> {
        if !self.is_configured() {
            return Ok(());
        }

        self.wait_idle()?;
        let image_index = self.acquire()?;
        self.backend.record(image_index, &self.clear_values, DrawContent::Layers(layers))?;
        self.backend.submit_and_present(image_index)?;
        Ok(())
    }

    /// Current projection matrix
    pub fn projection(&self) -> &Matrix4<f32> {
        &self.projection
    }

    fn acquire(&mut self) -> PresentResult<u32> {
        for _ in 0..=MAX_ACQUIRE_RETRIES {
            match self.backend.acquire_image()? {
                AcquireOutcome::Ready(index) => return Ok(index),
                outcome => {
                    log::warn!("Swapchain {:?} during acquisition, recreating", outcome);
                    self.rebuild(Modifications::SWAPCHAIN, self.params)?;
                }
            }
        }
        Err(PresentError::AcquisitionFailed(MAX_ACQUIRE_RETRIES))
    }

    fn refresh_quad(&mut self, frame: &dyn Frame) -> PresentResult<()> {
        let key = QuadKey {
            resolution: frame.resolution(),
            pixel_aspect: frame.pixel_aspect_ratio(),
            extent: self.extent,
            mode: self.scaling_mode,
        };
        if self.quad == Some(key) {
            return Ok(());
        }

        let vertices = quad_vertices(
            key.resolution,
            key.pixel_aspect,
            (key.extent.width, key.extent.height),
            key.mode,
        );
        self.backend.update_geometry(&vertices)?;
        self.quad = Some(key);
        Ok(())
    }
}

impl<B: GraphicsBackend> Drop for PresentationSurface<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_for_frame() {
            log::error!("Failed to wait for in-flight frame while closing: {}", e);
        }
        self.in_flight = None;
    }
}
