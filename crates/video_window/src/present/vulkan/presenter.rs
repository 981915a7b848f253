//! Per-window Vulkan objects
//!
//! A [`VulkanPresenter`] owns everything one open window needs on the GPU.
//! Long-lived objects (surface, command buffer, buffers, descriptor set,
//! sync primitives) are created with the presenter; the swapchain-dependent
//! targets are rebuilt on request by the presentation surface.

use std::sync::Arc;

use ash::vk;
use nalgebra::Matrix4;

use super::buffer::Buffer;
use super::cache::DescriptorLayoutKind;
use super::commands::{CommandPool, CommandRecorder};
use super::context::VulkanContext;
use super::framebuffer::Framebuffers;
use super::pipeline::ScalerPipeline;
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use crate::config::ShaderConfig;
use crate::present::backend::{AcquireOutcome, BackendFactory, DrawContent, GraphicsBackend};
use crate::present::geometry::{QuadVertex, WindowUniforms, QUAD_VERTEX_COUNT};
use crate::present::params::{ReconfigureParams, SurfaceVariant};
use crate::present::{PresentError, PresentResult};
use crate::video::format::ColorTransfer;
use crate::video::LayerContext;
use crate::window::WindowHandle;

/// GPU objects of one open window
pub struct VulkanPresenter {
    shaders: ShaderConfig,
    variant: SurfaceVariant,
    surface: vk::SurfaceKHR,
    swapchain: Option<Swapchain>,
    render_pass: vk::RenderPass,
    framebuffers: Option<Framebuffers>,
    pipeline: Option<ScalerPipeline>,
    descriptor_pool: vk::DescriptorPool,
    window_set: vk::DescriptorSet,
    uniforms: WindowUniforms,
    projection: Matrix4<f32>,
    uniform_buffer: Buffer,
    vertex_buffer: Buffer,
    sync: FrameSync,
    command_buffer: vk::CommandBuffer,
    command_pool: CommandPool,
    // Dropped last: the other fields still need the device
    context: Arc<VulkanContext>,
}

impl VulkanPresenter {
    fn new(
        context: Arc<VulkanContext>,
        shaders: ShaderConfig,
        variant: SurfaceVariant,
        surface: vk::SurfaceKHR,
    ) -> PresentResult<Self> {
        let device = context.device().clone();
        let command_pool = CommandPool::new(device.clone(), context.physical_device().graphics_family)?;
        let command_buffer = command_pool.allocate()?;
        let sync = FrameSync::new(&device)?;
        let vertex_buffer =
            Buffer::for_values::<QuadVertex>(&context, QUAD_VERTEX_COUNT as usize, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let uniform_buffer = Buffer::for_values::<WindowUniforms>(&context, 1, vk::BufferUsageFlags::UNIFORM_BUFFER)?;

        let window_layout = context.cache().descriptor_set_layout(&device, DescriptorLayoutKind::Window)?;
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };

        let layouts = [window_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(descriptor_pool)
            .set_layouts(&layouts);
        let window_set = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe { device.destroy_descriptor_pool(descriptor_pool, None) };
                return Err(e.into());
            }
        };

        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: uniform_buffer.handle(),
            offset: 0,
            range: uniform_buffer.size(),
        }];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(window_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build();
        unsafe { device.update_descriptor_sets(&[write], &[]) };

        let projection = Matrix4::identity();
        let uniforms = WindowUniforms::new(&projection, (1, 1), ColorTransfer::default());
        uniform_buffer.write(&[uniforms])?;

        Ok(Self {
            context,
            shaders,
            variant,
            surface,
            swapchain: None,
            render_pass: vk::RenderPass::null(),
            framebuffers: None,
            pipeline: None,
            descriptor_pool,
            window_set,
            uniforms,
            projection,
            uniform_buffer,
            vertex_buffer,
            sync,
            command_buffer,
            command_pool,
        })
    }

    /// Shared context
    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.context
    }

    /// Raw command pool
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool.handle()
    }

    fn swapchain(&self) -> PresentResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or(PresentError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR))
    }

    /// Submit nothing but a wait on the image-available semaphore, leaving
    /// it unsignaled before the swapchain is replaced
    fn consume_acquire_semaphore(&self) -> PresentResult<()> {
        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .build();

        self.sync.in_flight.reset()?;
        let queue = self.context.queue();
        unsafe {
            self.context
                .device()
                .queue_submit(*queue, &[submit], self.sync.in_flight.handle())?;
        }
        drop(queue);
        self.sync.in_flight.wait()
    }
}

impl GraphicsBackend for VulkanPresenter {
    fn supported_surface_formats(&self) -> PresentResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe {
            self.context
                .surface_loader()
                .get_physical_device_surface_formats(self.context.physical_device().device, self.surface)?
        })
    }

    fn wait_for_frame(&mut self) -> PresentResult<()> {
        self.sync.in_flight.wait()
    }

    fn recreate_swapchain(&mut self, params: &ReconfigureParams) -> PresentResult<vk::Extent2D> {
        // Old framebuffers reference the old image views
        self.framebuffers = None;
        let swapchain = Swapchain::new(&self.context, self.surface, params, self.swapchain.as_ref())?;
        let extent = swapchain.extent();
        self.swapchain = Some(swapchain);
        Ok(extent)
    }

    fn recreate_render_pass(&mut self, params: &ReconfigureParams) -> PresentResult<()> {
        self.framebuffers = None;
        self.pipeline = None;
        self.render_pass =
            self.context
                .cache()
                .render_pass(self.context.device(), params.color_format, params.depth_stencil_format)?;
        Ok(())
    }

    fn recreate_framebuffers(&mut self, params: &ReconfigureParams) -> PresentResult<()> {
        self.framebuffers = None;
        let swapchain = self.swapchain()?;
        let framebuffers = Framebuffers::new(
            &self.context,
            self.render_pass,
            swapchain.views(),
            swapchain.extent(),
            params.depth_stencil_format,
        )?;
        self.framebuffers = Some(framebuffers);
        Ok(())
    }

    fn recreate_pipeline(&mut self, _params: &ReconfigureParams) -> PresentResult<()> {
        self.pipeline = None;
        if self.variant == SurfaceVariant::Scaler {
            self.pipeline = Some(ScalerPipeline::new(&self.context, &self.shaders, self.render_pass)?);
        }
        Ok(())
    }

    fn update_viewport(&mut self, extent: vk::Extent2D, projection: &Matrix4<f32>) -> PresentResult<()> {
        self.projection = *projection;
        self.uniforms.projection = (*projection).into();
        self.uniforms.viewport_size = [extent.width as f32, extent.height as f32];
        self.uniform_buffer.write(&[self.uniforms])
    }

    fn update_color_transfer(&mut self, transfer: ColorTransfer) -> PresentResult<()> {
        self.uniforms.transfer_function = transfer.function.shader_index();
        self.uniforms.encode_in_shader = i32::from(transfer.encode_in_shader);
        self.uniform_buffer.write(&[self.uniforms])
    }

    fn update_geometry(&mut self, vertices: &[QuadVertex; 4]) -> PresentResult<()> {
        self.vertex_buffer.write(vertices)
    }

    fn release_targets(&mut self) {
        self.pipeline = None;
        self.framebuffers = None;
        self.swapchain = None;
        self.render_pass = vk::RenderPass::null();
    }

    fn acquire_image(&mut self) -> PresentResult<AcquireOutcome> {
        let Some(swapchain) = &self.swapchain else {
            return Ok(AcquireOutcome::OutOfDate);
        };
        match swapchain.acquire_next_image(self.sync.image_available.handle()) {
            Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
            Ok((_, true)) => {
                self.consume_acquire_semaphore()?;
                Ok(AcquireOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn record(&mut self, image_index: u32, clear_values: &[vk::ClearValue], content: DrawContent<'_>) -> PresentResult<()> {
        let extent = self.swapchain()?.extent();
        let framebuffer = self
            .framebuffers
            .as_ref()
            .and_then(|framebuffers| framebuffers.get(image_index))
            .ok_or(PresentError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR))?;

        let device = self.context.device();
        let mut recorder = CommandRecorder::begin(device, self.command_buffer)?;
        {
            let mut pass = recorder.begin_render_pass(self.render_pass, framebuffer, extent, clear_values);
            pass.set_full_viewport(extent);
            match content {
                DrawContent::Empty => {}
                DrawContent::Quad { descriptor_set } => {
                    if let Some(pipeline) = &self.pipeline {
                        pass.bind_pipeline(pipeline.handle());
                        pass.bind_descriptor_sets(pipeline.layout(), &[self.window_set, descriptor_set]);
                        pass.bind_vertex_buffer(self.vertex_buffer.handle());
                        pass.draw(QUAD_VERTEX_COUNT);
                    }
                }
                DrawContent::Layers(layers) => {
                    let layer_context = LayerContext {
                        command_buffer: pass.command_buffer(),
                        render_pass: self.render_pass,
                        extent,
                        projection: self.projection,
                    };
                    for layer in layers {
                        layer.record(&layer_context);
                    }
                }
            }
        }
        recorder.end()?;
        Ok(())
    }

    fn submit_and_present(&mut self, image_index: u32) -> PresentResult<()> {
        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished.handle()];
        let command_buffers = [self.command_buffer];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        self.sync.in_flight.reset()?;
        let queue = self.context.queue();
        unsafe {
            self.context
                .device()
                .queue_submit(*queue, &[submit], self.sync.in_flight.handle())?;
        }

        match self
            .swapchain()?
            .present(*queue, image_index, self.sync.render_finished.handle())
        {
            Ok(false) => Ok(()),
            // The next acquisition reports it again and triggers the rebuild
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Presented to a stale swapchain");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for VulkanPresenter {
    fn drop(&mut self) {
        if let Err(e) = self.sync.in_flight.wait() {
            log::error!("Waiting for the last frame failed: {}", e);
        }
        self.release_targets();
        unsafe {
            self.context
                .device()
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.context.surface_loader().destroy_surface(self.surface, None);
        }
    }
}

/// Builds a [`VulkanPresenter`] for each opened window
#[derive(Clone)]
pub struct VulkanFactory {
    context: Arc<VulkanContext>,
    shaders: ShaderConfig,
}

impl VulkanFactory {
    /// Factory on `context` using `shaders` for the scaler pipeline
    pub fn new(context: Arc<VulkanContext>, shaders: ShaderConfig) -> Self {
        Self { context, shaders }
    }

    /// Shared context
    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.context
    }

    /// Layout frame producers must allocate their set-1 descriptor sets with
    pub fn frame_descriptor_set_layout(&self) -> PresentResult<vk::DescriptorSetLayout> {
        self.context
            .cache()
            .descriptor_set_layout(self.context.device(), DescriptorLayoutKind::Frame)
    }
}

impl BackendFactory for VulkanFactory {
    type Backend = VulkanPresenter;

    fn create(&self, window: &WindowHandle, variant: SurfaceVariant) -> PresentResult<VulkanPresenter> {
        let surface = window
            .create_surface(self.context.instance().handle())
            .map_err(|e| PresentError::SurfaceCreation(e.to_string()))?;

        let supported = match self.context.supports_surface(surface) {
            Ok(supported) => supported,
            Err(e) => {
                unsafe { self.context.surface_loader().destroy_surface(surface, None) };
                return Err(e);
            }
        };
        if !supported {
            unsafe { self.context.surface_loader().destroy_surface(surface, None) };
            return Err(PresentError::SurfaceUnsupported);
        }

        // The presenter destroys the surface once it exists
        let presenter = VulkanPresenter::new(Arc::clone(&self.context), self.shaders.clone(), variant, surface);
        if presenter.is_err() {
            unsafe { self.context.surface_loader().destroy_surface(surface, None) };
        }
        log::debug!("Created {:?} presenter for window {}", variant, window.key().raw());
        presenter
    }
}
