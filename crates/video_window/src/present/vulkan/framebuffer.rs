//! Framebuffers and their depth/stencil attachments

use ash::{vk, Device};

use super::context::VulkanContext;
use crate::present::PresentResult;

/// Device-local depth/stencil image sized to the swapchain
pub struct DepthBuffer {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl DepthBuffer {
    /// Create a depth/stencil image of `format`
    pub fn new(context: &VulkanContext, format: vk::Format, extent: vk::Extent2D) -> PresentResult<Self> {
        let device = context.device().clone();
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);
        let image = unsafe { device.create_image(&image_info, None)? };

        // Partially built objects are released by Drop on the error paths
        let mut this = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
        };

        let requirements = unsafe { this.device.get_image_memory_requirements(image) };
        let memory_type =
            context.find_memory_type(requirements.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        this.memory = unsafe { this.device.allocate_memory(&alloc_info, None)? };
        unsafe { this.device.bind_image_memory(image, this.memory, 0)? };

        let mut aspect = vk::ImageAspectFlags::DEPTH;
        if has_stencil(format) {
            aspect |= vk::ImageAspectFlags::STENCIL;
        }
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        this.view = unsafe { this.device.create_image_view(&view_info, None)? };
        Ok(this)
    }

    /// Image view used as attachment 1
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
            }
        }
    }
}

/// Whether a depth format carries a stencil component
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// One framebuffer per swapchain image, sharing a single depth buffer
pub struct Framebuffers {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
    _depth: Option<DepthBuffer>,
}

impl Framebuffers {
    /// Create framebuffers over `views` for `render_pass`
    pub fn new(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
        depth_stencil_format: vk::Format,
    ) -> PresentResult<Self> {
        let depth = if depth_stencil_format == vk::Format::UNDEFINED {
            None
        } else {
            Some(DepthBuffer::new(context, depth_stencil_format, extent)?)
        };

        let mut this = Self {
            device: context.device().clone(),
            framebuffers: Vec::with_capacity(views.len()),
            _depth: None,
        };
        for &view in views {
            let mut attachments = vec![view];
            if let Some(depth) = &depth {
                attachments.push(depth.view());
            }
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { this.device.create_framebuffer(&create_info, None)? };
            this.framebuffers.push(framebuffer);
        }
        this._depth = depth;
        Ok(this)
    }

    /// Framebuffer of swapchain image `index`
    pub fn get(&self, index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index as usize).copied()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
