//! Swapchain and image views

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use super::context::VulkanContext;
use crate::present::params::ReconfigureParams;
use crate::present::swapchain::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
use crate::present::PresentResult;

/// Swapchain with one colour view per image
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for `surface`, retiring `old` if given
    ///
    /// The extent is the requested one clamped to what the surface allows,
    /// so it may differ from `params.extent`.
    pub fn new(
        context: &VulkanContext,
        surface: vk::SurfaceKHR,
        params: &ReconfigureParams,
        old: Option<&Swapchain>,
    ) -> PresentResult<Self> {
        let physical_device = context.physical_device().device;
        let surface_loader = context.surface_loader();
        let (caps, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        let format = choose_surface_format(params.color_format, params.color_space, &formats)?;
        let present_mode = choose_present_mode(&present_modes)?;
        let extent = choose_extent(params.extent, &caps);
        let image_count = choose_image_count(&caps);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |old| old.swapchain));

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        log::debug!(
            "Swapchain created: {}x{} {:?}/{:?} {:?}, {} images requested",
            extent.width,
            extent.height,
            format.format,
            format.color_space,
            present_mode,
            image_count
        );

        let mut this = Self {
            device: context.device().clone(),
            loader,
            swapchain,
            views: Vec::new(),
            format,
            extent,
        };

        let images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        for image in images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { this.device.create_image_view(&view_info, None)? };
            this.views.push(view);
        }
        Ok(this)
    }

    /// Raw handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Colour views, indexed like the swapchain images
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// Format and colour space in use
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Extent in use
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// `vkAcquireNextImageKHR` without timeout
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// `vkQueuePresentKHR` of one image, returning whether it was suboptimal
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let wait_semaphores = [wait];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        unsafe { self.loader.queue_present(queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
