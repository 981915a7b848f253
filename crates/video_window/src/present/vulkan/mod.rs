//! Vulkan implementation of the presentation backend
//!
//! One [`VulkanContext`] (instance, device, queue and object cache) is shared
//! by every window; each open window gets its own [`VulkanPresenter`] built
//! by a [`VulkanFactory`].

pub mod buffer;
pub mod cache;
pub mod commands;
pub mod context;
pub mod framebuffer;
pub mod pipeline;
pub mod presenter;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use cache::{DescriptorLayoutKind, ObjectCache};
pub use context::VulkanContext;
pub use presenter::{VulkanFactory, VulkanPresenter};
