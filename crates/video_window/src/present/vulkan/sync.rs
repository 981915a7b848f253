//! Semaphores and fences for the single in-flight frame

use ash::{vk, Device};

use crate::present::PresentResult;

/// GPU-GPU ordering primitive
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore
    pub fn new(device: Device) -> PresentResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-observable completion primitive
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> PresentResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    /// Block until signaled
    pub fn wait(&self) -> PresentResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, u64::MAX)? };
        Ok(())
    }

    /// Return to the unsignaled state
    pub fn reset(&self) -> PresentResult<()> {
        unsafe { self.device.reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization for one frame in flight
pub struct FrameSync {
    /// Signaled when the acquired image may be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering finished and the image may be presented
    pub render_finished: Semaphore,
    /// Signaled when the frame's command buffer completed
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the primitives; the fence starts signaled so the first wait returns
    pub fn new(device: &Device) -> PresentResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}
