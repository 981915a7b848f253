//! Host-visible buffers

use ash::{vk, Device};
use bytemuck::Pod;

use super::context::VulkanContext;
use crate::present::PresentResult;

/// Host-visible, host-coherent buffer with its own memory
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Allocate `size` bytes for `usage`
    pub fn new(context: &VulkanContext, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> PresentResult<Self> {
        let device = context.device().clone();
        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&create_info, None)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match context.find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let this = Self {
            device,
            buffer,
            memory,
            size,
        };
        unsafe { this.device.bind_buffer_memory(buffer, memory, 0)? };
        Ok(this)
    }

    /// Buffer sized for `count` values of `T`
    pub fn for_values<T: Pod>(context: &VulkanContext, count: usize, usage: vk::BufferUsageFlags) -> PresentResult<Self> {
        Self::new(context, std::mem::size_of::<T>() as vk::DeviceSize * count as vk::DeviceSize, usage)
    }

    /// Copy `data` to the start of the buffer
    pub fn write<T: Pod>(&self, data: &[T]) -> PresentResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let len = bytes.len().min(self.size as usize);
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), len);
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
