//! Device objects shared between windows
//!
//! Render passes, descriptor-set layouts, pipeline layouts and shader
//! modules depend only on their creation parameters, so every window on the
//! device reuses one instance per key. Cached objects live until the context
//! is destroyed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use ash::{vk, Device};

use super::render_pass;
use crate::present::{PresentError, PresentResult};

/// Descriptor-set layouts known to the presentation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorLayoutKind {
    /// Set 0: the window uniform block
    Window,
    /// Set 1: the frame image sampler
    Frame,
}

/// Render pass identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RenderPassKey {
    color_format: vk::Format,
    depth_stencil_format: vk::Format,
}

/// Per-device cache of reusable objects
#[derive(Default)]
pub struct ObjectCache {
    render_passes: HashMap<RenderPassKey, vk::RenderPass>,
    descriptor_set_layouts: HashMap<DescriptorLayoutKind, vk::DescriptorSetLayout>,
    pipeline_layouts: HashMap<Vec<DescriptorLayoutKind>, vk::PipelineLayout>,
    shader_modules: HashMap<String, vk::ShaderModule>,
}

impl ObjectCache {
    /// Render pass for a colour format and optional depth/stencil format
    pub fn render_pass(
        &mut self,
        device: &Device,
        color_format: vk::Format,
        depth_stencil_format: vk::Format,
    ) -> PresentResult<vk::RenderPass> {
        let key = RenderPassKey {
            color_format,
            depth_stencil_format,
        };
        if let Some(&render_pass) = self.render_passes.get(&key) {
            return Ok(render_pass);
        }

        log::debug!("Creating render pass for {:?} / {:?}", color_format, depth_stencil_format);
        let render_pass = render_pass::create(device, color_format, depth_stencil_format)?;
        self.render_passes.insert(key, render_pass);
        Ok(render_pass)
    }

    /// Descriptor-set layout of the given kind
    pub fn descriptor_set_layout(
        &mut self,
        device: &Device,
        kind: DescriptorLayoutKind,
    ) -> PresentResult<vk::DescriptorSetLayout> {
        if let Some(&layout) = self.descriptor_set_layouts.get(&kind) {
            return Ok(layout);
        }

        let binding = match kind {
            DescriptorLayoutKind::Window => vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
                .build(),
            DescriptorLayoutKind::Frame => vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        };
        let bindings = [binding];
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None)? };
        self.descriptor_set_layouts.insert(kind, layout);
        Ok(layout)
    }

    /// Pipeline layout made of `sets`, in set-index order
    pub fn pipeline_layout(&mut self, device: &Device, sets: &[DescriptorLayoutKind]) -> PresentResult<vk::PipelineLayout> {
        if let Some(&layout) = self.pipeline_layouts.get(sets) {
            return Ok(layout);
        }

        let set_layouts = sets
            .iter()
            .map(|&kind| self.descriptor_set_layout(device, kind))
            .collect::<PresentResult<Vec<_>>>()?;
        let create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&create_info, None)? };
        self.pipeline_layouts.insert(sets.to_vec(), layout);
        Ok(layout)
    }

    /// Shader module loaded from a SPIR-V file
    pub fn shader_module(&mut self, device: &Device, path: &str) -> PresentResult<vk::ShaderModule> {
        if let Some(&module) = self.shader_modules.get(path) {
            return Ok(module);
        }

        let code = load_spirv(Path::new(path))?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        log::debug!("Loaded shader module {}", path);
        self.shader_modules.insert(path.to_string(), module);
        Ok(module)
    }

    /// Destroy every cached object
    ///
    /// # Safety
    /// No object from this cache may still be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &Device) {
        for (_, module) in self.shader_modules.drain() {
            device.destroy_shader_module(module, None);
        }
        for (_, layout) in self.pipeline_layouts.drain() {
            device.destroy_pipeline_layout(layout, None);
        }
        for (_, layout) in self.descriptor_set_layouts.drain() {
            device.destroy_descriptor_set_layout(layout, None);
        }
        for (_, render_pass) in self.render_passes.drain() {
            device.destroy_render_pass(render_pass, None);
        }
    }
}

/// Read a SPIR-V binary into 32-bit words
pub fn load_spirv(path: &Path) -> PresentResult<Vec<u32>> {
    let mut file = File::open(path)
        .map_err(|e| PresentError::Shader(format!("{}: {}", path.display(), e)))?;
    ash::util::read_spv(&mut file).map_err(|e| PresentError::Shader(format!("{}: {}", path.display(), e)))
}

/// Decode SPIR-V from memory
pub fn decode_spirv(bytes: &[u8]) -> PresentResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| PresentError::Shader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_shader_reports_path() {
        let err = load_spirv(Path::new("does/not/exist.spv")).unwrap_err();
        match err {
            PresentError::Shader(message) => assert!(message.contains("does/not/exist.spv")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_spirv_words() {
        let magic = 0x0723_0203_u32.to_le_bytes();
        let words = decode_spirv(&[magic, [1, 0, 0, 0]].concat()).unwrap();
        assert_eq!(words, vec![0x0723_0203, 1]);
    }

    #[test]
    fn test_truncated_spirv_rejected() {
        assert!(matches!(decode_spirv(&[3, 2, 35]), Err(PresentError::Shader(_))));
    }
}
