//! The scaler's graphics pipeline
//!
//! Draws the frame quad as a 4-vertex triangle strip with dynamic viewport
//! and scissor, so only a render pass change requires a new pipeline.

use std::ffi::CStr;

use ash::{vk, Device};

use super::cache::DescriptorLayoutKind;
use super::context::VulkanContext;
use crate::config::ShaderConfig;
use crate::present::geometry::QuadVertex;
use crate::present::{PresentError, PresentResult};

/// Descriptor sets used by the scaler, in set order
pub const SCALER_SETS: [DescriptorLayoutKind; 2] = [DescriptorLayoutKind::Window, DescriptorLayoutKind::Frame];

// SAFETY: nul-terminated, no interior nul
const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Vertex binding and attributes of [`QuadVertex`]
pub fn quad_vertex_layout() -> (vk::VertexInputBindingDescription, [vk::VertexInputAttributeDescription; 2]) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<QuadVertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attributes = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: std::mem::size_of::<[f32; 2]>() as u32,
        },
    ];
    (binding, attributes)
}

/// Scaler pipeline bound to one render pass
pub struct ScalerPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl ScalerPipeline {
    /// Build the pipeline for `render_pass`
    pub fn new(context: &VulkanContext, shaders: &ShaderConfig, render_pass: vk::RenderPass) -> PresentResult<Self> {
        let device = context.device();
        let (layout, vertex_module, fragment_module) = {
            let mut cache = context.cache();
            (
                cache.pipeline_layout(device, &SCALER_SETS)?,
                cache.shader_module(device, &shaders.vertex_shader_path)?,
                cache.shader_module(device, &shaders.fragment_shader_path)?,
            )
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_POINT)
                .build(),
        ];

        let (binding, attributes) = quad_vertex_layout();
        let bindings = [binding];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_STRIP)
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| e)?
        };
        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or(PresentError::Api(vk::Result::ERROR_INITIALIZATION_FAILED))?;

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// Raw pipeline
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Cached layout the pipeline was built with
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ScalerPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
