use crate::{
    data_structures::vertex::{ImmediateVertex, Vertex},
    render_layer::Topology,
};

/// Texture unit an immediate item samples from, set before each item.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImmediateUniform {
    pub slot: u32,
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    pub _padding: [u32; 3],
}

impl ImmediateUniform {
    pub fn new(slot: usize) -> Self {
        Self {
            slot: slot as u32,
            _padding: [0; 3],
        }
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("immediate_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("immediate_bind_group"),
    })
}

/// Pipeline drawing [`ImmediateVertex`] lists of the given topology.
pub fn mk_immediate_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    units_layout: &wgpu::BindGroupLayout,
    immediate_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
    topology: Topology,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Immediate Pipeline Layout"),
        bind_group_layouts: &[Some(units_layout), Some(immediate_layout)],
        immediate_size: 0,
    });
    let (label, topology) = match topology {
        Topology::TriangleList => ("Immediate Triangle Pipeline", wgpu::PrimitiveTopology::TriangleList),
        Topology::LineList => ("Immediate Line Pipeline", wgpu::PrimitiveTopology::LineList),
    };
    super::mk_render_pipeline(
        device,
        label,
        &layout,
        color_format,
        topology,
        shader,
        "vs_immediate",
        &[ImmediateVertex::desc()],
    )
}
