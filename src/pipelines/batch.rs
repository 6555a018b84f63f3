use crate::data_structures::{
    instance::QuadInstance,
    vertex::{QuadCorner, Vertex},
};

/// Instanced quad pipeline: vertex buffer 0 holds the unit quad, buffer 1 the
/// [`QuadInstance`]s of one flush.
pub fn mk_batch_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    units_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Batch Pipeline Layout"),
        bind_group_layouts: &[Some(units_layout)],
        immediate_size: 0,
    });
    super::mk_render_pipeline(
        device,
        "Batch Pipeline",
        &layout,
        color_format,
        wgpu::PrimitiveTopology::TriangleList,
        shader,
        "vs_quad",
        &[QuadCorner::desc(), QuadInstance::desc()],
    )
}
