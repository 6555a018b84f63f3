//! Bind group 0: per-layer uniforms, the shared sampler and the texture units.

use cgmath::Matrix4;

use crate::texture_cache::MAX_TEXTURE_UNITS;

/// Binding of texture unit 0; unit `n` sits at `FIRST_UNIT_BINDING + n`.
pub const FIRST_UNIT_BINDING: u32 = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Globals {
    pub projection: [[f32; 4]; 4],
    pub color_transform: [[f32; 4]; 4],
}

impl Globals {
    pub fn new(projection: Matrix4<f32>, color_transform: Matrix4<f32>) -> Self {
        Self {
            projection: projection.into(),
            color_transform: color_transform.into(),
        }
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ];
    entries.extend((0..MAX_TEXTURE_UNITS as u32).map(|unit| wgpu::BindGroupLayoutEntry {
        binding: FIRST_UNIT_BINDING + unit,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("texture_units_bind_group_layout"),
    })
}

/// Bind `views[n]` to texture unit `n`.
pub fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    globals: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    views: [&wgpu::TextureView; MAX_TEXTURE_UNITS],
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: globals.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        },
    ];
    entries.extend(
        views
            .into_iter()
            .zip(FIRST_UNIT_BINDING..)
            .map(|(view, binding)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            }),
    );

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &entries,
        label: Some("texture_units_bind_group"),
    })
}
