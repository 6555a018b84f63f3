//! Vertex layouts shared by the quad and immediate-mode pipelines.

/// Anything that can describe its own GPU vertex buffer layout.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// One corner of the unit quad every batched sprite instance is stretched from.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadCorner {
    pub position: [f32; 3],
}

/// Centered unit quad, drawn as two triangles through [`QUAD_INDICES`].
pub const QUAD_CORNERS: [QuadCorner; 4] = [
    QuadCorner { position: [0.5, 0.5, 0.0] },
    QuadCorner { position: [0.5, -0.5, 0.0] },
    QuadCorner { position: [-0.5, -0.5, 0.0] },
    QuadCorner { position: [-0.5, 0.5, 0.0] },
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

impl Vertex for QuadCorner {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadCorner>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

/// Vertex of an immediate-mode primitive (lines, circles, rectangles...).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImmediateVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex for ImmediateVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ImmediateVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}
