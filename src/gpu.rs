//! wgpu implementation of the draw seam.
//!
//! [`GpuResources`] owns everything the sprite renderer allocates once per
//! context: pipelines, the quad mesh, the instance buffer and the table of
//! textures bound to each texture unit. A [`FrameRenderer`] borrows them for
//! one layer render and turns every flush into one render pass and submit.

use cgmath::Matrix4;
use wgpu::util::DeviceExt;

use crate::{
    batch::MAX_QUADS_PER_BATCH,
    data_structures::{
        instance::QuadInstance,
        texture::{self, TextureHandle, TextureRegistry},
        vertex::{QUAD_CORNERS, QUAD_INDICES},
    },
    pipelines::{self, immediate::ImmediateUniform, units::Globals},
    render::{DrawBackend, SlotBinder},
    render_layer::{ImmediateDraw, Topology},
    texture_cache::{MAX_TEXTURE_UNITS, RESERVED_TEXTURE_UNIT},
};

/// Maps OpenGL clip space depth (-1..1) onto wgpu's (0..1).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Orthographic projection for a y-up 2D world, depth range -1000..1000.
pub fn ortho_projection(left: f32, right: f32, bottom: f32, top: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::ortho(left, right, bottom, top, -1000.0, 1000.0)
}

#[derive(Debug)]
pub struct GpuResources {
    pub batch_pipeline: wgpu::RenderPipeline,
    pub triangle_pipeline: wgpu::RenderPipeline,
    pub line_pipeline: wgpu::RenderPipeline,
    units_layout: wgpu::BindGroupLayout,
    globals_buffer: wgpu::Buffer,
    immediate_buffer: wgpu::Buffer,
    immediate_bind_group: wgpu::BindGroup,
    corner_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    /// Texture bound to each unit. The reserved unit always holds the white texture.
    slots: [TextureHandle; MAX_TEXTURE_UNITS],
    /// Rebuilt lazily after any slot changed.
    units_bind_group: Option<wgpu::BindGroup>,
}

impl GpuResources {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat, white: TextureHandle) -> Self {
        let shader = pipelines::mk_sprite_shader(device);
        let units_layout = pipelines::units::mk_bind_group_layout(device);
        let immediate_layout = pipelines::immediate::mk_bind_group_layout(device);

        let batch_pipeline =
            pipelines::batch::mk_batch_pipeline(device, color_format, &units_layout, &shader);
        let triangle_pipeline = pipelines::immediate::mk_immediate_pipeline(
            device,
            color_format,
            &units_layout,
            &immediate_layout,
            &shader,
            Topology::TriangleList,
        );
        let line_pipeline = pipelines::immediate::mk_immediate_pipeline(
            device,
            color_format,
            &units_layout,
            &immediate_layout,
            &shader,
            Topology::LineList,
        );

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: std::mem::size_of::<Globals>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let immediate_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Immediate Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ImmediateUniform::new(RESERVED_TEXTURE_UNIT)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let immediate_bind_group =
            pipelines::immediate::mk_bind_group(device, &immediate_layout, &immediate_buffer);

        let corner_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Instance Buffer"),
            size: (MAX_QUADS_PER_BATCH * std::mem::size_of::<QuadInstance>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut slots = [TextureHandle::NONE; MAX_TEXTURE_UNITS];
        slots[RESERVED_TEXTURE_UNIT] = white;

        Self {
            batch_pipeline,
            triangle_pipeline,
            line_pipeline,
            units_layout,
            globals_buffer,
            immediate_buffer,
            immediate_bind_group,
            corner_buffer,
            index_buffer,
            instance_buffer,
            sampler: texture::create_sprite_sampler(device),
            slots,
            units_bind_group: None,
        }
    }

    pub fn slots(&self) -> &[TextureHandle; MAX_TEXTURE_UNITS] {
        &self.slots
    }

    /// Unbind every unit except the reserved one.
    pub fn clear_slots(&mut self) {
        let white = self.slots[RESERVED_TEXTURE_UNIT];
        self.slots = [TextureHandle::NONE; MAX_TEXTURE_UNITS];
        self.slots[RESERVED_TEXTURE_UNIT] = white;
        self.units_bind_group = None;
    }

    fn prepare_units_bind_group(&mut self, device: &wgpu::Device, textures: &TextureRegistry) {
        if self.units_bind_group.is_some() {
            return;
        }
        let white = self.slots[RESERVED_TEXTURE_UNIT];
        let Some(fallback) = textures.get(white) else {
            log::error!("white texture {:?} is not registered", white);
            return;
        };
        let views = self.slots.map(|handle| {
            if handle.is_none() {
                return &fallback.view;
            }
            match textures.get(handle) {
                Some(texture) => &texture.view,
                None => {
                    log::warn!("texture {:?} is bound but not registered, drawing white", handle);
                    &fallback.view
                }
            }
        });
        self.units_bind_group = Some(pipelines::units::mk_bind_group(
            device,
            &self.units_layout,
            &self.globals_buffer,
            &self.sampler,
            views,
        ));
    }
}

impl SlotBinder for GpuResources {
    fn bind_slot(&mut self, slot: usize, texture: TextureHandle) {
        if self.slots[slot] != texture {
            self.slots[slot] = texture;
            self.units_bind_group = None;
        }
    }

    fn unbind_slot(&mut self, slot: usize) {
        self.bind_slot(slot, TextureHandle::NONE);
    }
}

/// Draws one render layer into `target`.
pub struct FrameRenderer<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    gpu: &'a mut GpuResources,
    textures: &'a TextureRegistry,
    target: &'a wgpu::TextureView,
}

impl<'a> FrameRenderer<'a> {
    /// Upload the layer's uniforms. Everything drawn through this renderer uses them.
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        gpu: &'a mut GpuResources,
        textures: &'a TextureRegistry,
        target: &'a wgpu::TextureView,
        projection: Matrix4<f32>,
        color_transform: Matrix4<f32>,
    ) -> Self {
        queue.write_buffer(
            &gpu.globals_buffer,
            0,
            bytemuck::cast_slice(&[Globals::new(projection, color_transform)]),
        );
        Self {
            device,
            queue,
            gpu,
            textures,
            target,
        }
    }

    fn submit_pass(
        &mut self,
        label: &str,
        draw: impl FnOnce(&mut wgpu::RenderPass<'_>, &GpuResources, &wgpu::BindGroup),
    ) {
        self.gpu.prepare_units_bind_group(self.device, self.textures);
        let Some(units) = self.gpu.units_bind_group.as_ref() else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                multiview_mask: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            draw(&mut render_pass, &*self.gpu, units);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl SlotBinder for FrameRenderer<'_> {
    fn bind_slot(&mut self, slot: usize, texture: TextureHandle) {
        self.gpu.bind_slot(slot, texture);
    }

    fn unbind_slot(&mut self, slot: usize) {
        self.gpu.unbind_slot(slot);
    }
}

impl DrawBackend for FrameRenderer<'_> {
    fn draw_quads(&mut self, instances: &[QuadInstance]) {
        if instances.is_empty() {
            log::warn!("you attempted to draw a batch with zero quads");
            return;
        }
        let instances = &instances[..instances.len().min(MAX_QUADS_PER_BATCH)];
        self.queue
            .write_buffer(&self.gpu.instance_buffer, 0, bytemuck::cast_slice(instances));
        let amount = instances.len() as u32;

        self.submit_pass("Quad Batch Pass", |render_pass, gpu, units| {
            render_pass.set_pipeline(&gpu.batch_pipeline);
            render_pass.set_bind_group(0, units, &[]);
            render_pass.set_vertex_buffer(0, gpu.corner_buffer.slice(..));
            render_pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
            render_pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..amount);
        });
    }

    fn draw_immediate(&mut self, item: &ImmediateDraw, slot: usize) {
        if item.vertices.is_empty() {
            return;
        }
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Immediate Vertex Buffer"),
                contents: bytemuck::cast_slice(&item.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.queue.write_buffer(
            &self.gpu.immediate_buffer,
            0,
            bytemuck::cast_slice(&[ImmediateUniform::new(slot)]),
        );
        let amount = item.vertices.len() as u32;
        let topology = item.topology;

        self.submit_pass("Immediate Pass", |render_pass, gpu, units| {
            render_pass.set_pipeline(match topology {
                Topology::TriangleList => &gpu.triangle_pipeline,
                Topology::LineList => &gpu.line_pipeline,
            });
            render_pass.set_bind_group(0, units, &[]);
            render_pass.set_bind_group(1, &gpu.immediate_bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.draw(0..amount, 0..1);
        });
    }
}
