//! Render layers: a quad batch plus immediate-mode fallback drawing.
//!
//! A [`RenderLayer`] collects everything one layer draws in a frame. Quads go
//! to its [`QuadBatch`]; lines, circles, rectangles and other shapes are
//! recorded as [`ImmediateDraw`] items and drawn after the batch, each with its
//! own draw call. Both paths resolve textures through the same
//! [`TextureCache`], which is shared by every layer of a context, so binding
//! pressure in one layer shows up as extra flushes in the next.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use cgmath::{Matrix4, SquareMatrix, Vector2, Vector3, Vector4};

use crate::{
    batch::{FlushStats, Quad, QuadBatch, SortOrder},
    data_structures::{sprite::Sprite, texture::TextureHandle, vertex::ImmediateVertex},
    render::DrawBackend,
    texture_cache::TextureCache,
};

/// Per-layer settings, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderLayerConfig {
    pub sort_order: SortOrder,
    /// Applied to every fragment colour of the layer.
    pub color_transform: Matrix4<f32>,
    /// Thickness of outlined rectangles, in world units.
    pub line_width: f32,
}

impl RenderLayerConfig {
    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_color_transform(mut self, color_transform: Matrix4<f32>) -> Self {
        self.color_transform = color_transform;
        self
    }

    pub fn with_line_width(mut self, line_width: f32) -> Self {
        self.line_width = line_width;
        self
    }
}

impl Default for RenderLayerConfig {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::Texture,
            color_transform: Matrix4::identity(),
            line_width: 1.0,
        }
    }
}

/// How the vertices between [`RenderLayer::begin`] and [`RenderLayer::end`]
/// are connected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    /// First vertex is shared by every triangle.
    TriangleFan,
    Lines,
    /// Closed outline through every vertex.
    LineLoop,
}

/// GPU topology an immediate item is drawn with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    LineList,
}

/// A recorded immediate-mode item, already converted to a list topology.
#[derive(Clone, Debug, PartialEq)]
pub struct ImmediateDraw {
    pub vertices: Vec<ImmediateVertex>,
    pub topology: Topology,
    pub texture: TextureHandle,
}

/// Expand fans and loops into plain lists; wgpu has no topology for either.
pub fn triangulate(primitive: Primitive, vertices: &[ImmediateVertex]) -> (Topology, Vec<ImmediateVertex>) {
    match primitive {
        Primitive::Triangles => {
            let whole = vertices.len() - vertices.len() % 3;
            (Topology::TriangleList, vertices[..whole].to_vec())
        }
        Primitive::TriangleFan => {
            let mut list = Vec::with_capacity(vertices.len().saturating_sub(2) * 3);
            if let Some((&center, rim)) = vertices.split_first() {
                for pair in rim.windows(2) {
                    list.extend([center, pair[0], pair[1]]);
                }
            }
            (Topology::TriangleList, list)
        }
        Primitive::Lines => {
            let whole = vertices.len() - vertices.len() % 2;
            (Topology::LineList, vertices[..whole].to_vec())
        }
        Primitive::LineLoop => {
            let mut list = Vec::with_capacity(vertices.len() * 2);
            if vertices.len() >= 2 {
                for (i, &vertex) in vertices.iter().enumerate() {
                    list.extend([vertex, vertices[(i + 1) % vertices.len()]]);
                }
            }
            (Topology::LineList, list)
        }
    }
}

#[derive(Debug)]
struct OpenItem {
    primitive: Primitive,
    texture: TextureHandle,
    vertices: Vec<ImmediateVertex>,
}

/// Counters of one [`RenderLayer::render`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub batch: FlushStats,
    pub immediate_draws: usize,
}

#[derive(Debug)]
pub struct RenderLayer {
    batch: QuadBatch,
    color_transform: Matrix4<f32>,
    current_color: Vector4<f32>,
    half_width: f32,
    items: Vec<ImmediateDraw>,
    open: Option<OpenItem>,
}

impl RenderLayer {
    pub fn new(config: RenderLayerConfig) -> Self {
        Self {
            batch: QuadBatch::new(config.sort_order),
            color_transform: config.color_transform,
            current_color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            half_width: config.line_width / 2.0,
            items: Vec::new(),
            open: None,
        }
    }

    /// Queue a quad for the batch.
    pub fn render_quad(&mut self, quad: Quad) {
        self.batch.push(quad);
    }

    pub fn render_sprite(
        &mut self,
        sprite: &Sprite,
        position: Vector3<f32>,
        rotation: f32,
        scale: Vector2<f32>,
        color: Vector4<f32>,
    ) {
        self.render_quad(sprite.to_quad(position, rotation, scale, color));
    }

    /// Draw the batch, then every immediate item, and leave the layer empty.
    ///
    /// Untextured quads and items are drawn with `white`.
    pub fn render<B: DrawBackend + ?Sized>(
        &mut self,
        cache: &mut TextureCache,
        backend: &mut B,
        white: TextureHandle,
    ) -> RenderStats {
        let mut stats = RenderStats {
            batch: self.batch.flush(cache, backend, white),
            immediate_draws: 0,
        };

        if self.open.take().is_some() {
            log::warn!("immediate item left open at render time, dropping it");
        }

        for mut item in self.items.drain(..) {
            if item.texture.is_none() {
                item.texture = white;
            }
            // at most one retry: the advanced frame frees every unit
            let slot = loop {
                if let Some(slot) = cache.bind_texture(item.texture, backend) {
                    break slot;
                }
                cache.advance_frame();
            };
            backend.draw_immediate(&item, slot);
            stats.immediate_draws += 1;
        }

        cache.advance_frame();
        stats
    }

    pub fn batch(&self) -> &QuadBatch {
        &self.batch
    }

    pub fn immediate_items(&self) -> &[ImmediateDraw] {
        &self.items
    }

    pub fn color_transform(&self) -> Matrix4<f32> {
        self.color_transform
    }

    // state

    pub fn set_color(&mut self, color: Vector4<f32>) {
        self.current_color = color;
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.half_width = width / 2.0;
    }

    pub fn line_width(&self) -> f32 {
        self.half_width * 2.0
    }

    // immediate mode emulation

    /// Start recording a primitive. An item that was never ended is dropped.
    pub fn begin(&mut self, primitive: Primitive, texture: TextureHandle) {
        if self.open.is_some() {
            log::warn!("begin() without end(), dropping the open item");
        }
        self.open = Some(OpenItem {
            primitive,
            texture,
            vertices: Vec::new(),
        });
    }

    pub fn add_vertex(&mut self, x: f32, y: f32) {
        self.push_vertex([x, y, -1.0], [0.0, 0.0], self.current_color);
    }

    pub fn add_vertex_z(&mut self, x: f32, y: f32, z: f32) {
        self.push_vertex([x, y, z], [0.0, 0.0], self.current_color);
    }

    pub fn add_vertex_uv(&mut self, x: f32, y: f32, u: f32, v: f32) {
        self.push_vertex([x, y, -1.0], [u, v], self.current_color);
    }

    pub fn add_vertex_colored(&mut self, x: f32, y: f32, color: Vector4<f32>) {
        self.push_vertex([x, y, -1.0], [0.0, 0.0], color);
    }

    pub fn add_vertex_uv_colored(&mut self, x: f32, y: f32, u: f32, v: f32, color: Vector4<f32>) {
        self.push_vertex([x, y, -1.0], [u, v], color);
    }

    fn push_vertex(&mut self, position: [f32; 3], tex_coords: [f32; 2], color: Vector4<f32>) {
        match &mut self.open {
            Some(item) => item.vertices.push(ImmediateVertex {
                position,
                tex_coords,
                color: color.into(),
            }),
            None => log::warn!("vertex added outside of begin()/end(), ignoring it"),
        }
    }

    /// Finish the open primitive and queue it behind the batch.
    pub fn end(&mut self) {
        let Some(item) = self.open.take() else {
            log::warn!("end() without begin()");
            return;
        };
        let (topology, vertices) = triangulate(item.primitive, &item.vertices);
        if vertices.is_empty() {
            log::warn!(
                "{:?} with {} vertices produces nothing to draw",
                item.primitive,
                item.vertices.len()
            );
            return;
        }
        self.items.push(ImmediateDraw {
            vertices,
            topology,
            texture: item.texture,
        });
    }

    // shapes, drawn after the quad batch

    pub fn render_tri(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32, full: bool) {
        self.begin(
            if full { Primitive::Triangles } else { Primitive::LineLoop },
            TextureHandle::NONE,
        );
        self.add_vertex(x1, y1);
        self.add_vertex(x2, y2);
        self.add_vertex(x3, y3);
        self.end();
    }

    /// Filled, or outlined with four bars of the current line width.
    pub fn render_rectangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, full: bool) {
        if full {
            self.begin(Primitive::Triangles, TextureHandle::NONE);
            self.add_vertex(x1, y1);
            self.add_vertex(x2, y1);
            self.add_vertex(x1, y2);
            self.add_vertex(x1, y2);
            self.add_vertex(x2, y1);
            self.add_vertex(x2, y2);
            self.end();
        } else {
            let hw = self.half_width;
            self.render_rectangle(x1 + hw, y1 - hw, x2 - hw, y1 + hw, true);
            self.render_rectangle(x2 - hw, y1 - hw, x2 + hw, y2 + hw, true);
            self.render_rectangle(x1 + hw, y2 - hw, x2 - hw, y2 + hw, true);
            self.render_rectangle(x1 - hw, y1 - hw, x1 + hw, y2 + hw, true);
        }
    }

    pub fn render_circle(&mut self, x: f32, y: f32, radius: f32, full: bool, segments: u32) {
        let segments = segments.max(3);
        self.begin(
            if full { Primitive::TriangleFan } else { Primitive::LineLoop },
            TextureHandle::NONE,
        );
        if full {
            self.add_vertex(x, y);
        }
        // the outline closes itself, the fan needs the seam vertex twice
        let last = if full { segments } else { segments - 1 };
        for i in 0..=last {
            let theta = TAU / segments as f32 * i as f32;
            self.add_vertex(theta.cos() * radius + x, theta.sin() * radius + y);
        }
        self.end();
    }

    /// Filled pie slice between two angles in degrees, in either order.
    pub fn render_arc(&mut self, x: f32, y: f32, radius: f32, angle1: f32, angle2: f32, segments: u32) {
        let segments = segments.max(1);
        let (mut rad1, mut rad2) = (angle1.to_radians(), angle2.to_radians());
        if rad1 > rad2 {
            std::mem::swap(&mut rad1, &mut rad2);
        }

        self.begin(Primitive::TriangleFan, TextureHandle::NONE);
        self.add_vertex(x, y);
        let step = (rad2 - rad1) / segments as f32;
        for i in 0..=segments {
            let theta = rad1 + step * i as f32;
            self.add_vertex(theta.cos() * radius + x, y - theta.sin() * radius);
        }
        self.end();
    }

    /// Rectangle of `w`x`h` centered at `(x, y)` with rounded corners.
    pub fn render_rounded_rectangle(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        full: bool,
        segments: u32,
    ) {
        let segments = segments.max(1);
        let (hw, hh) = (w / 2.0, h / 2.0);
        // corner centers, each with the angle its quarter arc starts at
        let corners = [
            (x + hw - radius, y - hh + radius, 0.0),
            (x - hw + radius, y - hh + radius, FRAC_PI_2),
            (x - hw + radius, y + hh - radius, PI),
            (x + hw - radius, y + hh - radius, PI + FRAC_PI_2),
        ];

        self.begin(
            if full { Primitive::TriangleFan } else { Primitive::LineLoop },
            TextureHandle::NONE,
        );
        if full {
            self.add_vertex(x, y);
        }
        for (cx, cy, start) in corners {
            for i in 0..=segments {
                let theta = start + FRAC_PI_2 / segments as f32 * i as f32;
                self.add_vertex(cx + theta.cos() * radius, cy - theta.sin() * radius);
            }
        }
        if full {
            self.add_vertex(x + hw, y - hh + radius);
        }
        self.end();
    }

    /// One segment per `[x1, y1, x2, y2]`.
    pub fn render_lines(&mut self, lines: &[[f32; 4]]) {
        self.begin(Primitive::Lines, TextureHandle::NONE);
        for &[x1, y1, x2, y2] in lines {
            self.add_vertex(x1, y1);
            self.add_vertex(x2, y2);
        }
        self.end();
    }
}

impl Default for RenderLayer {
    fn default() -> Self {
        Self::new(RenderLayerConfig::default())
    }
}
