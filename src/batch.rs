//! Quad batching: sort a frame's quads and split them into instanced draws.
//!
//! A [`QuadBatch`] accumulates [`Quad`]s during a frame. [`QuadBatch::flush`]
//! sorts them and walks the sorted list once, resolving each quad's texture
//! through the shared [`TextureCache`]. Consecutive quads are gathered into a
//! window that is drawn with a single instanced call when
//!
//! - the window reaches [`MAX_QUADS_PER_BATCH`] quads, or
//! - the cache runs out of texture units for the next quad, or
//! - the list ends.
//!
//! Every draw is followed by [`TextureCache::advance_frame`], so a quad that
//! failed to bind always succeeds on the retry right after the flush.

use std::cmp::Ordering;

use cgmath::{Vector2, Vector3, Vector4};

use crate::{
    data_structures::{instance::QuadInstance, texture::TextureHandle},
    render::DrawBackend,
    texture_cache::TextureCache,
};

/// Upper bound of quads drawn by one instanced call. Also the instance
/// buffer's capacity.
pub const MAX_QUADS_PER_BATCH: usize = 4096;

/// One textured rectangle submitted for drawing.
///
/// `texture` is a logical handle and is never rewritten by the batcher; the
/// texture unit a flush resolves it to only lives in the emitted
/// [`QuadInstance`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quad {
    pub position: Vector3<f32>,
    pub size: Vector2<f32>,
    pub scale: Vector2<f32>,
    /// radians
    pub rotation: f32,
    /// `(u1, v1, u2, v2)`
    pub uv: Vector4<f32>,
    /// [`TextureHandle::NONE`] draws a solid colour quad.
    pub texture: TextureHandle,
    pub color: Vector4<f32>,
}

impl Quad {
    /// An untextured white quad of `size` centered at `position`.
    pub fn new(position: Vector3<f32>, size: Vector2<f32>) -> Self {
        Self {
            position,
            size,
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            uv: Vector4::new(0.0, 0.0, 1.0, 1.0),
            texture: TextureHandle::NONE,
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
        }
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = texture;
        self
    }

    pub fn with_uv(mut self, u1: f32, v1: f32, u2: f32, v2: f32) -> Self {
        self.uv = Vector4::new(u1, v1, u2, v2);
        self
    }

    pub fn with_color(mut self, color: Vector4<f32>) -> Self {
        self.color = color;
        self
    }

    pub fn with_scale(mut self, scale: Vector2<f32>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    /// Pack this quad for the instance buffer, sampling from texture unit `slot`.
    pub fn to_instance(&self, slot: usize) -> QuadInstance {
        QuadInstance {
            position: self.position.into(),
            size: self.size.into(),
            scale: self.scale.into(),
            rotation: self.rotation,
            uv: self.uv.into(),
            slot: slot as u32,
            color: self.color.into(),
        }
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::new(Vector3::new(0.0, 0.0, 0.0), Vector2::new(1.0, 1.0))
    }
}

/// Order in which a batch is drawn. Fixed per render layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Group by texture. Longest same-texture runs, fewest flushes. Only
    /// correct when overlapping quads don't depend on draw order.
    #[default]
    Texture,
    /// Back to front by `position.z`, texture as tiebreak. Needed for
    /// alpha blending; texture locality becomes secondary.
    DepthThenTexture,
}

impl SortOrder {
    pub fn compare(self, a: &Quad, b: &Quad) -> Ordering {
        match self {
            SortOrder::Texture => a.texture.cmp(&b.texture),
            SortOrder::DepthThenTexture => a
                .position
                .z
                .total_cmp(&b.position.z)
                .then_with(|| a.texture.cmp(&b.texture)),
        }
    }
}

/// Counters of a single [`QuadBatch::flush`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Instanced draw calls issued.
    pub draw_calls: usize,
    /// Quads drawn across all calls.
    pub quads: usize,
    /// Draws forced early because the texture units ran out.
    pub texture_splits: usize,
}

#[derive(Debug, Clone)]
pub struct QuadBatch {
    quads: Vec<Quad>,
    window: Vec<QuadInstance>,
    sort_order: SortOrder,
}

impl QuadBatch {
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            quads: Vec::with_capacity(MAX_QUADS_PER_BATCH),
            window: Vec::with_capacity(MAX_QUADS_PER_BATCH),
            sort_order,
        }
    }

    pub fn push(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Sort, partition and draw everything queued, then clear the batch.
    ///
    /// Quads without a texture are drawn with `white`.
    pub fn flush<B: DrawBackend + ?Sized>(
        &mut self,
        cache: &mut TextureCache,
        backend: &mut B,
        white: TextureHandle,
    ) -> FlushStats {
        let mut stats = FlushStats::default();
        let order = self.sort_order;
        // stable: equal keys keep submission order
        self.quads.sort_by(|a, b| order.compare(a, b));
        self.window.clear();

        let mut i = 0;
        while i < self.quads.len() {
            let quad = &self.quads[i];
            let texture = if quad.texture.is_none() {
                white
            } else {
                quad.texture
            };

            match cache.bind_texture(texture, backend) {
                None => {
                    // retry the same quad against the advanced cache
                    stats.texture_splits += 1;
                    Self::submit(&mut self.window, cache, backend, &mut stats);
                }
                Some(slot) => {
                    self.window.push(quad.to_instance(slot));
                    i += 1;
                    if self.window.len() >= MAX_QUADS_PER_BATCH {
                        Self::submit(&mut self.window, cache, backend, &mut stats);
                    }
                }
            }
        }

        if !self.window.is_empty() {
            Self::submit(&mut self.window, cache, backend, &mut stats);
        }

        self.quads.clear();
        stats
    }

    /// Draw the window (if any) and advance the cache frame unconditionally,
    /// so a bind that just failed can succeed next.
    fn submit<B: DrawBackend + ?Sized>(
        window: &mut Vec<QuadInstance>,
        cache: &mut TextureCache,
        backend: &mut B,
        stats: &mut FlushStats,
    ) {
        if !window.is_empty() {
            log::debug!(
                "flushing {} quads in cache frame {}",
                window.len(),
                cache.frame()
            );
            backend.draw_quads(window);
            stats.draw_calls += 1;
            stats.quads += window.len();
            window.clear();
        }
        cache.advance_frame();
    }
}

impl Default for QuadBatch {
    fn default() -> Self {
        Self::new(SortOrder::default())
    }
}
