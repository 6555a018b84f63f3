//! The boundary between batching logic and the GPU.
//!
//! Batching, caching and packing decide *what* is drawn and bound; they never
//! touch wgpu directly. Every GPU side effect goes through the traits in this
//! module, which [`FrameRenderer`](crate::gpu::FrameRenderer) implements on top
//! of wgpu and which tests implement with a recording mock.
//!
//! # Key types
//!
//! - [`SlotBinder`] receives texture-unit (un)bind requests from the cache
//! - [`DrawBackend`] receives one instanced draw per flush plus immediate draws
//! - [`TextureUploader`] turns composed pixel data (an atlas) into a texture

use crate::{
    data_structures::{instance::QuadInstance, texture::TextureHandle},
    render_layer::ImmediateDraw,
};

/// Receives the bind side effects of the [`TextureCache`](crate::texture_cache::TextureCache).
pub trait SlotBinder {
    /// Make `texture` available to shaders under unit `slot`.
    fn bind_slot(&mut self, slot: usize, texture: TextureHandle);

    /// Release whatever is bound to `slot`.
    fn unbind_slot(&mut self, _slot: usize) {}
}

/// Bookkeeping without a GPU: binds are dropped.
impl SlotBinder for () {
    fn bind_slot(&mut self, _: usize, _: TextureHandle) {}
}

/// Issues the draw calls produced by a render layer.
pub trait DrawBackend: SlotBinder {
    /// Upload `instances` to the instance buffer and draw them with one
    /// instanced call of the shared quad mesh.
    fn draw_quads(&mut self, instances: &[QuadInstance]);

    /// Draw one immediate-mode item sampling from texture unit `slot`.
    fn draw_immediate(&mut self, item: &ImmediateDraw, slot: usize);
}

/// Creates textures from CPU pixel data.
pub trait TextureUploader {
    /// Upload tightly packed RGBA8 pixels and return the new texture's handle.
    fn upload_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: &str,
    ) -> anyhow::Result<TextureHandle>;
}
