//! Frame-scoped texture-unit cache.
//!
//! A draw call can only sample from [`MAX_TEXTURE_UNITS`] textures at once.
//! The [`TextureCache`] assigns logical [`TextureHandle`]s to those units and
//! evicts the least recently used unit when a new handle comes in, with one
//! restriction: a unit that was (re)used during the current frame is never
//! evicted, because pending quads of the current draw still sample from it.
//!
//! A "frame" here is not a rendered frame but the span between two calls to
//! [`TextureCache::advance_frame`], which the batcher issues after every flush.
//!
//! Unit [`RESERVED_TEXTURE_UNIT`] is never handed out. It stays free for the
//! engine's default binding.

use crate::{data_structures::texture::TextureHandle, render::SlotBinder};

/// Number of texture units a single draw call can reference.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// Unit left alone by the cache.
pub const RESERVED_TEXTURE_UNIT: usize = 0;

/// Units the cache allocates from.
pub const USABLE_TEXTURE_UNITS: std::ops::Range<usize> = (RESERVED_TEXTURE_UNIT + 1)..MAX_TEXTURE_UNITS;

/// Monotonic counter identifying the current cache frame.
pub type FrameId = u64;

/// What a single texture unit currently holds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureBinding {
    pub texture: TextureHandle,
    pub last_frame: FrameId,
}

impl TextureBinding {
    pub fn is_empty(&self) -> bool {
        self.texture.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct TextureCache {
    frame: FrameId,
    bindings: [TextureBinding; MAX_TEXTURE_UNITS],
}

impl TextureCache {
    /// Starts at frame 1 so that every empty unit (`last_frame == 0`) is evictable.
    pub fn new() -> Self {
        Self {
            frame: 1,
            bindings: [TextureBinding::default(); MAX_TEXTURE_UNITS],
        }
    }

    /// Assign `texture` to a texture unit and return the unit index.
    ///
    /// Returns `None` when every usable unit was already used in the current
    /// frame. That is not an error: the caller has to flush whatever depends
    /// on the current bindings, call [`advance_frame`](Self::advance_frame)
    /// and try again. Nothing is mutated on failure.
    ///
    /// `binder` only sees a `bind_slot` call when a unit is actually
    /// (re)loaded, never on a cache hit.
    pub fn bind_texture<B: SlotBinder + ?Sized>(
        &mut self,
        texture: TextureHandle,
        binder: &mut B,
    ) -> Option<usize> {
        debug_assert!(!texture.is_none(), "cannot cache the empty texture handle");

        if let Some(slot) = self.slot_of(texture) {
            self.bindings[slot].last_frame = self.frame;
            return Some(slot);
        }

        let mut oldest_slot = RESERVED_TEXTURE_UNIT;
        let mut oldest_frame = self.frame;
        for slot in USABLE_TEXTURE_UNITS {
            if self.bindings[slot].last_frame < oldest_frame {
                oldest_frame = self.bindings[slot].last_frame;
                oldest_slot = slot;
            }
        }

        if oldest_frame == self.frame {
            log::trace!(
                "texture units exhausted in frame {}, cannot bind {:?}",
                self.frame,
                texture
            );
            return None;
        }

        log::trace!(
            "binding {:?} to unit {} (evicting {:?})",
            texture,
            oldest_slot,
            self.bindings[oldest_slot].texture
        );
        self.bindings[oldest_slot] = TextureBinding {
            texture,
            last_frame: self.frame,
        };
        binder.bind_slot(oldest_slot, texture);

        Some(oldest_slot)
    }

    /// Make every unit evictable again. Must follow each flush.
    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    /// Drop `texture` from the cache and unbind its unit.
    ///
    /// Used for textures that must not stay bound, e.g. a released texture or
    /// a render target about to be drawn into. Unknown handles are ignored.
    pub fn evict_texture<B: SlotBinder + ?Sized>(&mut self, texture: TextureHandle, binder: &mut B) {
        if let Some(slot) = self.slot_of(texture) {
            self.bindings[slot] = TextureBinding::default();
            binder.unbind_slot(slot);
        }
    }

    /// Forget every binding, e.g. after the GPU context was lost and recreated.
    pub fn invalidate(&mut self) {
        self.bindings = [TextureBinding::default(); MAX_TEXTURE_UNITS];
    }

    /// The unit `texture` currently occupies, if any.
    pub fn slot_of(&self, texture: TextureHandle) -> Option<usize> {
        if texture.is_none() {
            return None;
        }
        USABLE_TEXTURE_UNITS.into_iter().find(|&slot| self.bindings[slot].texture == texture)
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn bindings(&self) -> &[TextureBinding; MAX_TEXTURE_UNITS] {
        &self.bindings
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
