//! GPU textures, logical texture handles and the texture registry.
//!
//! Every GPU texture the batcher can draw from is registered once in a
//! [`TextureRegistry`] and referred to everywhere else by a small, stable
//! [`TextureHandle`]. Handles are what quads carry and what the
//! [`TextureCache`](crate::texture_cache::TextureCache) maps onto texture units.

use std::collections::HashMap;

use anyhow::*;

/// Logical handle of a registered GPU texture.
///
/// The handle is stable for the texture's lifetime and distinct from the
/// transient texture-unit slot it may be assigned during a flush.
/// [`TextureHandle::NONE`] marks an untextured (solid colour) quad.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    /// The empty handle. Quads carrying it are drawn with the white texture.
    pub const NONE: TextureHandle = TextureHandle(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl From<u32> for TextureHandle {
    fn from(id: u32) -> Self {
        TextureHandle(id)
    }
}

/// A GPU texture and its default view.
///
/// Sprite textures carry no sampler of their own; every texture unit is read
/// through the one [`create_sprite_sampler`] sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Colour format used for sprite and atlas textures.
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Create a texture from tightly packed RGBA8 pixels.
    ///
    /// # Arguments
    ///
    /// * `width`/`height` are the texture dimensions in pixels
    /// * `rgba` has to hold exactly `width * height * 4` bytes
    /// * `label` is used as a debug label for the GPU resource
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: Option<&str>,
    ) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "cannot create a {width}x{height} texture"
        );
        ensure!(
            rgba.len() == (width as usize) * (height as usize) * 4,
            "expected {} bytes of RGBA data for a {width}x{height} texture, got {}",
            (width as usize) * (height as usize) * 4,
            rgba.len()
        );

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    /// An uninitialized texture that layers can be rendered into and that can
    /// be read back or sampled afterwards.
    pub fn create_render_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "cannot create a {width}x{height} render target"
        );
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    /// The 1x1 opaque white texture untextured quads are drawn with.
    pub fn create_white(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self> {
        Self::from_rgba(device, queue, 1, 1, &[255, 255, 255, 255], Some("white texture"))
    }
}

/// Nearest-neighbour, edge-clamped sampler. Atlas neighbours must not bleed
/// into each other, so no linear filtering and no wrapping.
pub fn create_sprite_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("sprite sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    })
}

/// Owner of every texture that can be referenced by a [`TextureHandle`].
///
/// Handles are handed out sequentially starting at 1 and never reused, so a
/// stale handle can only miss, never alias a newer texture.
#[derive(Debug)]
pub struct TextureRegistry {
    textures: HashMap<TextureHandle, Texture>,
    next_id: u32,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        let handle = TextureHandle(self.next_id);
        self.next_id += 1;
        self.textures.insert(handle, texture);
        handle
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(&handle)
    }

    pub fn remove(&mut self, handle: TextureHandle) -> Option<Texture> {
        self.textures.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}
