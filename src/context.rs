use anyhow::{Context as _, Result, ensure};
use cgmath::Matrix4;
use image::RgbaImage;

use crate::{
    atlas::{self, Atlas, AtlasError, AtlasPacker},
    data_structures::{
        sprite::Sprite,
        texture::{Texture, TextureHandle, TextureRegistry},
    },
    gpu::{FrameRenderer, GpuResources},
    render::TextureUploader,
    render_layer::{RenderLayer, RenderStats},
    texture_cache::TextureCache,
};

/// Everything the sprite renderer shares between render layers.
///
/// The context owns the device, every registered texture, the texture-unit
/// cache and the queue of sprites waiting for the next atlas build. Render
/// layers only hold their own quads and immediate items.
#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Colour format of the targets layers are rendered into.
    pub format: wgpu::TextureFormat,
    pub textures: TextureRegistry,
    /// Reset only through [`Context::invalidate`] so the GPU unit table stays in sync.
    pub(crate) texture_cache: TextureCache,
    pub atlas: AtlasPacker,
    pub(crate) gpu: GpuResources,
    white: TextureHandle,
}

impl Context {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Result<Self> {
        let mut textures = TextureRegistry::new();
        let white = textures.insert(Texture::create_white(&device, &queue)?);
        let gpu = GpuResources::new(&device, format, white);
        log::info!("sprite renderer ready, target format {:?}", format);

        Ok(Self {
            device,
            queue,
            format,
            textures,
            texture_cache: TextureCache::new(),
            atlas: AtlasPacker::new(),
            gpu,
            white,
        })
    }

    /// A context without a surface, rendering into [`Texture::COLOR_FORMAT`] targets.
    pub async fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter available")?;
        log::debug!("headless adapter: {:?}", adapter.get_info());
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("sprite renderer device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .context("failed to create a GPU device")?;

        Self::new(device, queue, Texture::COLOR_FORMAT)
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.texture_cache
    }

    /// Texture drawn for quads and shapes without a texture of their own.
    pub fn white(&self) -> TextureHandle {
        self.white
    }

    /// Draw `layer` into `target` and empty it.
    pub fn render_layer(
        &mut self,
        layer: &mut RenderLayer,
        target: &wgpu::TextureView,
        projection: Matrix4<f32>,
    ) -> RenderStats {
        let mut renderer = FrameRenderer::new(
            &self.device,
            &self.queue,
            &mut self.gpu,
            &self.textures,
            target,
            projection,
            layer.color_transform(),
        );
        layer.render(&mut self.texture_cache, &mut renderer, self.white)
    }

    /// Draw `layer` into a registered render target.
    ///
    /// The target is evicted from the texture units first; a texture cannot
    /// be sampled and rendered to in the same pass.
    pub fn render_layer_to_texture(
        &mut self,
        layer: &mut RenderLayer,
        target: TextureHandle,
        projection: Matrix4<f32>,
    ) -> Result<RenderStats> {
        self.texture_cache.evict_texture(target, &mut self.gpu);
        let view = self
            .textures
            .get(target)
            .with_context(|| format!("render target {target:?} is not registered"))?
            .view
            .clone();
        Ok(self.render_layer(layer, &view, projection))
    }

    /// Register a new render target of the context's colour format.
    pub fn create_render_target(&mut self, width: u32, height: u32) -> Result<TextureHandle> {
        let texture =
            Texture::create_render_target(&self.device, width, height, self.format, Some("render target"))?;
        Ok(self.textures.insert(texture))
    }

    /// Fill a registered texture with `color`.
    pub fn clear_texture(&mut self, target: TextureHandle, color: wgpu::Color) -> Result<()> {
        let texture = self
            .textures
            .get(target)
            .with_context(|| format!("texture {target:?} is not registered"))?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &texture.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            multiview_mask: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Upload `image` as a standalone texture.
    pub fn load_image(&mut self, image: &RgbaImage, label: &str) -> Result<TextureHandle> {
        self.upload_rgba(image.width(), image.height(), image.as_raw(), label)
    }

    /// Unregister a texture and drop it from the texture units.
    ///
    /// Sprites and quads still carrying the handle draw white afterwards.
    pub fn release_texture(&mut self, handle: TextureHandle) -> Option<Texture> {
        if handle == self.white {
            log::warn!("refusing to release the white texture");
            return None;
        }
        self.texture_cache.evict_texture(handle, &mut self.gpu);
        self.textures.remove(handle)
    }

    /// Forget every texture-unit binding, e.g. after the surface was recreated.
    pub fn invalidate(&mut self) {
        log::debug!("invalidating texture units");
        self.texture_cache.invalidate();
        self.gpu.clear_slots();
    }

    /// Queue `sprite` for the next [`build_atlas`](Self::build_atlas).
    pub fn add_to_atlas(&mut self, sprite: Sprite) -> usize {
        self.atlas.add_to_atlas(sprite)
    }

    /// Pack every queued sprite into one texture.
    pub fn build_atlas(&mut self) -> Result<Atlas, AtlasError> {
        let mut uploader = RegistryUploader {
            device: &self.device,
            queue: &self.queue,
            textures: &mut self.textures,
        };
        self.atlas.build_atlas(&mut uploader)
    }

    /// Upload a sprite sheet and cut it into a grid of sprites.
    pub fn slice_sheet(
        &mut self,
        sheet: &RgbaImage,
        cell_width: u32,
        cell_height: u32,
        label: &str,
    ) -> Result<Vec<Sprite>, AtlasError> {
        atlas::slice_sheet(self, sheet, cell_width, cell_height, label)
    }

    /// Copy a registered RGBA8 texture back to the CPU.
    pub async fn read_texture(&self, handle: TextureHandle) -> Result<RgbaImage> {
        let texture = self
            .textures
            .get(handle)
            .with_context(|| format!("texture {handle:?} is not registered"))?;
        ensure!(
            matches!(
                texture.texture.format(),
                wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
            ),
            "cannot read back {:?} textures",
            texture.texture.format()
        );

        let (width, height) = (texture.width, texture.height);
        let unpadded_bytes_per_row = 4 * width;
        let bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: Some("Readback Buffer"),
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        // NOTE: map first, then poll, then await. Otherwise the future never resolves.
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .context("waiting for the readback copy failed")?;
        rx.receive()
            .await
            .context("readback mapping was cancelled")?
            .context("failed to map the readback buffer")?;

        let pixels = {
            let data = buffer_slice.get_mapped_range();
            let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
            for row in data.chunks(bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
            pixels
        };
        output_buffer.unmap();

        RgbaImage::from_raw(width, height, pixels).context("readback size mismatch")
    }
}

impl TextureUploader for Context {
    fn upload_rgba(&mut self, width: u32, height: u32, rgba: &[u8], label: &str) -> Result<TextureHandle> {
        RegistryUploader {
            device: &self.device,
            queue: &self.queue,
            textures: &mut self.textures,
        }
        .upload_rgba(width, height, rgba, label)
    }
}

/// Uploads into a registry while the rest of the context is borrowed elsewhere.
struct RegistryUploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    textures: &'a mut TextureRegistry,
}

impl TextureUploader for RegistryUploader<'_> {
    fn upload_rgba(&mut self, width: u32, height: u32, rgba: &[u8], label: &str) -> Result<TextureHandle> {
        let texture = Texture::from_rgba(self.device, self.queue, width, height, rgba, Some(label))?;
        let handle = self.textures.insert(texture);
        log::debug!("uploaded {label} ({width}x{height}) as {:?}", handle);
        Ok(handle)
    }
}
