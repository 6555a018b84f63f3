//! Sprites: a sized image region on some texture.

use cgmath::{Vector2, Vector3, Vector4};
use image::RgbaImage;

use crate::{batch::Quad, data_structures::texture::TextureHandle, render::TextureUploader};

/// A drawable image region.
///
/// A sprite starts out owning its CPU-side pixels (`image`). It becomes
/// drawable once it points at a GPU texture, either its own (see
/// [`Sprite::upload`]) or a shared atlas (see [`Sprite::adopt`]). Adopting a
/// shared texture normally releases the CPU pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    /// Placement inside the texture `uv` refers to, in pixels.
    pub atlas_x: u32,
    pub atlas_y: u32,
    /// `(u1, v1, u2, v2)`
    pub uv: Vector4<f32>,
    pub texture: TextureHandle,
    pub image: Option<RgbaImage>,
}

impl Sprite {
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            atlas_x: 0,
            atlas_y: 0,
            uv: Vector4::new(0.0, 0.0, 1.0, 1.0),
            texture: TextureHandle::NONE,
            image: Some(image),
        }
    }

    /// A sprite covering `uv` of an already uploaded texture.
    pub fn from_texture(texture: TextureHandle, width: u32, height: u32, uv: Vector4<f32>) -> Self {
        Self {
            width,
            height,
            atlas_x: 0,
            atlas_y: 0,
            uv,
            texture,
            image: None,
        }
    }

    /// Rebind this sprite to a (shared) texture region.
    ///
    /// The CPU image is dropped unless `retain_image` is set.
    pub fn adopt(&mut self, texture: TextureHandle, uv: Vector4<f32>, retain_image: bool) {
        self.texture = texture;
        self.uv = uv;
        if !retain_image {
            self.image = None;
        }
    }

    /// Upload the sprite's own image as a standalone texture.
    pub fn upload<U: TextureUploader + ?Sized>(
        &mut self,
        uploader: &mut U,
        label: &str,
        retain_image: bool,
    ) -> anyhow::Result<TextureHandle> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sprite {label} has no image to upload"))?;
        let texture = uploader.upload_rgba(image.width(), image.height(), image.as_raw(), label)?;
        self.adopt(texture, Vector4::new(0.0, 0.0, 1.0, 1.0), retain_image);
        Ok(texture)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Quad drawing this sprite at its native size.
    pub fn to_quad(
        &self,
        position: Vector3<f32>,
        rotation: f32,
        scale: Vector2<f32>,
        color: Vector4<f32>,
    ) -> Quad {
        Quad {
            position,
            size: Vector2::new(self.width as f32, self.height as f32),
            scale,
            rotation,
            uv: self.uv,
            texture: self.texture,
            color,
        }
    }
}
