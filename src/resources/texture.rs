use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::RgbaImage;

use crate::{
    context::Context,
    data_structures::{sprite::Sprite, texture::TextureHandle},
};

/// Assets are resolved relative to `./assets`.
pub fn asset_path(file_name: &str) -> PathBuf {
    Path::new("./").join("assets").join(file_name)
}

pub fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(file_name);
    std::fs::read(&path).with_context(|| format!("cannot read {}", path.display()))
}

/// Decode any format enabled in the `image` features into RGBA8.
pub fn decode_image(bytes: &[u8], file_name: &str) -> anyhow::Result<RgbaImage> {
    let image = image::load_from_memory(bytes).with_context(|| format!("cannot decode {file_name}"))?;
    Ok(image.to_rgba8())
}

pub fn load_image(file_name: &str) -> anyhow::Result<RgbaImage> {
    let data = load_binary(file_name)?;
    decode_image(&data, file_name)
}

/// Load an image as a sprite that still has to be uploaded or queued for an atlas.
pub fn load_sprite(file_name: &str) -> anyhow::Result<Sprite> {
    Ok(Sprite::from_image(load_image(file_name)?))
}

/// Load an image straight into its own texture.
pub fn load_texture(ctx: &mut Context, file_name: &str) -> anyhow::Result<TextureHandle> {
    let image = load_image(file_name)?;
    ctx.load_image(&image, file_name)
}

/// Load a sprite sheet and slice it into `cell_width`x`cell_height` sprites.
pub fn load_sprite_sheet(
    ctx: &mut Context,
    file_name: &str,
    cell_width: u32,
    cell_height: u32,
) -> anyhow::Result<Vec<Sprite>> {
    let sheet = load_image(file_name)?;
    Ok(ctx.slice_sheet(&sheet, cell_width, cell_height, file_name)?)
}
