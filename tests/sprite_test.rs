use cgmath::Vector4;
use image::{Rgba, RgbaImage};
use sprite_ngin::data_structures::{sprite::Sprite, texture::TextureHandle};

use crate::common::test_utils::{MockBackend, init_logger};

mod common;

fn checker() -> RgbaImage {
    RgbaImage::from_fn(3, 2, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 128])
        }
    })
}

#[test]
fn upload_sends_the_image_once_and_covers_the_whole_texture() {
    init_logger();
    let image = checker();
    let mut sprite = Sprite::from_image(image.clone());
    sprite.uv = Vector4::new(0.25, 0.25, 0.5, 0.5);
    let mut gpu = MockBackend::new();

    let handle = sprite.upload(&mut gpu, "checker", false).unwrap();

    assert_eq!(gpu.uploads.len(), 1);
    let upload = &gpu.uploads[0];
    assert_eq!((upload.width, upload.height), (3, 2));
    assert_eq!(upload.rgba, image.into_raw());
    assert_eq!(sprite.texture, handle);
    assert_eq!(sprite.uv, Vector4::new(0.0, 0.0, 1.0, 1.0));
    assert!(!sprite.has_image());
}

#[test]
fn upload_keeps_the_image_when_asked() {
    let mut sprite = Sprite::from_image(checker());
    let mut gpu = MockBackend::new();

    sprite.upload(&mut gpu, "checker", true).unwrap();

    assert_eq!(sprite.image, Some(checker()));
}

#[test]
fn upload_without_an_image_fails() {
    let mut sprite = Sprite::from_texture(TextureHandle(3), 8, 8, Vector4::new(0.0, 0.0, 1.0, 1.0));
    let mut gpu = MockBackend::new();

    let err = sprite.upload(&mut gpu, "orphan", true).unwrap_err();

    assert!(err.to_string().contains("orphan"));
    assert!(gpu.uploads.is_empty());
    assert_eq!(sprite.texture, TextureHandle(3));
}

#[test]
fn failed_upload_leaves_the_sprite_alone() {
    let mut sprite = Sprite::from_image(checker());
    let mut gpu = MockBackend::new();
    gpu.fail_uploads = true;

    assert!(sprite.upload(&mut gpu, "checker", false).is_err());
    assert_eq!(sprite.texture, TextureHandle::NONE);
    assert!(sprite.has_image());
}

#[test]
fn adopt_releases_the_image_unless_retained() {
    let uv = Vector4::new(0.5, 0.0, 1.0, 0.5);

    let mut kept = Sprite::from_image(checker());
    kept.adopt(TextureHandle(9), uv, true);
    assert_eq!(kept.texture, TextureHandle(9));
    assert_eq!(kept.uv, uv);
    assert!(kept.has_image());

    let mut dropped = Sprite::from_image(checker());
    dropped.adopt(TextureHandle(9), uv, false);
    assert_eq!(dropped.uv, uv);
    assert!(!dropped.has_image());
}
