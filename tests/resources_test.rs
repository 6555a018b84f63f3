use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use sprite_ngin::resources::texture::{asset_path, decode_image, load_binary, load_sprite};

use crate::common::test_utils::init_logger;

mod common;

fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

#[test]
fn png_bytes_decode_to_rgba() {
    init_logger();
    let mut image = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 255, 255]));
    image.put_pixel(2, 1, Rgba([255, 0, 0, 128]));

    let decoded = decode_image(&encode(&image, ImageFormat::Png), "two_colors.png").unwrap();

    assert_eq!(decoded.dimensions(), (3, 2));
    assert_eq!(decoded, image);
}

#[test]
fn garbage_bytes_name_the_file_in_the_error() {
    init_logger();
    let err = decode_image(b"definitely not an image", "broken.png").unwrap_err();
    assert!(err.to_string().contains("broken.png"));
}

#[test]
fn assets_are_resolved_below_the_assets_directory() {
    let path = asset_path("ships/player.png");
    assert!(path.ends_with("assets/ships/player.png"));
}

#[test]
fn missing_assets_are_reported() {
    init_logger();
    assert!(load_binary("does/not/exist.png").is_err());
    assert!(load_sprite("does/not/exist.png").is_err());
}
