use cgmath::Vector4;
use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use sprite_ngin::{
    atlas::{AtlasError, AtlasPacker, Placement, next_power_of_two, pack, slice_sheet, uv_rect},
    data_structures::{sprite::Sprite, texture::TextureHandle},
};

use crate::common::test_utils::{MockBackend, init_logger};

mod common;

fn solid(width: u32, height: u32, color: [u8; 4]) -> Sprite {
    Sprite::from_image(RgbaImage::from_pixel(width, height, Rgba(color)))
}

fn overlaps(a: (Placement, (u32, u32)), b: (Placement, (u32, u32))) -> bool {
    let (pa, (wa, ha)) = a;
    let (pb, (wb, hb)) = b;
    pa.x < pb.x + wb && pb.x < pa.x + wa && pa.y < pb.y + hb && pb.y < pa.y + ha
}

fn assert_valid_packing(sizes: &[(u32, u32)]) {
    let packing = pack(sizes).unwrap();
    assert_eq!(packing.placements.len(), sizes.len());
    for (i, (&p, &(w, h))) in packing.placements.iter().zip(sizes).enumerate() {
        assert!(p.x + w <= packing.width, "sprite {i} leaves the bin horizontally");
        assert!(p.y + h <= packing.height, "sprite {i} leaves the bin vertically");
        for j in 0..i {
            assert!(
                !overlaps((p, (w, h)), (packing.placements[j], sizes[j])),
                "sprites {j} and {i} overlap"
            );
        }
    }
}

#[test]
fn three_squares_are_packed_disjoint() {
    let sizes = [(64, 64), (32, 32), (16, 16)];
    let packing = pack(&sizes).unwrap();
    assert_valid_packing(&sizes);

    assert!(packing.width >= 64 && packing.height >= 64);
    assert_eq!(
        packing.placements,
        vec![
            Placement { x: 0, y: 0 },
            Placement { x: 64, y: 0 },
            Placement { x: 64, y: 32 },
        ]
    );
    assert_eq!((packing.width, packing.height), (96, 64));
    assert!(next_power_of_two(packing.width) >= packing.width);
    assert_eq!((next_power_of_two(packing.width), next_power_of_two(packing.height)), (128, 64));
}

#[test]
fn queue_order_does_not_change_placements() {
    let packing = pack(&[(16, 16), (64, 64), (32, 32)]).unwrap();
    assert_eq!(packing.placements[1], Placement { x: 0, y: 0 });
    assert_eq!(packing.placements[2], Placement { x: 64, y: 0 });
    assert_eq!(packing.placements[0], Placement { x: 64, y: 32 });
}

// growth direction characterisation: each direction is only possible when
// the sprite's edge along the existing bin fits

#[test]
fn wide_sprite_next_to_a_tall_bin_grows_right() {
    // w > root.w rules out growing down; h <= root.h allows growing right
    let packing = pack(&[(8, 16), (16, 8)]).unwrap();
    assert_eq!(packing.placements[1], Placement { x: 8, y: 0 });
    assert_eq!((packing.width, packing.height), (24, 16));
}

#[test]
fn tall_sprite_below_a_wide_bin_grows_down() {
    let packing = pack(&[(16, 2), (4, 12)]).unwrap();
    assert_eq!(packing.placements[1], Placement { x: 0, y: 2 });
    assert_eq!((packing.width, packing.height), (16, 14));
}

#[test]
fn growth_prefers_the_more_square_bin() {
    let packing = pack(&[(16, 16), (16, 16), (16, 16)]).unwrap();
    // square bin: right first, then the 32x16 bin grows down
    assert_eq!(
        packing.placements,
        vec![
            Placement { x: 0, y: 0 },
            Placement { x: 16, y: 0 },
            Placement { x: 0, y: 16 },
        ]
    );
    assert_eq!((packing.width, packing.height), (32, 32));

    let packing = pack(&[(16, 4), (16, 4)]).unwrap();
    assert_eq!(packing.placements[1], Placement { x: 0, y: 4 });
    assert_eq!((packing.width, packing.height), (16, 8));
}

#[test]
fn many_mixed_sprites_never_overlap() {
    let mut rng = StdRng::seed_from_u64(17);
    let sizes: Vec<(u32, u32)> = (0..120)
        .map(|_| (rng.random_range(1..=48), rng.random_range(1..=48)))
        .collect();
    assert_valid_packing(&sizes);
}

#[test]
fn empty_session_is_an_error() {
    assert!(matches!(pack(&[]), Err(AtlasError::EmptySession)));

    let mut packer = AtlasPacker::new();
    let mut gpu = MockBackend::new();
    assert!(matches!(packer.build_atlas(&mut gpu), Err(AtlasError::EmptySession)));
    assert!(gpu.uploads.is_empty());
}

#[test]
fn powers_of_two() {
    assert_eq!(next_power_of_two(0), 1);
    assert_eq!(next_power_of_two(1), 1);
    assert_eq!(next_power_of_two(3), 4);
    assert_eq!(next_power_of_two(64), 64);
    assert_eq!(next_power_of_two(65), 128);
}

#[test]
fn uv_rect_is_placement_over_atlas_size() {
    let uv = uv_rect(Placement { x: 64, y: 0 }, 32, 32, 128, 64);
    assert_eq!(uv, Vector4::new(0.5, 0.0, 0.75, 0.5));
}

#[test]
fn build_atlas_uploads_once_and_rebinds_every_sprite() {
    init_logger();
    let mut packer = AtlasPacker::new();
    assert_eq!(packer.add_to_atlas(solid(64, 64, [255, 0, 0, 255])), 0);
    assert_eq!(packer.add_to_atlas(solid(32, 32, [0, 255, 0, 255])), 1);
    assert_eq!(packer.add_to_atlas(solid(16, 16, [0, 0, 255, 255])), 2);
    let mut gpu = MockBackend::new();

    let atlas = packer.build_atlas(&mut gpu).unwrap();

    assert_eq!(gpu.uploads.len(), 1);
    let upload = &gpu.uploads[0];
    assert_eq!((upload.width, upload.height), (128, 64));
    assert_eq!(upload.label, "sprite atlas");
    assert_eq!((atlas.width, atlas.height), (128, 64));
    assert_eq!((atlas.packed_width, atlas.packed_height), (96, 64));
    assert!(packer.is_empty());

    assert_eq!(atlas.sprites.len(), 3);
    for sprite in &atlas.sprites {
        assert_eq!(sprite.texture, atlas.texture);
        assert!(!sprite.has_image());
    }
    let green = &atlas.sprites[1];
    assert_eq!((green.atlas_x, green.atlas_y), (64, 0));
    assert_eq!(green.uv, Vector4::new(0.5, 0.0, 0.75, 0.5));

    let pixel = |x: u32, y: u32| {
        let i = ((y * upload.width + x) * 4) as usize;
        [upload.rgba[i], upload.rgba[i + 1], upload.rgba[i + 2], upload.rgba[i + 3]]
    };
    assert_eq!(pixel(10, 10), [255, 0, 0, 255]);
    assert_eq!(pixel(70, 10), [0, 255, 0, 255]);
    assert_eq!(pixel(70, 40), [0, 0, 255, 255]);
    // padding stays transparent
    assert_eq!(pixel(120, 60), [0, 0, 0, 0]);
}

#[test]
fn atlas_rows_are_stored_bottom_up() {
    let mut image = RgbaImage::new(1, 2);
    image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
    let mut packer = AtlasPacker::new();
    packer.add_to_atlas(Sprite::from_image(image));
    let mut gpu = MockBackend::new();

    packer.build_atlas(&mut gpu).unwrap();

    // bottom image row first
    assert_eq!(gpu.uploads[0].rgba, vec![0, 0, 255, 255, 255, 0, 0, 255]);
}

#[test]
fn missing_image_leaves_the_queue_intact() {
    let mut packer = AtlasPacker::new();
    packer.add_to_atlas(solid(4, 4, [1, 2, 3, 4]));
    packer.add_to_atlas(Sprite::from_texture(TextureHandle(3), 4, 4, Vector4::new(0.0, 0.0, 1.0, 1.0)));
    let mut gpu = MockBackend::new();

    let result = packer.build_atlas(&mut gpu);

    assert!(matches!(result, Err(AtlasError::MissingImage { index: 1 })));
    assert_eq!(packer.pending().len(), 2);
    assert!(gpu.uploads.is_empty());
}

#[test]
fn resized_sprite_is_rejected_before_packing() {
    let mut packer = AtlasPacker::new();
    packer.add_to_atlas(solid(8, 8, [1, 2, 3, 4]));
    let mut stretched = solid(4, 4, [5, 6, 7, 8]);
    stretched.width = 2;
    packer.add_to_atlas(stretched);
    let mut gpu = MockBackend::new();

    let result = packer.build_atlas(&mut gpu);

    assert!(matches!(
        result,
        Err(AtlasError::SizeMismatch {
            index: 1,
            width: 2,
            height: 4,
            image_width: 4,
            image_height: 4,
        })
    ));
    assert_eq!(packer.pending().len(), 2);
    assert!(gpu.uploads.is_empty());
}

#[test]
fn failed_upload_leaves_the_queue_intact() {
    let mut packer = AtlasPacker::new();
    packer.add_to_atlas(solid(4, 4, [1, 2, 3, 4]));
    let mut gpu = MockBackend::new();
    gpu.fail_uploads = true;

    let result = packer.build_atlas(&mut gpu);

    assert!(matches!(result, Err(AtlasError::Upload(_))));
    assert_eq!(packer.pending().len(), 1);
    assert!(packer.pending()[0].has_image());
}

#[test]
fn sheets_are_sliced_row_major_from_the_top() {
    let mut sheet = RgbaImage::new(64, 32);
    // mark the top-left cell
    sheet.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
    let mut gpu = MockBackend::new();

    let sprites = slice_sheet(&mut gpu, &sheet, 16, 16, "sheet").unwrap();

    assert_eq!(gpu.uploads.len(), 1);
    assert_eq!(sprites.len(), 8);
    assert!(sprites.iter().all(|s| s.texture == sprites[0].texture && !s.has_image()));
    assert!(sprites.iter().all(|s| (s.width, s.height) == (16, 16)));

    // top row of the image is the upper half of the bottom-up texture
    assert_eq!((sprites[0].atlas_x, sprites[0].atlas_y), (0, 16));
    assert_eq!(sprites[0].uv, Vector4::new(0.0, 0.5, 0.25, 1.0));
    assert_eq!(sprites[5].uv, Vector4::new(0.25, 0.0, 0.5, 0.5));

    // the marked pixel ends up in the last uploaded row
    let rgba = &gpu.uploads[0].rgba;
    let last_row = (31 * 64 * 4) as usize;
    assert_eq!(&rgba[last_row..last_row + 4], &[255, 255, 255, 255]);
}

#[test]
fn partial_cells_are_ignored_and_empty_grids_rejected() {
    let mut gpu = MockBackend::new();
    let sprites = slice_sheet(&mut gpu, &RgbaImage::new(70, 35), 16, 16, "sheet").unwrap();
    assert_eq!(sprites.len(), 8);

    let result = slice_sheet(&mut gpu, &RgbaImage::new(8, 8), 16, 16, "sheet");
    assert!(matches!(result, Err(AtlasError::EmptySheet { .. })));
    let result = slice_sheet(&mut gpu, &RgbaImage::new(8, 8), 0, 4, "sheet");
    assert!(matches!(result, Err(AtlasError::EmptySheet { .. })));
}
