//! Renders through a real device. Needs a GPU adapter, so it only runs with
//! `--features integration-tests`.

#[cfg(feature = "integration-tests")]
use crate::common::test_utils::init_logger;

#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn context() -> sprite_ngin::context::Context {
    futures::executor::block_on(sprite_ngin::context::Context::headless())
        .expect("integration tests need a GPU adapter")
}

#[test]
#[cfg(feature = "integration-tests")]
fn untextured_quads_and_shapes_are_drawn_over_the_cleared_target() {
    use cgmath::{Vector2, Vector3, Vector4};
    use sprite_ngin::{batch::Quad, gpu::ortho_projection, render_layer::RenderLayer};

    init_logger();
    let mut ctx = context();
    let target = ctx.create_render_target(8, 8).unwrap();
    ctx.clear_texture(target, wgpu::Color::WHITE).unwrap();

    let mut layer = RenderLayer::default();
    layer.render_quad(
        Quad::new(Vector3::new(2.0, 4.0, 0.0), Vector2::new(4.0, 8.0))
            .with_color(Vector4::new(1.0, 0.0, 0.0, 1.0)),
    );
    layer.set_color(Vector4::new(0.0, 0.0, 1.0, 1.0));
    layer.render_rectangle(6.0, 0.0, 8.0, 8.0, true);
    let stats = ctx
        .render_layer_to_texture(&mut layer, target, ortho_projection(0.0, 8.0, 0.0, 8.0))
        .unwrap();
    assert_eq!(stats.batch.draw_calls, 1);
    assert_eq!(stats.immediate_draws, 1);

    let image = futures::executor::block_on(ctx.read_texture(target)).unwrap();
    assert_eq!(image.get_pixel(1, 3).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(5, 3).0, [255, 255, 255, 255]);
    assert_eq!(image.get_pixel(7, 3).0, [0, 0, 255, 255]);
}

#[test]
#[cfg(feature = "integration-tests")]
fn twenty_textures_land_in_their_own_columns() {
    use cgmath::{Vector2, Vector3};
    use image::{Rgba, RgbaImage};
    use sprite_ngin::{batch::Quad, gpu::ortho_projection, render_layer::RenderLayer};

    init_logger();
    let mut ctx = context();
    // only 0 and 255 survive the sRGB round trip exactly
    let channel = |i: u32, bit: u32| if i & bit != 0 { 255 } else { 0 };
    let color = |i: u32| [channel(i, 1), channel(i, 2), channel(i, 4), 255u8];
    let textures: Vec<_> = (0..20)
        .map(|i| {
            ctx.load_image(&RgbaImage::from_pixel(1, 1, Rgba(color(i))), "column")
                .unwrap()
        })
        .collect();
    let target = ctx.create_render_target(20, 4).unwrap();
    ctx.clear_texture(target, wgpu::Color::BLACK).unwrap();

    let mut layer = RenderLayer::default();
    for (i, &texture) in textures.iter().enumerate() {
        layer.render_quad(
            Quad::new(Vector3::new(i as f32 + 0.5, 2.0, 0.0), Vector2::new(1.0, 4.0)).with_texture(texture),
        );
    }
    let stats = ctx
        .render_layer_to_texture(&mut layer, target, ortho_projection(0.0, 20.0, 0.0, 4.0))
        .unwrap();
    assert_eq!(stats.batch.draw_calls, 2);

    let image = futures::executor::block_on(ctx.read_texture(target)).unwrap();
    for i in 0..20 {
        assert_eq!(image.get_pixel(i, 1).0, color(i), "column {i}");
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn built_atlas_can_be_read_back() {
    use image::{Rgba, RgbaImage};
    use sprite_ngin::data_structures::sprite::Sprite;

    init_logger();
    let mut ctx = context();
    ctx.add_to_atlas(Sprite::from_image(RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]))));
    ctx.add_to_atlas(Sprite::from_image(RgbaImage::from_pixel(32, 32, Rgba([0, 255, 0, 255]))));
    let atlas = ctx.build_atlas().unwrap();

    let image = futures::executor::block_on(ctx.read_texture(atlas.texture)).unwrap();
    assert_eq!(image.dimensions(), (128, 64));
    assert_eq!(image.get_pixel(10, 10).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(70, 10).0, [0, 255, 0, 255]);

    let released = ctx.release_texture(atlas.texture);
    assert!(released.is_some());
    assert!(ctx.textures.get(atlas.texture).is_none());
}

#[test]
#[cfg(feature = "integration-tests")]
fn invalidated_context_can_still_render_into_a_sampled_target() {
    use cgmath::{Vector2, Vector3};
    use sprite_ngin::{batch::Quad, gpu::ortho_projection, render_layer::RenderLayer};

    init_logger();
    let mut ctx = context();
    let projection = ortho_projection(0.0, 4.0, 0.0, 4.0);
    let canvas = ctx.create_render_target(4, 4).unwrap();
    let screen = ctx.create_render_target(4, 4).unwrap();
    ctx.clear_texture(canvas, wgpu::Color::RED).unwrap();

    let mut layer = RenderLayer::default();
    layer.render_quad(Quad::new(Vector3::new(2.0, 2.0, 0.0), Vector2::new(4.0, 4.0)).with_texture(canvas));
    ctx.render_layer_to_texture(&mut layer, screen, projection).unwrap();
    assert!(ctx.texture_cache().slot_of(canvas).is_some());

    ctx.invalidate();
    assert!(ctx.texture_cache().slot_of(canvas).is_none());
    assert!(ctx.texture_cache().bindings().iter().all(|b| b.texture.is_none()));

    let mut layer = RenderLayer::default();
    layer.render_quad(Quad::new(Vector3::new(2.0, 2.0, 0.0), Vector2::new(4.0, 4.0)));
    // a sample-while-rendering conflict panics in wgpu's uncaptured error handler
    ctx.render_layer_to_texture(&mut layer, canvas, projection).unwrap();

    let image = futures::executor::block_on(ctx.read_texture(canvas)).unwrap();
    assert_eq!(image.get_pixel(2, 2).0, [255, 255, 255, 255]);
}
