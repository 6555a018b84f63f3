#![allow(dead_code)]

use cgmath::{Vector2, Vector3};
use sprite_ngin::{
    batch::Quad,
    data_structures::{instance::QuadInstance, texture::TextureHandle},
    render::{DrawBackend, SlotBinder, TextureUploader},
    render_layer::{ImmediateDraw, Topology},
    texture_cache::MAX_TEXTURE_UNITS,
};

/// Handle the mock treats as the engine's white texture.
pub const WHITE: TextureHandle = TextureHandle(1000);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn quad(texture: u32) -> Quad {
    Quad::new(Vector3::new(0.0, 0.0, 0.0), Vector2::new(1.0, 1.0)).with_texture(TextureHandle(texture))
}

pub fn quad_at(texture: u32, z: f32) -> Quad {
    Quad::new(Vector3::new(0.0, 0.0, z), Vector2::new(1.0, 1.0)).with_texture(TextureHandle(texture))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Bind { slot: usize, texture: TextureHandle },
    Unbind { slot: usize },
    DrawQuads(QuadDraw),
    DrawImmediate { topology: Topology, vertices: usize, slot: usize, texture: TextureHandle },
}

/// One instanced draw together with the unit table it sampled from.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadDraw {
    pub instances: Vec<QuadInstance>,
    pub units: [TextureHandle; MAX_TEXTURE_UNITS],
}

impl QuadDraw {
    /// Texture each instance actually samples.
    pub fn textures(&self) -> Vec<TextureHandle> {
        self.instances.iter().map(|i| self.units[i.slot as usize]).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Upload {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub label: String,
}

/// Records every side effect the batcher, cache and packer ask for.
#[derive(Debug)]
pub struct MockBackend {
    pub calls: Vec<Call>,
    pub units: [TextureHandle; MAX_TEXTURE_UNITS],
    pub uploads: Vec<Upload>,
    pub fail_uploads: bool,
    next_handle: u32,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            units: [TextureHandle::NONE; MAX_TEXTURE_UNITS],
            uploads: Vec::new(),
            fail_uploads: false,
            next_handle: 500,
        }
    }

    pub fn quad_draws(&self) -> Vec<&QuadDraw> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::DrawQuads(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn binds(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Bind { .. }))
            .count()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotBinder for MockBackend {
    fn bind_slot(&mut self, slot: usize, texture: TextureHandle) {
        self.units[slot] = texture;
        self.calls.push(Call::Bind { slot, texture });
    }

    fn unbind_slot(&mut self, slot: usize) {
        self.units[slot] = TextureHandle::NONE;
        self.calls.push(Call::Unbind { slot });
    }
}

impl DrawBackend for MockBackend {
    fn draw_quads(&mut self, instances: &[QuadInstance]) {
        self.calls.push(Call::DrawQuads(QuadDraw {
            instances: instances.to_vec(),
            units: self.units,
        }));
    }

    fn draw_immediate(&mut self, item: &ImmediateDraw, slot: usize) {
        self.calls.push(Call::DrawImmediate {
            topology: item.topology,
            vertices: item.vertices.len(),
            slot,
            texture: self.units[slot],
        });
    }
}

impl TextureUploader for MockBackend {
    fn upload_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        label: &str,
    ) -> anyhow::Result<TextureHandle> {
        anyhow::ensure!(!self.fail_uploads, "device lost while uploading {label}");
        self.uploads.push(Upload {
            width,
            height,
            rgba: rgba.to_vec(),
            label: label.to_string(),
        });
        self.next_handle += 1;
        Ok(TextureHandle(self.next_handle))
    }
}
