//! Sprite atlas packing.
//!
//! Sprites queued with [`AtlasPacker::add_to_atlas`] are packed into a single
//! texture by [`AtlasPacker::build_atlas`]. Fewer distinct textures means fewer
//! texture-unit evictions and therefore fewer forced flushes in the batcher.
//!
//! Packing is a growing binary-tree bin packer:
//!
//! 1. sort sprites by their longest edge, largest first
//! 2. start with a bin the size of the largest sprite
//! 3. place each sprite in the first free node that fits (depth first, `right`
//!    before `down`) and split the rest of that node into a `right` and a
//!    `down` remainder
//! 4. if nothing fits, grow the bin to the right or downwards, whichever keeps
//!    it closer to a square, and place the sprite in the new strip
//!
//! The packed size is then rounded up to powers of two for the GPU texture.
//! Padding only adds space at the high end, so placements stay valid.

use cgmath::Vector4;
use image::{RgbaImage, imageops};
use thiserror::Error;

use crate::{
    data_structures::{sprite::Sprite, texture::TextureHandle},
    render::TextureUploader,
};

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("cannot build an atlas without queued sprites")]
    EmptySession,
    #[error("queued sprite {index} has no image data to pack")]
    MissingImage { index: usize },
    #[error("queued sprite {index} claims {width}x{height} but its image is {image_width}x{image_height}")]
    SizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },
    #[error("no room for a {width}x{height} sprite and the bin cannot grow")]
    NoFit { width: u32, height: u32 },
    #[error("a {cell_width}x{cell_height} grid does not fit into a {width}x{height} sheet")]
    EmptySheet {
        width: u32,
        height: u32,
        cell_width: u32,
        cell_height: u32,
    },
    #[error("failed to upload the atlas texture: {0}")]
    Upload(#[source] anyhow::Error),
}

/// Top-left corner of a packed rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Result of [`pack`]: one placement per input rectangle, in input order, and
/// the size of the bin they were packed into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packing {
    pub placements: Vec<Placement>,
    pub width: u32,
    pub height: u32,
}

type NodeId = usize;

#[derive(Copy, Clone, Debug)]
struct AtlasNode {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    used: bool,
    right: Option<NodeId>,
    down: Option<NodeId>,
}

impl AtlasNode {
    fn free(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Binary tree over the bin's free space, stored in an arena.
///
/// Unused nodes are free leaves. Used nodes have been split (or are the root
/// of a growth step) and always carry both children.
#[derive(Debug)]
struct PackTree {
    nodes: Vec<AtlasNode>,
    root: NodeId,
}

impl PackTree {
    fn new(width: u32, height: u32) -> Self {
        Self {
            nodes: vec![AtlasNode::free(0, 0, width, height)],
            root: 0,
        }
    }

    fn add(&mut self, node: AtlasNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn root(&self) -> &AtlasNode {
        &self.nodes[self.root]
    }

    /// First free leaf of at least `w`x`h`, right subtree before down subtree.
    fn find(&self, w: u32, h: u32) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.used {
                // popped in reverse: right goes first
                stack.extend(node.down);
                stack.extend(node.right);
            } else if w <= node.w && h <= node.h {
                return Some(id);
            }
        }
        None
    }

    /// Occupy the top-left `w`x`h` of a free leaf.
    fn split(&mut self, id: NodeId, w: u32, h: u32) -> Placement {
        let node = self.nodes[id];
        let down = self.add(AtlasNode::free(node.x, node.y + h, node.w, node.h - h));
        let right = self.add(AtlasNode::free(node.x + w, node.y, node.w - w, h));

        let node = &mut self.nodes[id];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);
        Placement {
            x: node.x,
            y: node.y,
        }
    }

    fn grow(&mut self, w: u32, h: u32) -> Option<Placement> {
        let root = *self.root();

        // A strip to the right spans the current height, one below spans the
        // current width, so each direction is only possible if that edge fits.
        let can_grow_down = w <= root.w;
        let can_grow_right = h <= root.h;

        let should_grow_right = can_grow_right && root.h >= root.w + w;
        let should_grow_down = can_grow_down && root.w >= root.h + h;

        if should_grow_right {
            self.grow_right(w, h)
        } else if should_grow_down {
            self.grow_down(w, h)
        } else if can_grow_right {
            self.grow_right(w, h)
        } else if can_grow_down {
            self.grow_down(w, h)
        } else {
            None
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> Option<Placement> {
        let old_root = self.root;
        let old = *self.root();
        let strip = self.add(AtlasNode::free(old.w, 0, w, old.h));
        let root = self.add(AtlasNode {
            x: 0,
            y: 0,
            w: old.w + w,
            h: old.h,
            used: true,
            right: Some(strip),
            down: Some(old_root),
        });
        self.root = root;
        self.place_in_tree(w, h)
    }

    fn grow_down(&mut self, w: u32, h: u32) -> Option<Placement> {
        let old_root = self.root;
        let old = *self.root();
        let strip = self.add(AtlasNode::free(0, old.h, old.w, h));
        let root = self.add(AtlasNode {
            x: 0,
            y: 0,
            w: old.w,
            h: old.h + h,
            used: true,
            right: Some(old_root),
            down: Some(strip),
        });
        self.root = root;
        self.place_in_tree(w, h)
    }

    fn place_in_tree(&mut self, w: u32, h: u32) -> Option<Placement> {
        self.find(w, h).map(|id| self.split(id, w, h))
    }

    fn place(&mut self, w: u32, h: u32) -> Option<Placement> {
        self.place_in_tree(w, h).or_else(|| self.grow(w, h))
    }
}

/// Pack rectangles of the given `(width, height)` into one growing bin.
pub fn pack(sizes: &[(u32, u32)]) -> Result<Packing, AtlasError> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    // stable, so equal edges keep queue order
    order.sort_by_key(|&i| std::cmp::Reverse(sizes[i].0.max(sizes[i].1)));

    let Some(&first) = order.first() else {
        return Err(AtlasError::EmptySession);
    };
    let mut tree = PackTree::new(sizes[first].0, sizes[first].1);

    let mut placements = vec![Placement { x: 0, y: 0 }; sizes.len()];
    for &i in &order {
        let (w, h) = sizes[i];
        placements[i] = tree
            .place(w, h)
            .ok_or(AtlasError::NoFit {
                width: w,
                height: h,
            })?;
    }

    let root = tree.root();
    Ok(Packing {
        placements,
        width: root.w,
        height: root.h,
    })
}

/// Smallest power of two `>= value`; 0 maps to 1.
pub fn next_power_of_two(value: u32) -> u32 {
    value.next_power_of_two()
}

/// UV rectangle of a `width`x`height` region at `placement` in an
/// `atlas_width`x`atlas_height` texture.
pub fn uv_rect(
    placement: Placement,
    width: u32,
    height: u32,
    atlas_width: u32,
    atlas_height: u32,
) -> Vector4<f32> {
    let (aw, ah) = (atlas_width as f32, atlas_height as f32);
    Vector4::new(
        placement.x as f32 / aw,
        placement.y as f32 / ah,
        (placement.x + width) as f32 / aw,
        (placement.y + height) as f32 / ah,
    )
}

/// Blit every sprite image into a zeroed `width`x`height` canvas.
///
/// Sprite images are stored top row first while atlas rows run bottom-up,
/// so each image is flipped vertically on the way in.
pub fn compose(
    sprites: &[Sprite],
    placements: &[Placement],
    width: u32,
    height: u32,
) -> Result<RgbaImage, AtlasError> {
    let mut canvas = RgbaImage::new(width, height);
    for (index, (sprite, placement)) in sprites.iter().zip(placements).enumerate() {
        let image = sprite
            .image
            .as_ref()
            .ok_or(AtlasError::MissingImage { index })?;
        let flipped = imageops::flip_vertical(image);
        imageops::replace(
            &mut canvas,
            &flipped,
            i64::from(placement.x),
            i64::from(placement.y),
        );
    }
    Ok(canvas)
}

/// A built atlas: the shared texture and the sprites rebound to it, in the
/// order they were queued.
#[derive(Debug)]
pub struct Atlas {
    pub texture: TextureHandle,
    /// Texture size (power-of-two padded).
    pub width: u32,
    pub height: u32,
    /// Tight size of the packed bin.
    pub packed_width: u32,
    pub packed_height: u32,
    pub sprites: Vec<Sprite>,
}

/// Queue of sprites waiting to be packed into the next atlas.
///
/// One packing session at a time: queue sprites, then build once. A failed
/// build keeps the queue untouched.
#[derive(Debug, Default)]
pub struct AtlasPacker {
    pending: Vec<Sprite>,
}

impl AtlasPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `sprite` and return its index in the next [`Atlas::sprites`].
    pub fn add_to_atlas(&mut self, sprite: Sprite) -> usize {
        self.pending.push(sprite);
        self.pending.len() - 1
    }

    pub fn pending(&self) -> &[Sprite] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pack, compose and upload every queued sprite, then drain the queue.
    pub fn build_atlas<U: TextureUploader + ?Sized>(
        &mut self,
        uploader: &mut U,
    ) -> Result<Atlas, AtlasError> {
        if self.pending.is_empty() {
            return Err(AtlasError::EmptySession);
        }
        for (index, sprite) in self.pending.iter().enumerate() {
            let image = sprite
                .image
                .as_ref()
                .ok_or(AtlasError::MissingImage { index })?;
            if image.dimensions() != (sprite.width, sprite.height) {
                return Err(AtlasError::SizeMismatch {
                    index,
                    width: sprite.width,
                    height: sprite.height,
                    image_width: image.width(),
                    image_height: image.height(),
                });
            }
        }

        let sizes: Vec<(u32, u32)> = self.pending.iter().map(|s| (s.width, s.height)).collect();
        let packing = pack(&sizes)?;

        let width = next_power_of_two(packing.width);
        let height = next_power_of_two(packing.height);
        log::info!(
            "packed {} sprites into {}x{}, atlas texture {}x{}",
            self.pending.len(),
            packing.width,
            packing.height,
            width,
            height
        );

        let canvas = compose(&self.pending, &packing.placements, width, height)?;
        let texture = uploader
            .upload_rgba(width, height, canvas.as_raw(), "sprite atlas")
            .map_err(AtlasError::Upload)?;

        let mut sprites = std::mem::take(&mut self.pending);
        for (sprite, &placement) in sprites.iter_mut().zip(&packing.placements) {
            sprite.atlas_x = placement.x;
            sprite.atlas_y = placement.y;
            let uv = uv_rect(placement, sprite.width, sprite.height, width, height);
            sprite.adopt(texture, uv, false);
        }

        Ok(Atlas {
            texture,
            width,
            height,
            packed_width: packing.width,
            packed_height: packing.height,
            sprites,
        })
    }
}

/// Upload a pre-made sprite sheet once and cut it into a row-major grid of
/// `cell_width`x`cell_height` sprites sharing that texture.
///
/// Cells are numbered from the top-left of the image. The sheet is stored
/// bottom-up like an atlas, so placements count rows from the bottom. Partial
/// cells at the right and bottom edges are ignored.
pub fn slice_sheet<U: TextureUploader + ?Sized>(
    uploader: &mut U,
    sheet: &RgbaImage,
    cell_width: u32,
    cell_height: u32,
    label: &str,
) -> Result<Vec<Sprite>, AtlasError> {
    let (width, height) = sheet.dimensions();
    let columns = width.checked_div(cell_width).unwrap_or(0);
    let rows = height.checked_div(cell_height).unwrap_or(0);
    if columns == 0 || rows == 0 {
        return Err(AtlasError::EmptySheet {
            width,
            height,
            cell_width,
            cell_height,
        });
    }

    let flipped = imageops::flip_vertical(sheet);
    let texture = uploader
        .upload_rgba(width, height, flipped.as_raw(), label)
        .map_err(AtlasError::Upload)?;

    let mut sprites = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let placement = Placement {
                x: column * cell_width,
                y: height - (row + 1) * cell_height,
            };
            let uv = uv_rect(placement, cell_width, cell_height, width, height);
            let mut sprite = Sprite::from_texture(texture, cell_width, cell_height, uv);
            sprite.atlas_x = placement.x;
            sprite.atlas_y = placement.y;
            sprites.push(sprite);
        }
    }
    Ok(sprites)
}
