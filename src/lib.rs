//! sprite-ngin
//!
//! A batched 2D sprite renderer on top of wgpu. Quads submitted during a frame
//! are sorted, split into instanced draws of at most 4096 quads and drawn
//! with up to 16 textures bound at once. A frame-scoped LRU cache maps
//! texture handles onto those units, and a growing bin packer merges many
//! small sprites into one atlas texture so that they batch together.
//!
//! High-level modules
//! - `atlas`: bin packing, atlas composition and sprite sheet slicing
//! - `batch`: quads, sort orders and the batch/flush algorithm
//! - `context`: device, queue, textures, texture-unit cache and atlas queue
//! - `data_structures`: textures, sprites, vertices and instance records
//! - `gpu`: wgpu resources and the renderer behind the draw seam
//! - `pipelines`: the quad and immediate-mode render pipelines
//! - `render`: traits separating batching logic from the GPU
//! - `render_layer`: per-layer batch plus immediate-mode shapes
//! - `resources`: helpers to load images, sprites and textures from files
//! - `texture_cache`: frame-scoped LRU assignment of textures to units
//!

pub mod atlas;
pub mod batch;
pub mod context;
pub mod data_structures;
pub mod gpu;
pub mod pipelines;
pub mod render;
pub mod render_layer;
pub mod resources;
pub mod texture_cache;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu;
