//! Renderer data structures: textures, sprites, vertices and instances.
//!
//! - `texture` holds the GPU texture wrapper, logical handles and the registry
//! - `sprite` is an image region that can be drawn as a quad
//! - `vertex` contains the quad mesh and immediate-mode vertex layouts
//! - `instance` holds the per-quad record stored in the instance buffer

pub mod instance;
pub mod sprite;
pub mod texture;
pub mod vertex;
