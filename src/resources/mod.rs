/**
 * This module contains all logic for loading images and textures from external files.
 */
pub mod texture;
