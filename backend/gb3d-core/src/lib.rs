//! Depth-layered rendering for the Game Boy's scanline PPU callback.
//!
//! Every pixel the background, window and sprite passes produce is routed into one of many depth
//! layers chosen by per-tile metadata. Tiles are identified by a hash of their raw pattern bytes,
//! so metadata authored once keeps applying wherever the game places that tile.

pub mod api;
pub mod command;
pub mod graphics;
pub mod layers;
pub mod metadata;
pub mod num;
pub mod ppu;
pub mod texture;
pub mod tile;

pub use gb3d_config::{DisplayVariant, SpriteAccuracy};
