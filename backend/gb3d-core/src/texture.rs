//! Swizzled GPU texture layers with rotating backups, for displays that draw one plane per layer

use crate::graphics::Color;
use crate::layers::{LayerTarget, clamp_depth};
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

pub const TEXTURE_WIDTH: usize = 256;
pub const TEXTURE_HEIGHT: usize = 256;
pub const TEXTURE_LEN: usize = TEXTURE_WIDTH * TEXTURE_HEIGHT;

pub const DEFAULT_BACKUPS: usize = 3;

// Centers the 160x144 screen in the texture
const X_OFFSET: usize = (TEXTURE_WIDTH - SCREEN_WIDTH) / 2;
const Y_OFFSET: usize = (TEXTURE_HEIGHT - SCREEN_HEIGHT) / 2;

const TRANSPARENT_WORD: u32 = Color::TRANSPARENT.to_rgba8_word();

/// Linear (x, y) to offset in the GPU's tiled texture layout.
///
/// The texture is split into 8x8 tiles stored row-major starting from the bottom row (the GPU's
/// texture origin is bottom-left). Texels within a tile are in Morton (Z-order) order.
#[derive(Debug, Clone)]
pub struct SwizzleTable {
    width: usize,
    offsets: Box<[u32]>,
}

impl SwizzleTable {
    /// # Panics
    ///
    /// Panics if either dimension is not a multiple of 8.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width % 8 == 0 && height % 8 == 0, "texture size must be a multiple of 8");

        let tiles_per_row = width / 8;
        let offsets = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let flipped_y = height - 1 - y;
                let tile = (flipped_y / 8) * tiles_per_row + x / 8;
                (tile * 64 + morton_index(x & 7, flipped_y & 7)) as u32
            })
            .collect();

        Self { width, offsets }
    }

    #[inline]
    #[must_use]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        self.offsets[y * self.width + x] as usize
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

// Interleave the low 3 bits of x (even bit positions) and y (odd bit positions)
fn morton_index(x: usize, y: usize) -> usize {
    (0..3).fold(0, |index, bit| {
        index | (((x >> bit) & 1) << (2 * bit)) | (((y >> bit) & 1) << (2 * bit + 1))
    })
}

/// Spacing of the display's layer planes in view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSpacing {
    /// Offset of layer 0.
    pub base: f32,
    /// Distance between neighbouring layers.
    pub spacing: f32,
}

impl Default for PlaneSpacing {
    fn default() -> Self {
        Self { base: -0.49, spacing: 0.0178 }
    }
}

/// One textured plane the display pipeline should draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneDraw {
    pub layer: usize,
    pub backup: usize,
    /// Index into [`TextureLayerStore::texture`].
    pub texture: usize,
    pub depth_offset: f32,
    /// Z of the layer's own plane relative to the nearest layer.
    pub plane_z: f32,
    /// Number of stacked planes, extruding the layer down to the base plane.
    pub copies: usize,
}

/// `K` swizzled RGBA8 textures for each of `Z` layers. Writes go to the current backup while the
/// display samples the others.
#[derive(Debug, Clone)]
pub struct TextureLayerStore {
    z_layers: usize,
    backups: usize,
    backup: usize,
    textures: Vec<Box<[u32]>>,
    used: Vec<bool>,
    // Per texture: written since it was last cleared
    dirty: Vec<bool>,
    swizzle: SwizzleTable,
}

impl TextureLayerStore {
    /// # Panics
    ///
    /// Panics if `z_layers` or `backups` is 0.
    #[must_use]
    pub fn new(z_layers: usize, backups: usize) -> Self {
        assert!(z_layers != 0, "at least one depth layer is required");
        assert!(backups != 0, "at least one texture backup is required");

        let texture_count = z_layers * backups;
        Self {
            z_layers,
            backups,
            backup: 0,
            textures: (0..texture_count)
                .map(|_| vec![TRANSPARENT_WORD; TEXTURE_LEN].into_boxed_slice())
                .collect(),
            used: vec![false; z_layers],
            dirty: vec![false; texture_count],
            swizzle: SwizzleTable::new(TEXTURE_WIDTH, TEXTURE_HEIGHT),
        }
    }

    #[inline]
    #[must_use]
    pub fn texture_index(&self, backup: usize, layer: usize) -> usize {
        backup * self.z_layers + layer
    }

    #[must_use]
    pub fn backup(&self) -> usize {
        self.backup
    }

    #[must_use]
    pub fn backups(&self) -> usize {
        self.backups
    }

    pub fn advance_backup(&mut self) {
        self.backup = (self.backup + 1) % self.backups;

        log::debug!("Writing texture backup {}", self.backup);
    }

    /// Clear the textures of `backup` that hold stale pixels and forget this frame's used layers.
    pub fn reset(&mut self, backup: usize) {
        for layer in 0..self.z_layers {
            let index = self.texture_index(backup, layer);
            if self.dirty[index] {
                self.textures[index].fill(TRANSPARENT_WORD);
                self.dirty[index] = false;
            }
        }

        self.used.fill(false);
    }

    /// Backups in the order the display should sample them, ending with the one last written.
    pub fn sample_order(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=self.backups).map(|offset| (self.backup + offset) % self.backups)
    }

    #[must_use]
    pub fn texture(&self, index: usize) -> &[u32] {
        &self.textures[index]
    }

    /// Read back a screen pixel from one layer's backup texture.
    #[must_use]
    pub fn texel(&self, backup: usize, layer: usize, x: usize, y: usize) -> Color {
        let offset = self.swizzle.offset(x + X_OFFSET, y + Y_OFFSET);
        Color::from_rgba8_word(self.textures[self.texture_index(backup, layer)][offset])
    }

    /// Planes to draw this frame, one per used layer and sampled backup.
    #[must_use]
    pub fn plane_draws(&self, spacing: &PlaneSpacing) -> Vec<PlaneDraw> {
        let mut draws = Vec::new();
        for layer in (0..self.z_layers).filter(|&layer| self.used[layer]) {
            let depth_offset = spacing.base + spacing.spacing * layer as f32;
            let plane_z = self.plane_depth(layer, spacing.spacing);
            for backup in self.sample_order() {
                draws.push(PlaneDraw {
                    layer,
                    backup,
                    texture: self.texture_index(backup, layer),
                    depth_offset,
                    plane_z,
                    copies: layer + 1,
                });
            }
        }
        draws
    }

    // Nearest layer sits at 0
    fn plane_depth(&self, layer: usize, spacing: f32) -> f32 {
        -(spacing * (self.z_layers - 1 - layer) as f32)
    }
}

impl LayerTarget for TextureLayerStore {
    fn z_layers(&self) -> usize {
        self.z_layers
    }

    #[inline]
    fn draw(&mut self, z: u32, x: u8, y: u8, color: Color) {
        let (x, y) = (usize::from(x), usize::from(y));
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            log::warn!("Ignoring out-of-bounds texture write at ({x}, {y})");
            return;
        }

        let layer = clamp_depth(z, self.z_layers);
        let index = self.texture_index(self.backup, layer);
        let offset = self.swizzle.offset(x + X_OFFSET, y + Y_OFFSET);
        self.textures[index][offset] = color.to_rgba8_word();
        self.dirty[index] = true;
        self.used[layer] = true;
    }

    fn is_used(&self, z: usize) -> bool {
        self.used[z]
    }
}
