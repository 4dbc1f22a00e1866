//! Depth layers and the back-to-front compositor

use crate::graphics::Color;
use crate::ppu::{FRAME_BUFFER_LEN, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Anything the scanline passes can draw into.
pub trait LayerTarget {
    fn z_layers(&self) -> usize;

    /// Write one pixel into layer `z` and mark the layer used. Depths past the top layer are
    /// drawn on the top layer.
    fn draw(&mut self, z: u32, x: u8, y: u8, color: Color);

    fn is_used(&self, z: usize) -> bool;
}

/// Clamp a metadata depth to a valid layer index.
#[inline]
#[must_use]
pub fn clamp_depth(z: u32, z_layers: usize) -> usize {
    (z as usize).min(z_layers.saturating_sub(1))
}

/// Where a layer's pixels live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerRef {
    #[default]
    Owned,
    AliasOf(usize),
}

#[derive(Debug, Clone)]
pub struct DepthLayer {
    pixels: Box<[Color; FRAME_BUFFER_LEN]>,
    used: bool,
    link: LayerRef,
}

impl DepthLayer {
    fn new() -> Self {
        Self {
            pixels: Box::new([Color::TRANSPARENT; FRAME_BUFFER_LEN]),
            used: false,
            link: LayerRef::Owned,
        }
    }

    #[must_use]
    pub fn pixels(&self) -> &[Color; FRAME_BUFFER_LEN] {
        &self.pixels
    }

    #[must_use]
    pub fn used(&self) -> bool {
        self.used
    }

    #[must_use]
    pub fn link(&self) -> LayerRef {
        self.link
    }
}

/// `Z` linear 160x144 framebuffers, index 0 furthest from the viewer.
#[derive(Debug, Clone)]
pub struct LayerStore {
    layers: Vec<DepthLayer>,
}

impl LayerStore {
    /// # Panics
    ///
    /// Panics if `z_layers` is 0.
    #[must_use]
    pub fn new(z_layers: usize) -> Self {
        assert!(z_layers != 0, "at least one depth layer is required");

        Self { layers: (0..z_layers).map(|_| DepthLayer::new()).collect() }
    }

    /// Clear every layer drawn this frame and drop all alias links.
    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            if layer.used {
                layer.pixels.fill(Color::TRANSPARENT);
            }
            layer.used = false;
            layer.link = LayerRef::Owned;
        }
    }

    /// Index of the layer holding `layer`'s pixels.
    #[must_use]
    pub fn resolve(&self, layer: usize) -> usize {
        match self.layers[layer].link {
            LayerRef::Owned => layer,
            LayerRef::AliasOf(target) => target,
        }
    }

    /// Merge `over` onto `behind`. An unused `behind` becomes an alias instead of a copy.
    ///
    /// # Panics
    ///
    /// Panics if `over` does not resolve to a layer above `behind`.
    pub fn compose(&mut self, over: usize, behind: usize) {
        let source = self.resolve(over);

        if !self.layers[behind].used {
            self.layers[behind].link = LayerRef::AliasOf(source);
            return;
        }

        assert!(source > behind, "layer {over} (resolving to {source}) is not above {behind}");

        let (lower, upper) = self.layers.split_at_mut(source);
        let src = &upper[0].pixels;
        let dst = &mut lower[behind].pixels;
        for (dst, &src) in dst.iter_mut().zip(src.iter()) {
            if !src.is_transparent() {
                *dst = src;
            }
        }
    }

    /// Flatten every layer onto layer 0.
    pub fn compose_all(&mut self) {
        for layer in (1..self.layers.len()).rev() {
            self.compose(layer, layer - 1);
        }
    }

    #[must_use]
    pub fn z_layers(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_used(&self, layer: usize) -> bool {
        self.layers[layer].used
    }

    #[must_use]
    pub fn link(&self, layer: usize) -> LayerRef {
        self.layers[layer].link
    }

    #[must_use]
    pub fn layer(&self, layer: usize) -> &DepthLayer {
        &self.layers[layer]
    }

    /// Pixels of `layer` after following its alias.
    #[must_use]
    pub fn layer_pixels(&self, layer: usize) -> &[Color; FRAME_BUFFER_LEN] {
        &self.layers[self.resolve(layer)].pixels
    }

    /// Resolved pixels of `layer` as tightly packed RGBA8 bytes.
    #[must_use]
    pub fn layer_bytes(&self, layer: usize) -> &[u8] {
        bytemuck::cast_slice(self.layer_pixels(layer).as_slice())
    }

    #[must_use]
    pub fn pixel(&self, layer: usize, x: usize, y: usize) -> Color {
        self.layer_pixels(layer)[y * SCREEN_WIDTH + x]
    }

    /// Layers a multi-plane display needs to draw: those drawn this frame or aliasing one.
    pub fn visible_layers(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.used || layer.link != LayerRef::Owned)
            .map(|(i, _)| i)
    }
}

impl LayerTarget for LayerStore {
    fn z_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    fn draw(&mut self, z: u32, x: u8, y: u8, color: Color) {
        let (x, y) = (usize::from(x), usize::from(y));
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            log::warn!("Ignoring out-of-bounds layer write at ({x}, {y})");
            return;
        }

        let z = clamp_depth(z, self.layers.len());
        let layer = &mut self.layers[z];
        layer.pixels[y * SCREEN_WIDTH + x] = color;
        layer.used = true;
    }

    fn is_used(&self, z: usize) -> bool {
        self.layers[z].used
    }
}
