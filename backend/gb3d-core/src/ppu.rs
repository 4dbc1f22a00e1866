//! Per-scanline background, window and sprite passes that route pixels into depth layers

mod background;
pub mod registers;
mod sprites;

use crate::layers::LayerTarget;
use crate::metadata::{MetadataStore, TileMetadata};
use crate::num::GetBit;
use crate::ppu::registers::Registers;
use crate::ppu::sprites::SpriteData;
use crate::tile::TileHash;
use gb3d_config::SpriteAccuracy;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const FRAME_BUFFER_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

pub const VRAM_LEN: usize = 8 * 1024;
pub const OAM_LEN: usize = 160;

pub type Vram = [u8; VRAM_LEN];
pub type Oam = [u8; OAM_LEN];

/// Frame-level flags supplied by the frontend alongside every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePhase {
    /// False when the frontend intends to drop this frame.
    pub sampled_frame: bool,
    /// Which field an interlaced frame renders: odd lines if set, even lines otherwise.
    pub odd_field: bool,
}

impl Default for FramePhase {
    fn default() -> Self {
        Self { sampled_frame: true, odd_field: false }
    }
}

/// Read-only view of the emulated video state when a line becomes ready.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    line: u8,
    registers: &'a Registers,
    vram: &'a Vram,
    oam: &'a Oam,
    phase: FramePhase,
}

impl<'a> LineContext<'a> {
    #[must_use]
    pub fn new(line: u8, registers: &'a Registers, vram: &'a Vram, oam: &'a Oam) -> Self {
        Self { line, registers, vram, oam, phase: FramePhase::default() }
    }

    #[must_use]
    pub fn with_phase(self, phase: FramePhase) -> Self {
        Self { phase, ..self }
    }

    /// LY
    #[must_use]
    pub fn line(&self) -> u8 {
        self.line
    }

    #[must_use]
    pub fn lcdc(&self) -> u8 {
        self.registers.read_lcdc()
    }

    #[must_use]
    pub fn scy(&self) -> u8 {
        self.registers.bg_y_scroll
    }

    #[must_use]
    pub fn scx(&self) -> u8 {
        self.registers.bg_x_scroll
    }

    #[must_use]
    pub fn wy(&self) -> u8 {
        self.registers.window_y
    }

    #[must_use]
    pub fn wx(&self) -> u8 {
        self.registers.window_x
    }

    #[must_use]
    pub fn bgp(&self) -> [u8; 4] {
        self.registers.bg_palette
    }

    #[must_use]
    pub fn obp0(&self) -> [u8; 4] {
        self.registers.sprite_palettes[0]
    }

    #[must_use]
    pub fn obp1(&self) -> [u8; 4] {
        self.registers.sprite_palettes[1]
    }

    #[must_use]
    pub fn registers(&self) -> &'a Registers {
        self.registers
    }

    #[must_use]
    pub fn vram(&self) -> &'a Vram {
        self.vram
    }

    #[must_use]
    pub fn oam(&self) -> &'a Oam {
        self.oam
    }

    #[must_use]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }
}

/// Receives each visible line, 0 through 143 in order, once the emulator has produced it.
pub trait ScanlineCallback {
    fn on_line_ready(&mut self, ctx: &LineContext<'_>);
}

#[derive(Debug, Clone)]
pub struct ScanlineRenderer {
    accuracy: SpriteAccuracy,
    frame_skip: bool,
    interlace: bool,
    window_line: u8,
    sprite_buffer: Vec<SpriteData>,
}

impl ScanlineRenderer {
    #[must_use]
    pub fn new(accuracy: SpriteAccuracy) -> Self {
        Self {
            accuracy,
            frame_skip: false,
            interlace: false,
            window_line: 0,
            sprite_buffer: Vec::with_capacity(sprites::OAM_SPRITE_COUNT),
        }
    }

    #[must_use]
    pub fn with_frame_skip(self, frame_skip: bool) -> Self {
        Self { frame_skip, ..self }
    }

    #[must_use]
    pub fn with_interlace(self, interlace: bool) -> Self {
        Self { interlace, ..self }
    }

    #[must_use]
    pub fn accuracy(&self) -> SpriteAccuracy {
        self.accuracy
    }

    #[must_use]
    pub fn window_line(&self) -> u8 {
        self.window_line
    }

    pub fn render_line<T: LayerTarget + ?Sized>(
        &mut self,
        ctx: &LineContext<'_>,
        metadata: &MetadataStore,
        target: &mut T,
    ) {
        if self.frame_skip && !ctx.phase().sampled_frame {
            return;
        }

        let line = ctx.line();
        if usize::from(line) >= SCREEN_HEIGHT {
            return;
        }

        if line == 0 {
            self.window_line = 0;
        }

        let registers = ctx.registers();
        let window_visible = registers.window_visible_on(line);

        if self.interlace && (line & 1 != 0) != ctx.phase().odd_field {
            // The window's internal line counter keeps running on lines this field doesn't draw
            if window_visible {
                self.window_line = self.window_line.wrapping_add(1);
            }
            return;
        }

        log::trace!(
            "Rendering line {line}: LCDC={:02X} SCX={} SCY={} WX={} WY={} window line {}",
            registers.read_lcdc(),
            registers.bg_x_scroll,
            registers.bg_y_scroll,
            registers.window_x,
            registers.window_y,
            self.window_line
        );

        if registers.bg_enabled {
            background::render_bg_line(ctx, metadata, target);
        }

        if window_visible {
            background::render_window_line(ctx, self.window_line, metadata, target);
            self.window_line = self.window_line.wrapping_add(1);
        }

        if registers.sprites_enabled {
            sprites::render_sprite_line(
                ctx,
                self.accuracy,
                &mut self.sprite_buffer,
                metadata,
                target,
            );
        }
    }
}

impl Default for ScanlineRenderer {
    fn default() -> Self {
        Self::new(SpriteAccuracy::default())
    }
}

/// 2-bit color index of one pixel in the tile starting at `tile_addr`, column 0 leftmost.
#[inline]
fn tile_pixel(vram: &Vram, tile_addr: usize, row: u8, col: u8) -> u8 {
    let row_addr = tile_addr + 2 * usize::from(row);
    let bit = 7 - col;
    u8::from(vram[row_addr].bit(bit)) | (u8::from(vram[row_addr + 1].bit(bit)) << 1)
}

/// Metadata lookups for one line, rehashing only when the resolved tile address changes.
struct TileLookup<'a> {
    store: &'a MetadataStore,
    vram: &'a Vram,
    tile_addr: Option<usize>,
    metadata: Option<&'a TileMetadata>,
}

impl<'a> TileLookup<'a> {
    fn new(store: &'a MetadataStore, vram: &'a Vram) -> Self {
        Self { store, vram, tile_addr: None, metadata: None }
    }

    fn get(&mut self, tile_addr: usize) -> Option<&'a TileMetadata> {
        if self.tile_addr != Some(tile_addr) {
            self.tile_addr = Some(tile_addr);
            self.metadata = self.store.lookup(TileHash::of_vram_tile(self.vram, tile_addr));
        }

        self.metadata
    }
}
