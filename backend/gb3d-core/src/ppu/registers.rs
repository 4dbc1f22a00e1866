use crate::num::GetBit;
use std::array;
use std::fmt::{Display, Formatter};

const TILE_MAP_AREA_0: usize = 0x1800;
const TILE_MAP_AREA_1: usize = 0x1C00;

/// IO registers $FF40-$FF4B in address order.
pub const IO_REGISTERS_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileDataArea {
    // $8800-$97FF
    #[default]
    Zero,
    // $8000-$8FFF
    One,
}

impl TileDataArea {
    // Sprites always use $8000-$8FFF
    pub const SPRITES: Self = Self::One;

    /// Address of the first byte of a tile, relative to $8000.
    #[inline]
    #[must_use]
    pub fn tile_address(self, tile_number: u8) -> usize {
        // 16 bytes per tile
        match self {
            // Treat tile number as a signed integer so that 128-255 map to $8800-$8FFF
            Self::Zero => (0x1000 + 16 * i32::from(tile_number as i8)) as usize,
            Self::One => 16 * usize::from(tile_number),
        }
    }

    fn from_bit(bit: bool) -> Self {
        if bit { Self::One } else { Self::Zero }
    }

    fn to_bit(self) -> bool {
        self == Self::One
    }
}

impl Display for TileDataArea {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero => write!(f, "$8800-$97FF"),
            Self::One => write!(f, "$8000-$8FFF"),
        }
    }
}

/// Video registers as seen by the scanline callback, decoded into named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    // LCDC: LCD control
    pub ppu_enabled: bool,
    pub bg_enabled: bool,
    pub window_enabled: bool,
    pub sprites_enabled: bool,
    pub bg_tile_map_addr: usize,
    pub window_tile_map_addr: usize,
    pub bg_tile_data_area: TileDataArea,
    pub double_height_sprites: bool,
    // SCX/SCY: Background X/Y position
    pub bg_x_scroll: u8,
    pub bg_y_scroll: u8,
    // WX/WY: Window X/Y position
    pub window_x: u8,
    pub window_y: u8,
    // BGP: Background palette
    pub bg_palette: [u8; 4],
    // OBP0/OBP1: Sprite palettes
    pub sprite_palettes: [[u8; 4]; 2],
}

impl Registers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ppu_enabled: true,
            bg_enabled: true,
            window_enabled: false,
            sprites_enabled: false,
            bg_tile_map_addr: TILE_MAP_AREA_0,
            window_tile_map_addr: TILE_MAP_AREA_0,
            bg_tile_data_area: TileDataArea::One,
            double_height_sprites: false,
            bg_x_scroll: 0,
            bg_y_scroll: 0,
            window_x: 0,
            window_y: 0,
            // Power-on value is $FC / 0b11_11_11_00
            bg_palette: [0, 3, 3, 3],
            sprite_palettes: [[0; 4]; 2],
        }
    }

    /// Decode a dump of $FF40-$FF4B. STAT, LY, LYC and DMA are ignored.
    #[must_use]
    pub fn from_io(io: &[u8; IO_REGISTERS_LEN]) -> Self {
        let mut registers = Self::new();
        registers.write_lcdc(io[0x0]);
        registers.write_scy(io[0x2]);
        registers.write_scx(io[0x3]);
        registers.write_bgp(io[0x7]);
        registers.write_obp0(io[0x8]);
        registers.write_obp1(io[0x9]);
        registers.write_wy(io[0xA]);
        registers.write_wx(io[0xB]);
        registers
    }

    pub fn write_lcdc(&mut self, value: u8) {
        self.ppu_enabled = value.bit(7);
        self.window_tile_map_addr = if value.bit(6) { TILE_MAP_AREA_1 } else { TILE_MAP_AREA_0 };
        self.window_enabled = value.bit(5);
        self.bg_tile_data_area = TileDataArea::from_bit(value.bit(4));
        self.bg_tile_map_addr = if value.bit(3) { TILE_MAP_AREA_1 } else { TILE_MAP_AREA_0 };
        self.double_height_sprites = value.bit(2);
        self.sprites_enabled = value.bit(1);
        self.bg_enabled = value.bit(0);

        log::trace!("LCDC write: {value:02X}");
        log::trace!("  PPU enabled: {}", self.ppu_enabled);
        log::trace!("  BG enabled: {}", self.bg_enabled);
        log::trace!("  Window enabled: {}", self.window_enabled);
        log::trace!("  Sprites enabled: {}", self.sprites_enabled);
        log::trace!("  BG tile map address: ${:04X}", 0x8000 + self.bg_tile_map_addr);
        log::trace!("  Window tile map address: ${:04X}", 0x8000 + self.window_tile_map_addr);
        log::trace!("  BG tile data area: {}", self.bg_tile_data_area);
        log::trace!("  Double height sprites: {}", self.double_height_sprites);
    }

    #[must_use]
    pub fn read_lcdc(&self) -> u8 {
        (u8::from(self.ppu_enabled) << 7)
            | (u8::from(self.window_tile_map_addr == TILE_MAP_AREA_1) << 6)
            | (u8::from(self.window_enabled) << 5)
            | (u8::from(self.bg_tile_data_area.to_bit()) << 4)
            | (u8::from(self.bg_tile_map_addr == TILE_MAP_AREA_1) << 3)
            | (u8::from(self.double_height_sprites) << 2)
            | (u8::from(self.sprites_enabled) << 1)
            | u8::from(self.bg_enabled)
    }

    pub fn write_scx(&mut self, value: u8) {
        self.bg_x_scroll = value;

        log::trace!("SCX write: {value:02X}");
    }

    pub fn write_scy(&mut self, value: u8) {
        self.bg_y_scroll = value;

        log::trace!("SCY write: {value:02X}");
    }

    pub fn write_wx(&mut self, value: u8) {
        self.window_x = value;

        log::trace!("WX write: {value:02X}");
    }

    pub fn write_wy(&mut self, value: u8) {
        self.window_y = value;

        log::trace!("WY write: {value:02X}");
    }

    pub fn write_bgp(&mut self, value: u8) {
        self.bg_palette = parse_palette(value);

        log::trace!("BGP write: {value:02X}");
    }

    pub fn write_obp0(&mut self, value: u8) {
        self.sprite_palettes[0] = parse_palette(value);

        log::trace!("OBP0 write: {value:02X}");
    }

    pub fn write_obp1(&mut self, value: u8) {
        self.sprite_palettes[1] = parse_palette(value);

        log::trace!("OBP1 write: {value:02X}");
    }

    #[must_use]
    pub fn sprite_height(&self) -> u8 {
        if self.double_height_sprites { 16 } else { 8 }
    }

    /// Whether the window covers any part of `line`. WX values above 166 push it off screen.
    #[must_use]
    pub fn window_visible_on(&self, line: u8) -> bool {
        self.window_enabled && line >= self.window_y && self.window_x <= 166
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_palette(value: u8) -> [u8; 4] {
    array::from_fn(|color| {
        let lsb = 2 * color as u8;
        value.bits(lsb..=lsb + 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_tile_addressing() {
        assert_eq!(TileDataArea::Zero.tile_address(0), 0x1000);
        assert_eq!(TileDataArea::Zero.tile_address(0x7F), 0x17F0);
        assert_eq!(TileDataArea::Zero.tile_address(0x80), 0x0800);
        assert_eq!(TileDataArea::Zero.tile_address(0xFF), 0x0FF0);
        assert_eq!(TileDataArea::One.tile_address(0xFF), 0x0FF0);
        assert_eq!(TileDataArea::SPRITES.tile_address(1), 0x0010);
    }

    #[test]
    fn lcdc_round_trip() {
        let mut registers = Registers::new();
        for value in [0x00, 0x91, 0xE3, 0xFF] {
            registers.write_lcdc(value);
            assert_eq!(registers.read_lcdc(), value);
        }
    }

    #[test]
    fn palettes_from_io() {
        let mut io = [0_u8; IO_REGISTERS_LEN];
        io[0x7] = 0b11_10_01_00;
        io[0x9] = 0b00_01_10_11;
        let registers = Registers::from_io(&io);
        assert_eq!(registers.bg_palette, [0, 1, 2, 3]);
        assert_eq!(registers.sprite_palettes[1], [3, 2, 1, 0]);
    }

    #[test]
    fn window_bounds() {
        let mut registers = Registers::new();
        registers.write_lcdc(0xA1);
        registers.write_wy(20);
        registers.write_wx(166);
        assert!(!registers.window_visible_on(19));
        assert!(registers.window_visible_on(20));

        registers.write_wx(167);
        assert!(!registers.window_visible_on(20));
    }
}
